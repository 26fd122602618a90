//! Types shared between the quiz match server and its clients.
//!
//! - [`quiz`]: the read-only quiz snapshot a match is played from
//! - [`packets`]: payloads for both directions of the persistent connection
//! - [`codec`]: control-byte framing and the two direction tables

pub mod codec;
pub mod packets;
pub mod quiz;

pub use codec::{decode_inbound, decode_outbound, encode_inbound, encode_outbound, CodecError};
pub use packets::{GameState, Inbound, LeaderboardEntry, Outbound, PlayerInfo};
pub use quiz::{Choice, Question, Quiz};
