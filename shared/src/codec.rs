//! Binary frame codec.
//!
//! A frame is one control byte followed by a JSON payload. The control-byte
//! space is direction dependent: the same number can name different messages
//! inbound and outbound, and some numbers only exist in one direction. The
//! codec therefore keeps two independent tables and never derives one from
//! the other.

use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::packets::{Inbound, InboundKind, Outbound, OutboundKind};

/// Smallest acceptable frame: control byte plus at least one payload byte.
pub const MIN_FRAME_LEN: usize = 2;

/// Client -> server control bytes.
pub const INBOUND_CODES: &[(u8, InboundKind)] = &[
    (0, InboundKind::JoinMatch),
    (1, InboundKind::HostQuiz),
    (3, InboundKind::ChangeState),
    (5, InboundKind::StartMatch),
    (7, InboundKind::SubmitAnswer),
    (13, InboundKind::NextQuestion),
    (15, InboundKind::KickPlayer),
    (16, InboundKind::HostLeave),
    (17, InboundKind::Leave),
];

/// Server -> client control bytes.
pub const OUTBOUND_CODES: &[(OutboundKind, u8)] = &[
    (OutboundKind::HostQuizAck, 1),
    (OutboundKind::QuestionShown, 2),
    (OutboundKind::StateChanged, 3),
    (OutboundKind::PlayerJoined, 4),
    (OutboundKind::Tick, 6),
    (OutboundKind::AnswerFeedback, 8),
    (OutboundKind::HostReveal, 10),
    (OutboundKind::ScoreUpdate, 11),
    (OutboundKind::Leaderboard, 12),
    (OutboundKind::PlayerRank, 14),
    (OutboundKind::MatchEnded, 16),
    (OutboundKind::PlayerLeft, 17),
];

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("frame of {0} bytes is too short")]
    FrameTooShort(usize),
    #[error("no message registered for control byte {0}")]
    UnknownControlByte(u8),
    #[error("no control byte registered for {0}")]
    UnmappedKind(String),
    #[error("malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

pub fn inbound_kind(code: u8) -> Option<InboundKind> {
    INBOUND_CODES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, kind)| *kind)
}

pub fn inbound_code(kind: InboundKind) -> Option<u8> {
    INBOUND_CODES
        .iter()
        .find(|(_, k)| *k == kind)
        .map(|(code, _)| *code)
}

pub fn outbound_code(kind: OutboundKind) -> Option<u8> {
    OUTBOUND_CODES
        .iter()
        .find(|(k, _)| *k == kind)
        .map(|(_, code)| *code)
}

pub fn outbound_kind(code: u8) -> Option<OutboundKind> {
    OUTBOUND_CODES
        .iter()
        .find(|(_, c)| *c == code)
        .map(|(kind, _)| *kind)
}

fn split_frame(frame: &[u8]) -> Result<(u8, &[u8]), CodecError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(CodecError::FrameTooShort(frame.len()));
    }
    Ok((frame[0], &frame[1..]))
}

fn payload<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn frame(code: u8, body: Vec<u8>) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(body.len() + 1);
    bytes.push(code);
    bytes.extend_from_slice(&body);
    bytes
}

/// Decodes a frame received by the server.
pub fn decode_inbound(frame: &[u8]) -> Result<Inbound, CodecError> {
    let (code, body) = split_frame(frame)?;
    let kind = inbound_kind(code).ok_or(CodecError::UnknownControlByte(code))?;

    let packet = match kind {
        InboundKind::JoinMatch => Inbound::JoinMatch(payload(body)?),
        InboundKind::HostQuiz => Inbound::HostQuiz(payload(body)?),
        InboundKind::ChangeState => Inbound::ChangeState(payload(body)?),
        InboundKind::StartMatch => Inbound::StartMatch(payload(body)?),
        InboundKind::SubmitAnswer => Inbound::SubmitAnswer(payload(body)?),
        InboundKind::NextQuestion => Inbound::NextQuestion(payload(body)?),
        InboundKind::KickPlayer => Inbound::KickPlayer(payload(body)?),
        InboundKind::HostLeave => Inbound::HostLeave(payload(body)?),
        InboundKind::Leave => Inbound::Leave(payload(body)?),
    };
    Ok(packet)
}

/// Encodes a frame for the server to send.
pub fn encode_outbound(packet: &Outbound) -> Result<Vec<u8>, CodecError> {
    let kind = packet.kind();
    let code = outbound_code(kind).ok_or_else(|| CodecError::UnmappedKind(format!("{:?}", kind)))?;
    Ok(frame(code, serde_json::to_vec(packet)?))
}

/// Encodes a frame for a client to send.
pub fn encode_inbound(packet: &Inbound) -> Result<Vec<u8>, CodecError> {
    let kind = packet.kind();
    let code = inbound_code(kind).ok_or_else(|| CodecError::UnmappedKind(format!("{:?}", kind)))?;
    Ok(frame(code, serde_json::to_vec(packet)?))
}

/// Decodes a frame received by a client.
pub fn decode_outbound(frame: &[u8]) -> Result<Outbound, CodecError> {
    let (code, body) = split_frame(frame)?;
    let kind = outbound_kind(code).ok_or(CodecError::UnknownControlByte(code))?;

    let packet = match kind {
        OutboundKind::HostQuizAck => Outbound::HostQuizAck(payload(body)?),
        OutboundKind::StateChanged => Outbound::StateChanged(payload(body)?),
        OutboundKind::QuestionShown => Outbound::QuestionShown(payload(body)?),
        OutboundKind::PlayerJoined => Outbound::PlayerJoined(payload(body)?),
        OutboundKind::Tick => Outbound::Tick(payload(body)?),
        OutboundKind::AnswerFeedback => Outbound::AnswerFeedback(payload(body)?),
        OutboundKind::HostReveal => Outbound::HostReveal(payload(body)?),
        OutboundKind::ScoreUpdate => Outbound::ScoreUpdate(payload(body)?),
        OutboundKind::Leaderboard => Outbound::Leaderboard(payload(body)?),
        OutboundKind::PlayerRank => Outbound::PlayerRank(payload(body)?),
        OutboundKind::MatchEnded => Outbound::MatchEnded(payload(body)?),
        OutboundKind::PlayerLeft => Outbound::PlayerLeft(payload(body)?),
    };
    Ok(packet)
}
