//! # Quiz Match Server Library
//!
//! This library provides the authoritative server for live multiplayer quiz
//! matches. A host picks a quiz and receives a 6-digit join code; players join
//! with the code and a display name, answer timed questions, and are scored on
//! correctness, speed and answer streaks. The server owns all match state and
//! pushes every change to the connected clients.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Match State
//! Each match runs its own state machine
//! (`Lobby -> Play -> Reveal -> Intermission -> ... -> End`) and its own
//! countdown clock. Clients only send intents; the server decides whether an
//! intent applies to the current state and ignores it otherwise.
//!
//! ### Connection Handling
//! Hosts and players connect over a WebSocket. Each connection runs a single
//! event loop that forwards received frames to the registry, writes queued
//! outbound frames, pings the peer and enforces a read deadline. Whatever ends
//! a connection, its departure is reported once: a departing host ends the
//! match, a departing player leaves it.
//!
//! ### Boundary Calls
//! A few request/response HTTP routes let clients check a code or a name
//! before joining, export final results as CSV, and fetch a quiz.
//!
//! ## Concurrency Design
//!
//! Every match keeps its mutable state behind one read/write lock and performs
//! each transition, including scoring, under the exclusive lock. The registry
//! keeps its own lock over the code -> match map and never holds it while
//! waiting on a match. Outbound traffic goes through per-connection unbounded
//! queues, so match code never waits on the network.
//!
//! ## Module Organization
//!
//! ### Connection Module (`connection`)
//! Cheap clonable handles that queue encoded frames for a socket task.
//!
//! ### Roster Module (`roster`)
//! Players of one match, capacity and name uniqueness.
//!
//! ### Scoring Module (`scoring`)
//! Points for one question and leaderboard ordering.
//!
//! ### Game Module (`game`)
//! The match state machine and its countdown clock.
//!
//! ### Registry Module (`registry`)
//! Join codes, packet routing and the lookups behind the HTTP routes.
//!
//! ### Network and API Modules (`network`, `api`)
//! WebSocket connection loop, listening server, HTTP routes.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::api::AppState;
//! use server::game::MatchSettings;
//! use server::network::{Server, TransportSettings};
//! use server::quiz_store::QuizStore;
//! use server::registry::MatchRegistry;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let quizzes = QuizStore::load(Path::new("data/quizzes.json"))?;
//!     let registry = MatchRegistry::new(Arc::new(quizzes), MatchSettings::default());
//!     let state = AppState::new(registry, TransportSettings::default());
//!
//!     let server = Server::bind("127.0.0.1:3000", state).await?;
//!     server.run().await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod config;
pub mod connection;
pub mod game;
pub mod network;
pub mod quiz_store;
pub mod registry;
pub mod roster;
pub mod scoring;
