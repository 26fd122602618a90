//! Player roster for a single match.
//!
//! The roster owns every [`Player`] in a match: identity, the connection the
//! player answers from, and the round-scoped answer state. It enforces the
//! capacity limit and name uniqueness. It does no locking of its own; the
//! owning match keeps it behind its read/write lock.

use log::info;
use shared::PlayerInfo;
use thiserror::Error;
use uuid::Uuid;

use crate::connection::{Connection, ConnectionId};

/// A participant in one match.
#[derive(Debug, Clone)]
pub struct Player {
    /// Process-unique identifier generated at join
    pub id: Uuid,
    /// Display name, unique within the match
    pub name: String,
    /// Connection the player joined from
    pub connection: Connection,
    /// Whether the player has answered the current question
    pub answered: bool,
    /// Choice index submitted for the current question
    pub current_answer: usize,
    /// Countdown value at the moment of submission
    pub answer_time_remaining: u32,
    pub points: u32,
    pub correct_streak: u32,
    pub max_correct_streak: u32,
    /// Points won in the most recently scored round
    pub last_awarded_points: u32,
}

impl Player {
    pub fn new(name: &str, connection: Connection) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            connection,
            answered: false,
            current_answer: 0,
            answer_time_remaining: 0,
            points: 0,
            correct_streak: 0,
            max_correct_streak: 0,
            last_awarded_points: 0,
        }
    }

    /// Records an answer. Returns false if the player already answered.
    pub fn record_answer(&mut self, choice: usize, time_remaining: u32) -> bool {
        if self.answered {
            return false;
        }
        self.answered = true;
        self.current_answer = choice;
        self.answer_time_remaining = time_remaining;
        true
    }

    pub fn info(&self) -> PlayerInfo {
        PlayerInfo {
            id: self.id,
            name: self.name.clone(),
            score: self.points,
            correct_streak: self.correct_streak,
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum JoinError {
    #[error("match is full ({0} players)")]
    Full(usize),
    #[error("name {0:?} is already taken")]
    NameTaken(String),
    #[error("connection {0} already has a player")]
    AlreadyJoined(ConnectionId),
}

pub struct Roster {
    players: Vec<Player>,
    max_players: usize,
}

impl Roster {
    pub fn new(max_players: usize) -> Self {
        Self {
            players: Vec::new(),
            max_players,
        }
    }

    /// Adds a player, returning its public view.
    pub fn add_player(&mut self, name: &str, connection: Connection) -> Result<PlayerInfo, JoinError> {
        if self.players.len() >= self.max_players {
            return Err(JoinError::Full(self.max_players));
        }
        if self.is_name_taken(name) {
            return Err(JoinError::NameTaken(name.to_string()));
        }
        if self.find_by_connection(connection.id()).is_some() {
            return Err(JoinError::AlreadyJoined(connection.id()));
        }

        let player = Player::new(name, connection);
        info!("Player {} ({}) joined", player.name, player.id);
        let view = player.info();
        self.players.push(player);
        Ok(view)
    }

    pub fn remove_player(&mut self, player_id: &Uuid) -> Option<Player> {
        let index = self.players.iter().position(|p| p.id == *player_id)?;
        let player = self.players.remove(index);
        info!(
            "Player {} ({}) removed, {} remaining",
            player.name,
            player.id,
            self.players.len()
        );
        Some(player)
    }

    pub fn get(&self, player_id: &Uuid) -> Option<&Player> {
        self.players.iter().find(|p| p.id == *player_id)
    }

    pub fn find_by_connection(&self, connection: ConnectionId) -> Option<&Player> {
        self.players.iter().find(|p| p.connection.id() == connection)
    }

    pub fn find_by_connection_mut(&mut self, connection: ConnectionId) -> Option<&mut Player> {
        self.players
            .iter_mut()
            .find(|p| p.connection.id() == connection)
    }

    pub fn is_name_taken(&self, name: &str) -> bool {
        self.players.iter().any(|p| p.name == name)
    }

    /// True when there is at least one player and every player has answered.
    pub fn all_answered(&self) -> bool {
        !self.is_empty() && self.players.iter().all(|p| p.answered)
    }

    pub fn reset_answers(&mut self) {
        for player in &mut self.players {
            player.answered = false;
        }
    }

    /// Removes every player, handing them back for teardown.
    pub fn drain(&mut self) -> Vec<Player> {
        std::mem::take(&mut self.players)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Player> {
        self.players.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Player> {
        self.players.iter_mut()
    }

    pub fn len(&self) -> usize {
        self.players.len()
    }

    pub fn is_empty(&self) -> bool {
        self.players.is_empty()
    }
}
