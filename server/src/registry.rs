//! Match registry and packet routing.
//!
//! The registry maps 6-digit join codes to live matches and routes every
//! decoded packet to the match its connection belongs to. It also answers
//! the request/response boundary calls (name check, code check, results
//! export, quiz lookup).
//!
//! Lock order is registry, then match. The registry lock is never held while
//! waiting on a match lock: lookups that need to inspect match state first
//! take a snapshot of the match list and release the registry lock.

use log::{debug, info, warn};
use rand::Rng;
use shared::packets::{HostQuizAck, StateChanged};
use shared::{decode_inbound, GameState, Inbound, LeaderboardEntry, Outbound, Quiz};
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::connection::{Connection, ConnectionId};
use crate::game::{Match, MatchSettings};
use crate::quiz_store::QuizProvider;

pub const CODE_MIN: u32 = 100_000;
pub const CODE_MAX: u32 = 999_999;

/// Failure of a boundary lookup.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LookupError {
    #[error("no active match with code {0}")]
    MatchNotFound(String),
    #[error("name {0:?} is already taken")]
    NameTaken(String),
    #[error("match {0} has already started")]
    AlreadyStarted(String),
    #[error("quiz {0} not found")]
    QuizNotFound(u64),
}

pub struct MatchRegistry {
    matches: RwLock<HashMap<String, Arc<Match>>>,
    quizzes: Arc<dyn QuizProvider>,
    settings: MatchSettings,
}

impl MatchRegistry {
    pub fn new(quizzes: Arc<dyn QuizProvider>, settings: MatchSettings) -> Self {
        Self {
            matches: RwLock::new(HashMap::new()),
            quizzes,
            settings,
        }
    }

    /// Registers a new match in `Lobby` under a fresh join code.
    pub async fn create_match(&self, quiz: Quiz, host: Connection) -> Arc<Match> {
        let mut matches = self.matches.write().await;
        let mut rng = rand::thread_rng();
        let code = loop {
            let candidate = rng.gen_range(CODE_MIN..=CODE_MAX).to_string();
            if !matches.contains_key(&candidate) {
                break candidate;
            }
        };

        let game = Arc::new(Match::new(quiz, code.clone(), host, self.settings.clone()));
        matches.insert(code, Arc::clone(&game));
        info!(
            "Match {} created for quiz {} ({} active)",
            game.code(),
            game.quiz().id,
            matches.len()
        );
        game
    }

    pub async fn find_by_code(&self, code: &str) -> Option<Arc<Match>> {
        self.matches.read().await.get(code.trim()).cloned()
    }

    pub async fn find_by_host(&self, connection: ConnectionId) -> Option<Arc<Match>> {
        self.matches
            .read()
            .await
            .values()
            .find(|game| game.is_host(connection))
            .cloned()
    }

    pub async fn find_by_player(&self, connection: ConnectionId) -> Option<Arc<Match>> {
        let snapshot: Vec<Arc<Match>> = self.matches.read().await.values().cloned().collect();
        for game in snapshot {
            if game.has_player(connection).await {
                return Some(game);
            }
        }
        None
    }

    /// Removes a match, unless its code has since been reused.
    pub async fn remove(&self, game: &Match) -> bool {
        let mut matches = self.matches.write().await;
        match matches.get(game.code()) {
            Some(current) if current.id() == game.id() => {
                matches.remove(game.code());
                info!("Match {} removed ({} active)", game.code(), matches.len());
                true
            }
            _ => false,
        }
    }

    pub async fn len(&self) -> usize {
        self.matches.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.matches.read().await.is_empty()
    }

    async fn is_bound(&self, connection: ConnectionId) -> bool {
        self.find_by_host(connection).await.is_some()
            || self.find_by_player(connection).await.is_some()
    }

    /// Tears a match down and unregisters it.
    pub async fn end_match(&self, game: &Arc<Match>) {
        game.end().await;
        self.remove(game).await;
    }

    /// Decodes one frame and routes it.
    ///
    /// Undecodable frames and packets that don't apply to the connection's
    /// role or the match state are dropped without a reply.
    pub async fn dispatch(&self, connection: &Connection, frame: &[u8]) {
        let packet = match decode_inbound(frame) {
            Ok(packet) => packet,
            Err(e) => {
                debug!("Connection {}: dropping frame: {}", connection.id(), e);
                return;
            }
        };
        let id = connection.id();

        match packet {
            Inbound::JoinMatch(join) => {
                if self.is_bound(id).await {
                    debug!("Connection {} is already in a match", id);
                    return;
                }
                match self.find_by_code(&join.code).await {
                    Some(game) => {
                        game.join(&join.name, connection.clone()).await;
                    }
                    None => debug!("Connection {}: no match with code {}", id, join.code),
                }
            }
            Inbound::HostQuiz(request) => self.host_quiz(connection, &request.quiz_id).await,
            Inbound::StartMatch(_) => {
                if let Some(game) = self.find_by_host(id).await {
                    game.start().await;
                }
            }
            Inbound::ChangeState(change) => {
                if change.state != GameState::Intermission {
                    return;
                }
                if let Some(game) = self.find_by_host(id).await {
                    game.advance().await;
                }
            }
            Inbound::NextQuestion(_) => {
                if let Some(game) = self.find_by_host(id).await {
                    game.next_question().await;
                }
            }
            Inbound::KickPlayer(kick) => {
                let Some(game) = self.find_by_host(id).await else {
                    return;
                };
                match Uuid::parse_str(kick.player_id.trim()) {
                    Ok(player_id) => {
                        game.kick(&player_id).await;
                    }
                    Err(_) => debug!("Connection {}: bad player id {:?}", id, kick.player_id),
                }
            }
            Inbound::SubmitAnswer(answer) => {
                if let Some(game) = self.find_by_player(id).await {
                    game.submit_answer(id, answer.question, answer.choice).await;
                }
            }
            Inbound::Leave(leave) => {
                let Some(game) = self.find_by_player(id).await else {
                    return;
                };
                if let Some(claimed) = leave.player_id.as_deref() {
                    let own = game.player_id(id).await.map(|p| p.to_string());
                    if own.as_deref() != Some(claimed.trim()) {
                        warn!("Connection {} tried to remove player {}", id, claimed);
                        return;
                    }
                }
                game.leave(id).await;
            }
            Inbound::HostLeave(_) => {
                if let Some(game) = self.find_by_host(id).await {
                    info!("Host left match {}", game.code());
                    self.end_match(&game).await;
                }
            }
        }
    }

    async fn host_quiz(&self, connection: &Connection, quiz_id: &str) {
        if self.is_bound(connection.id()).await {
            debug!("Connection {} is already in a match", connection.id());
            return;
        }
        let Ok(quiz_id) = quiz_id.trim().parse::<u64>() else {
            debug!("Connection {}: bad quiz id {:?}", connection.id(), quiz_id);
            return;
        };
        let Some(quiz) = self.quizzes.get_quiz_by_id(quiz_id) else {
            warn!("Connection {} asked to host unknown quiz {}", connection.id(), quiz_id);
            return;
        };

        let game = self.create_match(quiz, connection.clone()).await;
        let code = game.code().to_string();
        connection.send(&Outbound::HostQuizAck(HostQuizAck { code: code.clone() }));
        connection.send(&Outbound::StateChanged(StateChanged {
            state: GameState::Lobby,
            code: Some(code),
        }));
    }

    /// Cleans up after a connection went away.
    ///
    /// A departing host ends their match; a departing player leaves theirs.
    pub async fn on_disconnect(&self, connection: &Connection) {
        let id = connection.id();
        if let Some(game) = self.find_by_host(id).await {
            match connection.addr() {
                Some(addr) => info!("Host of match {} disconnected ({})", game.code(), addr),
                None => info!("Host of match {} disconnected", game.code()),
            }
            self.end_match(&game).await;
        } else if let Some(game) = self.find_by_player(id).await {
            game.leave(id).await;
        }
    }

    /// Checks whether `name` is still free in the match with `code`.
    pub async fn check_name(&self, code: &str, name: &str) -> Result<(), LookupError> {
        let game = self
            .find_by_code(code)
            .await
            .ok_or_else(|| LookupError::MatchNotFound(code.to_string()))?;
        if game.is_name_taken(name.trim()).await {
            return Err(LookupError::NameTaken(name.to_string()));
        }
        Ok(())
    }

    /// Checks that a match exists and is still accepting players in its lobby.
    pub async fn check_code(&self, code: &str) -> Result<(), LookupError> {
        let game = self
            .find_by_code(code)
            .await
            .ok_or_else(|| LookupError::MatchNotFound(code.to_string()))?;
        if game.state().await != GameState::Lobby {
            return Err(LookupError::AlreadyStarted(code.to_string()));
        }
        Ok(())
    }

    /// Results of a registered match in leaderboard order.
    pub async fn export_results(&self, code: &str) -> Result<Vec<LeaderboardEntry>, LookupError> {
        let game = self
            .find_by_code(code)
            .await
            .ok_or_else(|| LookupError::MatchNotFound(code.to_string()))?;
        Ok(game.standings().await)
    }

    pub fn quiz(&self, id: u64) -> Result<Quiz, LookupError> {
        self.quizzes
            .get_quiz_by_id(id)
            .ok_or(LookupError::QuizNotFound(id))
    }
}
