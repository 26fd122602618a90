//! Packet payloads exchanged over the persistent connection.
//!
//! Client-to-server traffic is modelled by [`Inbound`], server-to-client
//! traffic by [`Outbound`]. Each variant wraps a payload struct that is
//! serialized as a JSON object with camelCase keys. The control byte that
//! selects the variant on the wire lives in [`crate::codec`].

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::quiz::Question;

/// Phase of a match as seen by clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum GameState {
    Lobby,
    Play,
    Intermission,
    Reveal,
    End,
    GameEnded,
}

impl From<GameState> for u8 {
    fn from(state: GameState) -> u8 {
        match state {
            GameState::Lobby => 0,
            GameState::Play => 1,
            GameState::Intermission => 2,
            GameState::Reveal => 3,
            GameState::End => 4,
            GameState::GameEnded => 5,
        }
    }
}

impl TryFrom<u8> for GameState {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(GameState::Lobby),
            1 => Ok(GameState::Play),
            2 => Ok(GameState::Intermission),
            3 => Ok(GameState::Reveal),
            4 => Ok(GameState::End),
            5 => Ok(GameState::GameEnded),
            other => Err(format!("unknown game state {}", other)),
        }
    }
}

/// Public view of a player, sent when someone joins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerInfo {
    pub id: Uuid,
    pub name: String,
    pub score: u32,
    pub correct_streak: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub name: String,
    pub points: u32,
    pub correct_count: u32,
}

// ---------------------------------------------------------------------------
// Client -> server
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinMatch {
    pub code: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostQuiz {
    pub quiz_id: String,
}

/// Host request to move the match along; only `Intermission` is acted upon.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeState {
    pub state: GameState,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StartMatch {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAnswer {
    pub question: usize,
    pub choice: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NextQuestion {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KickPlayer {
    pub player_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HostLeave {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Leave {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub player_id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundKind {
    JoinMatch,
    HostQuiz,
    ChangeState,
    StartMatch,
    SubmitAnswer,
    NextQuestion,
    KickPlayer,
    HostLeave,
    Leave,
}

/// Message sent by a host or player.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Inbound {
    JoinMatch(JoinMatch),
    HostQuiz(HostQuiz),
    ChangeState(ChangeState),
    StartMatch(StartMatch),
    SubmitAnswer(SubmitAnswer),
    NextQuestion(NextQuestion),
    KickPlayer(KickPlayer),
    HostLeave(HostLeave),
    Leave(Leave),
}

impl Inbound {
    pub fn kind(&self) -> InboundKind {
        match self {
            Inbound::JoinMatch(_) => InboundKind::JoinMatch,
            Inbound::HostQuiz(_) => InboundKind::HostQuiz,
            Inbound::ChangeState(_) => InboundKind::ChangeState,
            Inbound::StartMatch(_) => InboundKind::StartMatch,
            Inbound::SubmitAnswer(_) => InboundKind::SubmitAnswer,
            Inbound::NextQuestion(_) => InboundKind::NextQuestion,
            Inbound::KickPlayer(_) => InboundKind::KickPlayer,
            Inbound::HostLeave(_) => InboundKind::HostLeave,
            Inbound::Leave(_) => InboundKind::Leave,
        }
    }
}

// ---------------------------------------------------------------------------
// Server -> client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HostQuizAck {
    /// Join code of the new match; browser hosts read it as `quizId`.
    #[serde(rename = "quizId")]
    pub code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateChanged {
    pub state: GameState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionShown {
    pub question: Question,
    pub question_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerJoined {
    pub player: PlayerInfo,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tick {
    pub tick: u32,
}

/// Private result of one round, sent to each player at reveal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerFeedback {
    pub is_correct: bool,
    pub correct_answer_index: Vec<usize>,
    pub streak_bonus: u32,
    pub max_streak: u32,
}

/// Aggregate reveal for the host screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HostReveal {
    pub question: Question,
    pub correct_answer_index: Vec<usize>,
    pub answer_counts: Vec<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreUpdate {
    /// Cumulative points
    pub points: u32,
    /// Points won this round
    pub awarded: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leaderboard {
    pub points: Vec<LeaderboardEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerRank {
    pub rank: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MatchEnded {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerLeft {
    pub player_id: Uuid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundKind {
    HostQuizAck,
    StateChanged,
    QuestionShown,
    PlayerJoined,
    Tick,
    AnswerFeedback,
    HostReveal,
    ScoreUpdate,
    Leaderboard,
    PlayerRank,
    MatchEnded,
    PlayerLeft,
}

/// Message sent by the server to a host or player.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Outbound {
    HostQuizAck(HostQuizAck),
    StateChanged(StateChanged),
    QuestionShown(QuestionShown),
    PlayerJoined(PlayerJoined),
    Tick(Tick),
    AnswerFeedback(AnswerFeedback),
    HostReveal(HostReveal),
    ScoreUpdate(ScoreUpdate),
    Leaderboard(Leaderboard),
    PlayerRank(PlayerRank),
    MatchEnded(MatchEnded),
    PlayerLeft(PlayerLeft),
}

impl Outbound {
    pub fn kind(&self) -> OutboundKind {
        match self {
            Outbound::HostQuizAck(_) => OutboundKind::HostQuizAck,
            Outbound::StateChanged(_) => OutboundKind::StateChanged,
            Outbound::QuestionShown(_) => OutboundKind::QuestionShown,
            Outbound::PlayerJoined(_) => OutboundKind::PlayerJoined,
            Outbound::Tick(_) => OutboundKind::Tick,
            Outbound::AnswerFeedback(_) => OutboundKind::AnswerFeedback,
            Outbound::HostReveal(_) => OutboundKind::HostReveal,
            Outbound::ScoreUpdate(_) => OutboundKind::ScoreUpdate,
            Outbound::Leaderboard(_) => OutboundKind::Leaderboard,
            Outbound::PlayerRank(_) => OutboundKind::PlayerRank,
            Outbound::MatchEnded(_) => OutboundKind::MatchEnded,
            Outbound::PlayerLeft(_) => OutboundKind::PlayerLeft,
        }
    }

    pub fn state_changed(state: GameState) -> Self {
        Outbound::StateChanged(StateChanged { state, code: None })
    }
}
