//! Match state machine.
//!
//! A [`Match`] owns one hosted quiz: the question snapshot, the player
//! roster, the round state and a per-match countdown clock. All mutable state
//! sits behind a single read/write lock; every transition, including the
//! scoring pass at reveal, runs under the exclusive form of that lock so a
//! concurrent join, leave or kick can never observe half a transition.
//!
//! States advance as
//! `Lobby -> Play -> Reveal -> Intermission -> Play ... -> End`, and any
//! state ends in `GameEnded` when the host leaves.

use log::{debug, info, warn};
use shared::packets::{
    AnswerFeedback, HostReveal, Leaderboard, MatchEnded, PlayerJoined, PlayerLeft, PlayerRank,
    QuestionShown, ScoreUpdate, Tick,
};
use shared::{encode_outbound, GameState, LeaderboardEntry, Outbound, PlayerInfo, Quiz};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio::time::{interval, MissedTickBehavior};
use uuid::Uuid;

use crate::connection::{Connection, ConnectionId};
use crate::roster::{Player, Roster};
use crate::scoring;

/// Countdown resolution.
pub const CLOCK_PERIOD: Duration = Duration::from_secs(1);

pub const DEFAULT_MAX_PLAYERS: usize = 200;

#[derive(Debug, Clone)]
pub struct MatchSettings {
    pub max_players: usize,
    /// Time between countdown ticks
    pub clock_period: Duration,
}

impl Default for MatchSettings {
    fn default() -> Self {
        Self {
            max_players: DEFAULT_MAX_PLAYERS,
            clock_period: CLOCK_PERIOD,
        }
    }
}

/// State guarded by the match lock.
struct MatchInner {
    state: GameState,
    current_question: usize,
    /// Whole seconds left on the countdown
    time: u32,
    roster: Roster,
    /// Correct answers per player over the whole match
    correct_counts: HashMap<Uuid, u32>,
    /// Cleared exactly once, at teardown
    alive: bool,
    clock_running: bool,
}

pub struct Match {
    id: Uuid,
    code: String,
    quiz: Quiz,
    host: Connection,
    settings: MatchSettings,
    inner: RwLock<MatchInner>,
    cancel: watch::Sender<bool>,
}

impl Match {
    pub fn new(quiz: Quiz, code: String, host: Connection, settings: MatchSettings) -> Self {
        let (cancel, _) = watch::channel(false);
        let inner = MatchInner {
            state: GameState::Lobby,
            current_question: 0,
            time: 0,
            roster: Roster::new(settings.max_players),
            correct_counts: HashMap::new(),
            alive: true,
            clock_running: false,
        };

        Self {
            id: Uuid::new_v4(),
            code,
            quiz,
            host,
            settings,
            inner: RwLock::new(inner),
            cancel,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn quiz(&self) -> &Quiz {
        &self.quiz
    }

    pub fn is_host(&self, connection: ConnectionId) -> bool {
        self.host.id() == connection
    }

    pub async fn state(&self) -> GameState {
        self.inner.read().await.state
    }

    pub async fn time_remaining(&self) -> u32 {
        self.inner.read().await.time
    }

    pub async fn current_question(&self) -> usize {
        self.inner.read().await.current_question
    }

    pub async fn player_count(&self) -> usize {
        self.inner.read().await.roster.len()
    }

    pub async fn has_player(&self, connection: ConnectionId) -> bool {
        self.inner
            .read()
            .await
            .roster
            .find_by_connection(connection)
            .is_some()
    }

    pub async fn player_id(&self, connection: ConnectionId) -> Option<Uuid> {
        self.inner
            .read()
            .await
            .roster
            .find_by_connection(connection)
            .map(|p| p.id)
    }

    pub async fn is_name_taken(&self, name: &str) -> bool {
        self.inner.read().await.roster.is_name_taken(name)
    }

    pub async fn player(&self, player_id: &Uuid) -> Option<Player> {
        self.inner.read().await.roster.get(player_id).cloned()
    }

    /// Final or interim results in leaderboard order.
    pub async fn standings(&self) -> Vec<LeaderboardEntry> {
        let inner = self.inner.read().await;
        scoring::standings(inner.roster.iter(), &inner.correct_counts)
            .into_iter()
            .map(|s| s.entry)
            .collect()
    }

    /// Sends a packet to every player and optionally the host.
    fn broadcast(&self, inner: &MatchInner, packet: &Outbound, include_host: bool) {
        let bytes = match encode_outbound(packet) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!("Match {}: failed to encode {:?}: {}", self.code, packet.kind(), e);
                return;
            }
        };

        for player in inner.roster.iter() {
            player.connection.send_bytes(bytes.clone());
        }
        if include_host {
            self.host.send_bytes(bytes);
        }
    }

    fn set_state(&self, inner: &mut MatchInner, state: GameState) {
        inner.state = state;
        self.broadcast(inner, &Outbound::state_changed(state), true);
    }

    fn spawn_clock(self: &Arc<Self>, inner: &mut MatchInner) {
        if inner.clock_running {
            return;
        }
        inner.clock_running = true;

        let game = Arc::clone(self);
        let mut cancelled = self.cancel.subscribe();
        let period = self.settings.clock_period;

        tokio::spawn(async move {
            let mut clock = interval(period);
            clock.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately.
            clock.tick().await;

            loop {
                tokio::select! {
                    _ = clock.tick() => {
                        if !game.tick().await {
                            break;
                        }
                    }
                    _ = cancelled.changed() => break,
                }
            }
            debug!("Match {}: clock stopped", game.code);
        });
    }

    fn stop_clock(&self, inner: &mut MatchInner) {
        if inner.clock_running {
            inner.clock_running = false;
            self.cancel.send_replace(true);
        }
    }

    /// Adds a player. Allowed in every state until the match has ended.
    pub async fn join(&self, name: &str, connection: Connection) -> Option<PlayerInfo> {
        let name = name.trim();
        if name.is_empty() {
            return None;
        }

        let mut inner = self.inner.write().await;
        if !inner.alive || inner.state == GameState::GameEnded {
            return None;
        }

        match inner.roster.add_player(name, connection.clone()) {
            Ok(player) => {
                connection.send(&Outbound::state_changed(inner.state));
                // Late joiners still get to answer the running question.
                if inner.state == GameState::Play {
                    if let Some(question) = self.quiz.question(inner.current_question) {
                        connection.send(&Outbound::QuestionShown(QuestionShown {
                            question: question.clone(),
                            question_index: inner.current_question,
                        }));
                    }
                }
                let joined = Outbound::PlayerJoined(PlayerJoined {
                    player: player.clone(),
                });
                self.host.send(&joined);
                connection.send(&joined);
                Some(player)
            }
            Err(e) => {
                debug!("Match {}: join rejected: {}", self.code, e);
                None
            }
        }
    }

    fn remove_player(&self, inner: &mut MatchInner, player_id: &Uuid) -> Option<Player> {
        let player = inner.roster.remove_player(player_id)?;
        self.host.send(&Outbound::PlayerLeft(PlayerLeft {
            player_id: player.id,
        }));

        // The player who left may have been the last one we were waiting for.
        if inner.state == GameState::Play && inner.roster.all_answered() {
            inner.time = 0;
        }
        Some(player)
    }

    /// Removes the player bound to `connection`.
    pub async fn leave(&self, connection: ConnectionId) -> Option<Uuid> {
        let mut inner = self.inner.write().await;
        let player_id = inner.roster.find_by_connection(connection)?.id;
        self.remove_player(&mut inner, &player_id).map(|p| p.id)
    }

    /// Removes a player on the host's request and hangs up their connection.
    pub async fn kick(&self, player_id: &Uuid) -> bool {
        let mut inner = self.inner.write().await;
        match self.remove_player(&mut inner, player_id) {
            Some(player) => {
                info!("Match {}: kicked {}", self.code, player.name);
                player.connection.close();
                true
            }
            None => false,
        }
    }

    /// `Lobby -> Play`: shows the first question and starts the clock.
    pub async fn start(self: &Arc<Self>) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.alive || inner.state != GameState::Lobby {
            return false;
        }
        let Some(question) = self.quiz.question(0) else {
            warn!("Match {}: quiz {} has no questions", self.code, self.quiz.id);
            return false;
        };

        inner.current_question = 0;
        inner.time = question.time_budget();
        self.set_state(&mut inner, GameState::Play);
        self.broadcast(
            &inner,
            &Outbound::QuestionShown(QuestionShown {
                question: question.clone(),
                question_index: 0,
            }),
            true,
        );
        self.spawn_clock(&mut inner);

        info!(
            "Match {} started with {} players",
            self.code,
            inner.roster.len()
        );
        true
    }

    /// Records a player's answer for the current question.
    ///
    /// Only the first in-bounds answer per player and question counts. When
    /// every player has answered the countdown is forced to zero, so the next
    /// tick reveals.
    pub async fn submit_answer(&self, connection: ConnectionId, question: usize, choice: usize) -> bool {
        {
            let inner = self.inner.read().await;
            match inner.roster.find_by_connection(connection) {
                Some(player) if inner.state == GameState::Play && !player.answered => {}
                _ => return false,
            }
        }

        let mut inner = self.inner.write().await;
        if !inner.alive || inner.state != GameState::Play || question != inner.current_question {
            return false;
        }
        let in_bounds = self
            .quiz
            .question(question)
            .map_or(false, |q| q.has_choice(choice));
        if !in_bounds {
            debug!("Match {}: choice {} out of range", self.code, choice);
            return false;
        }

        let time = inner.time;
        let Some(player) = inner.roster.find_by_connection_mut(connection) else {
            return false;
        };
        if !player.record_answer(choice, time) {
            return false;
        }

        if inner.roster.all_answered() {
            debug!("Match {}: everyone answered", self.code);
            inner.time = 0;
        }
        true
    }

    /// One countdown step. Returns false once the clock should stop.
    pub async fn tick(&self) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.alive || inner.state == GameState::End {
            return false;
        }

        if inner.time > 0 {
            inner.time -= 1;
            self.host.send(&Outbound::Tick(Tick { tick: inner.time }));
        }
        if inner.time == 0 && inner.state == GameState::Play {
            self.reveal(&mut inner);
        }
        true
    }

    /// `Play -> Reveal`: scores the round and reports the results.
    fn reveal(&self, inner: &mut MatchInner) {
        let Some(question) = self.quiz.question(inner.current_question) else {
            return;
        };

        inner.state = GameState::Reveal;
        self.host.send(&Outbound::state_changed(GameState::Reveal));

        let correct = question.correct_choices();
        let mut answer_counts = vec![0u32; question.choices.len()];
        for player in inner.roster.iter().filter(|p| p.answered) {
            if let Some(count) = answer_counts.get_mut(player.current_answer) {
                *count += 1;
            }
        }
        self.host.send(&Outbound::HostReveal(HostReveal {
            question: question.clone(),
            correct_answer_index: correct.clone(),
            answer_counts,
        }));

        let outcomes = scoring::score_round(
            inner.roster.iter_mut(),
            &correct,
            &mut inner.correct_counts,
        );
        for (player, outcome) in inner.roster.iter().zip(&outcomes) {
            player.connection.send(&Outbound::AnswerFeedback(AnswerFeedback {
                is_correct: outcome.is_correct,
                correct_answer_index: correct.clone(),
                streak_bonus: outcome.streak_bonus,
                max_streak: outcome.max_streak,
            }));
            player.connection.send(&Outbound::ScoreUpdate(ScoreUpdate {
                points: outcome.total,
                awarded: outcome.awarded,
            }));
        }

        info!(
            "Match {}: question {} revealed, {}/{} correct",
            self.code,
            inner.current_question + 1,
            outcomes.iter().filter(|o| o.is_correct).count(),
            outcomes.len()
        );
    }

    /// `Reveal -> Intermission`, or `Reveal -> End` after the last question.
    pub async fn advance(&self) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.alive || inner.state != GameState::Reveal {
            return false;
        }

        let table = scoring::standings(inner.roster.iter(), &inner.correct_counts);
        let leaderboard = Outbound::Leaderboard(Leaderboard {
            points: table.iter().map(|s| s.entry.clone()).collect(),
        });

        if self.quiz.is_last_question(inner.current_question) {
            self.set_state(&mut inner, GameState::End);
            self.broadcast(&inner, &leaderboard, true);
            for (index, standing) in table.iter().enumerate() {
                if let Some(player) = inner.roster.get(&standing.player_id) {
                    player
                        .connection
                        .send(&Outbound::PlayerRank(PlayerRank { rank: index + 1 }));
                }
            }
            self.stop_clock(&mut inner);
            info!("Match {} finished", self.code);
        } else {
            self.set_state(&mut inner, GameState::Intermission);
            self.broadcast(&inner, &leaderboard, true);
        }
        true
    }

    /// `Intermission -> Play` on the following question.
    pub async fn next_question(&self) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.alive || inner.state != GameState::Intermission {
            return false;
        }
        let next = inner.current_question + 1;
        let Some(question) = self.quiz.question(next) else {
            return false;
        };

        inner.current_question = next;
        inner.roster.reset_answers();
        inner.time = question.time_budget();
        self.set_state(&mut inner, GameState::Play);
        self.broadcast(
            &inner,
            &Outbound::QuestionShown(QuestionShown {
                question: question.clone(),
                question_index: next,
            }),
            true,
        );
        true
    }

    /// Any state `-> GameEnded`: stops the clock, notifies and disconnects
    /// every player. Returns false if the match had already ended.
    pub async fn end(&self) -> bool {
        let mut inner = self.inner.write().await;
        if !inner.alive {
            return false;
        }
        inner.alive = false;
        inner.state = GameState::GameEnded;
        self.stop_clock(&mut inner);

        let notices = [
            Outbound::state_changed(GameState::GameEnded),
            Outbound::MatchEnded(MatchEnded {}),
        ];
        let players = inner.roster.drain();
        for player in &players {
            for notice in &notices {
                player.connection.send(notice);
            }
            player.connection.close();
        }

        info!("Match {} ended, {} players disconnected", self.code, players.len());
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::{drain, Outgoing};
    use shared::{decode_outbound, Choice, Question};
    use tokio::sync::mpsc::UnboundedReceiver;

    fn question(time: u32) -> Question {
        Question {
            id: 0,
            name: "Which one?".to_string(),
            time,
            image_url: None,
            choices: vec![
                Choice::new("right", true),
                Choice::new("wrong", false),
                Choice::new("also wrong", false),
            ],
        }
    }

    fn quiz(questions: usize) -> Quiz {
        Quiz {
            id: 1,
            name: "Test quiz".to_string(),
            questions: (0..questions).map(|_| question(30)).collect(),
        }
    }

    fn settings(clock_period: Duration) -> MatchSettings {
        MatchSettings {
            max_players: 16,
            clock_period,
        }
    }

    /// Clock slow enough that tests drive every tick by hand.
    fn manual_match(quiz: Quiz) -> (Arc<Match>, UnboundedReceiver<Outgoing>) {
        let (host, host_rx) = Connection::open(None);
        let game = Match::new(
            quiz,
            "123456".to_string(),
            host,
            settings(Duration::from_secs(3600)),
        );
        (Arc::new(game), host_rx)
    }

    async fn join(game: &Match, name: &str) -> (PlayerInfo, Connection, UnboundedReceiver<Outgoing>) {
        let (conn, rx) = Connection::open(None);
        let info = game.join(name, conn.clone()).await.expect("join failed");
        (info, conn, rx)
    }

    fn drain_with_close(rx: &mut UnboundedReceiver<Outgoing>) -> (Vec<Outbound>, bool) {
        let mut packets = Vec::new();
        let mut closed = false;
        while let Ok(item) = rx.try_recv() {
            match item {
                Outgoing::Frame(bytes) => packets.push(decode_outbound(&bytes).unwrap()),
                Outgoing::Close => closed = true,
            }
        }
        (packets, closed)
    }

    async fn tick_n(game: &Match, n: usize) {
        for _ in 0..n {
            assert!(game.tick().await);
        }
    }

    #[tokio::test]
    async fn test_start_requires_questions() {
        let (game, _host_rx) = manual_match(quiz(0));
        assert!(!game.start().await);
        assert_eq!(game.state().await, GameState::Lobby);
    }

    #[tokio::test]
    async fn test_start_broadcasts_first_question() {
        let (game, mut host_rx) = manual_match(quiz(2));
        let (_, _, mut player_rx) = join(&game, "ann").await;
        drain(&mut host_rx);
        drain(&mut player_rx);

        assert!(game.start().await);
        assert_eq!(game.state().await, GameState::Play);
        assert_eq!(game.time_remaining().await, 30);

        for rx in [&mut host_rx, &mut player_rx] {
            let packets = drain(rx);
            assert_eq!(packets[0], Outbound::state_changed(GameState::Play));
            match &packets[1] {
                Outbound::QuestionShown(shown) => assert_eq!(shown.question_index, 0),
                other => panic!("Unexpected packet {:?}", other),
            }
        }

        // Only once.
        assert!(!game.start().await);
    }

    #[tokio::test]
    async fn test_join_notifies_host_and_player() {
        let (game, mut host_rx) = manual_match(quiz(1));
        let (info, _, mut player_rx) = join(&game, "  ann ").await;
        assert_eq!(info.name, "ann");

        let to_player = drain(&mut player_rx);
        assert_eq!(to_player[0], Outbound::state_changed(GameState::Lobby));
        assert!(matches!(&to_player[1], Outbound::PlayerJoined(j) if j.player.id == info.id));

        let to_host = drain(&mut host_rx);
        assert!(matches!(&to_host[0], Outbound::PlayerJoined(j) if j.player.name == "ann"));

        // Duplicate names and blank names are ignored.
        let (dup, _dup_rx) = Connection::open(None);
        assert!(game.join("ann", dup.clone()).await.is_none());
        assert!(game.join("   ", dup).await.is_none());
        assert_eq!(game.player_count().await, 1);
    }

    #[tokio::test]
    async fn test_answers_outside_play_are_ignored() {
        let (game, _host_rx) = manual_match(quiz(2));
        let (info, conn, _rx) = join(&game, "ann").await;

        assert!(!game.submit_answer(conn.id(), 0, 0).await);

        game.start().await;
        game.submit_answer(conn.id(), 0, 0).await;
        game.tick().await;
        assert_eq!(game.state().await, GameState::Reveal);
        assert!(game.advance().await);
        assert_eq!(game.state().await, GameState::Intermission);

        assert!(!game.submit_answer(conn.id(), 0, 1).await);
        assert!(!game.submit_answer(conn.id(), 1, 1).await);
        assert_eq!(game.player(&info.id).await.unwrap().current_answer, 0);
    }

    #[tokio::test]
    async fn test_single_player_round_scores_126() {
        let (game, mut host_rx) = manual_match(quiz(2));
        assert!(game.start().await);

        let (info, conn, mut player_rx) = join(&game, "ann").await;
        tick_n(&game, 5).await;
        assert_eq!(game.time_remaining().await, 25);

        assert!(game.submit_answer(conn.id(), 0, 0).await);
        // Everyone answered: countdown forced to zero, reveal on the next tick.
        assert_eq!(game.time_remaining().await, 0);
        assert_eq!(game.state().await, GameState::Play);

        drain(&mut player_rx);
        drain(&mut host_rx);
        game.tick().await;
        assert_eq!(game.state().await, GameState::Reveal);

        let packets = drain(&mut player_rx);
        assert_eq!(
            packets[0],
            Outbound::AnswerFeedback(AnswerFeedback {
                is_correct: true,
                correct_answer_index: vec![0],
                streak_bonus: 0,
                max_streak: 1,
            })
        );
        assert_eq!(
            packets[1],
            Outbound::ScoreUpdate(ScoreUpdate {
                points: 126,
                awarded: 126
            })
        );

        let player = game.player(&info.id).await.unwrap();
        assert_eq!(player.points, 126);
        assert_eq!(player.last_awarded_points, 126);
        assert_eq!(player.answer_time_remaining, 25);

        let to_host = drain(&mut host_rx);
        assert_eq!(to_host[0], Outbound::state_changed(GameState::Reveal));
        match &to_host[1] {
            Outbound::HostReveal(reveal) => {
                assert_eq!(reveal.correct_answer_index, vec![0]);
                assert_eq!(reveal.answer_counts, vec![1, 0, 0]);
            }
            other => panic!("Unexpected packet {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_duplicate_answer_is_a_noop() {
        let (game, _host_rx) = manual_match(quiz(1));
        let (info, conn, _rx) = join(&game, "ann").await;
        let (_, other, _other_rx) = join(&game, "bob").await;
        game.start().await;

        assert!(game.submit_answer(conn.id(), 0, 0).await);
        assert!(!game.submit_answer(conn.id(), 0, 1).await);
        // Bob hasn't answered, so the clock keeps running.
        assert_eq!(game.time_remaining().await, 30);

        tick_n(&game, 30).await;
        assert_eq!(game.state().await, GameState::Reveal);
        let player = game.player(&info.id).await.unwrap();
        assert_eq!(player.current_answer, 0);
        assert_eq!(player.points, 126);
        assert_eq!(player.correct_streak, 1);

        // Late answers after reveal change nothing.
        assert!(!game.submit_answer(other.id(), 0, 0).await);
        assert_eq!(game.player(&info.id).await.unwrap().points, 126);
    }

    #[tokio::test]
    async fn test_out_of_range_answer_can_be_retried() {
        let (game, _host_rx) = manual_match(quiz(1));
        let (info, conn, _rx) = join(&game, "ann").await;
        game.start().await;

        assert!(!game.submit_answer(conn.id(), 0, 3).await);
        assert!(!game.submit_answer(conn.id(), 1, 0).await);
        assert!(!game.player(&info.id).await.unwrap().answered);
        assert!(game.submit_answer(conn.id(), 0, 2).await);
    }

    #[tokio::test]
    async fn test_end_only_after_last_question() {
        let (game, mut host_rx) = manual_match(quiz(2));
        let (_, conn_a, mut rx_a) = join(&game, "ann").await;
        let (_, conn_b, mut rx_b) = join(&game, "bob").await;

        assert!(!game.advance().await);
        game.start().await;
        assert!(!game.advance().await);
        assert!(!game.next_question().await);

        // Round one: ann right, bob wrong.
        game.submit_answer(conn_a.id(), 0, 0).await;
        game.submit_answer(conn_b.id(), 0, 1).await;
        game.tick().await;
        assert!(game.advance().await);
        assert_eq!(game.state().await, GameState::Intermission);
        assert!(!game.advance().await);

        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut host_rx);
        assert!(game.next_question().await);
        assert_eq!(game.current_question().await, 1);
        assert_eq!(game.time_remaining().await, 30);
        let packets = drain(&mut rx_b);
        assert!(matches!(&packets[1], Outbound::QuestionShown(s) if s.question_index == 1));

        // Round two: both right, bob faster.
        game.submit_answer(conn_b.id(), 1, 0).await;
        game.tick().await;
        game.submit_answer(conn_a.id(), 1, 0).await;
        game.tick().await;
        drain(&mut rx_a);
        drain(&mut rx_b);
        drain(&mut host_rx);

        assert!(game.advance().await);
        assert_eq!(game.state().await, GameState::End);

        let to_host = drain(&mut host_rx);
        assert_eq!(to_host[0], Outbound::state_changed(GameState::End));
        match &to_host[1] {
            Outbound::Leaderboard(board) => {
                assert_eq!(board.points[0].name, "ann");
                // 126 + (100 + 24 + 10)
                assert_eq!(board.points[0].points, 260);
                assert_eq!(board.points[0].correct_count, 2);
                assert_eq!(board.points[1].name, "bob");
                assert_eq!(board.points[1].points, 126);
            }
            other => panic!("Unexpected packet {:?}", other),
        }

        let to_bob = drain(&mut rx_b);
        assert_eq!(to_bob.last(), Some(&Outbound::PlayerRank(PlayerRank { rank: 2 })));
        let to_ann = drain(&mut rx_a);
        assert_eq!(to_ann.last(), Some(&Outbound::PlayerRank(PlayerRank { rank: 1 })));

        // The clock is finished once the match is over.
        assert!(!game.tick().await);
    }

    #[tokio::test]
    async fn test_kick_closes_connection() {
        let (game, mut host_rx) = manual_match(quiz(1));
        let (info, _, mut rx) = join(&game, "ann").await;
        drain(&mut host_rx);

        assert!(game.kick(&info.id).await);
        assert!(!game.kick(&info.id).await);
        assert_eq!(game.player_count().await, 0);

        let (_, closed) = drain_with_close(&mut rx);
        assert!(closed);
        assert_eq!(
            drain(&mut host_rx),
            vec![Outbound::PlayerLeft(PlayerLeft { player_id: info.id })]
        );
    }

    #[tokio::test]
    async fn test_leave_of_last_straggler_triggers_reveal() {
        let (game, _host_rx) = manual_match(quiz(1));
        let (_, conn_a, _rx_a) = join(&game, "ann").await;
        let (info_b, conn_b, _rx_b) = join(&game, "bob").await;
        game.start().await;

        game.submit_answer(conn_a.id(), 0, 0).await;
        assert_eq!(game.leave(conn_b.id()).await, Some(info_b.id));
        assert_eq!(game.time_remaining().await, 0);
        game.tick().await;
        assert_eq!(game.state().await, GameState::Reveal);
        assert_eq!(game.leave(conn_b.id()).await, None);
    }

    #[tokio::test]
    async fn test_end_disconnects_everyone() {
        let (game, _host_rx) = manual_match(quiz(2));
        let (_, _, mut rx_a) = join(&game, "ann").await;
        let (_, _, mut rx_b) = join(&game, "bob").await;
        game.start().await;
        drain(&mut rx_a);
        drain(&mut rx_b);

        assert!(game.end().await);
        assert!(!game.end().await);
        assert_eq!(game.state().await, GameState::GameEnded);
        assert_eq!(game.player_count().await, 0);

        for rx in [&mut rx_a, &mut rx_b] {
            let (packets, closed) = drain_with_close(rx);
            assert_eq!(
                packets,
                vec![
                    Outbound::state_changed(GameState::GameEnded),
                    Outbound::MatchEnded(MatchEnded {}),
                ]
            );
            assert!(closed);
        }

        assert!(!game.tick().await);
        let (late, _late_rx) = Connection::open(None);
        assert!(game.join("carl", late).await.is_none());
    }

    #[tokio::test]
    async fn test_late_join_sees_running_question() {
        let (game, _host_rx) = manual_match(quiz(2));
        let (_ann, _ann_conn, _ann_rx) = join(&game, "ann").await;
        assert!(game.start().await);

        let (_bob, bob_conn, mut bob_rx) = join(&game, "bob").await;
        let packets = drain(&mut bob_rx);
        assert_eq!(packets[0], Outbound::state_changed(GameState::Play));
        assert!(matches!(&packets[1], Outbound::QuestionShown(s) if s.question_index == 0));
        assert!(matches!(&packets[2], Outbound::PlayerJoined(j) if j.player.name == "bob"));
        assert!(game.submit_answer(bob_conn.id(), 0, 0).await);
    }

    #[tokio::test]
    async fn test_clock_counts_down_until_ended() {
        let (host, mut host_rx) = Connection::open(None);
        let game = Arc::new(Match::new(
            quiz(1),
            "654321".to_string(),
            host,
            settings(Duration::from_millis(10)),
        ));
        game.start().await;

        tokio::time::sleep(Duration::from_millis(200)).await;
        let remaining = game.time_remaining().await;
        assert!(remaining < 30, "clock did not tick: {}", remaining);
        assert!(drain(&mut host_rx)
            .iter()
            .any(|p| matches!(p, Outbound::Tick(_))));

        game.end().await;
        tokio::time::sleep(Duration::from_millis(50)).await;
        let frozen = game.time_remaining().await;
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(game.time_remaining().await, frozen);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_roster_mutations_race_the_clock() {
        const ROUNDS: usize = 20;
        const PLAYERS_PER_ROUND: usize = 100;

        let (host, _host_rx) = Connection::open(None);
        let settings = MatchSettings {
            max_players: ROUNDS * PLAYERS_PER_ROUND,
            clock_period: Duration::from_secs(3600),
        };
        let game = Arc::new(Match::new(quiz(ROUNDS), "777777".to_string(), host, settings));
        assert!(game.start().await);

        let mut expected = std::collections::HashSet::new();
        let mut accepted_answers = 0usize;

        for round in 0..ROUNDS {
            let mut tasks = Vec::new();
            for i in 0..PLAYERS_PER_ROUND {
                let game = Arc::clone(&game);
                tasks.push(tokio::spawn(async move {
                    let name = format!("p{}-{}", round, i);
                    let (conn, _rx) = Connection::open(None);
                    game.join(&name, conn.clone()).await.expect("join failed");
                    let answered = game.submit_answer(conn.id(), round, i % 3).await;
                    tokio::task::yield_now().await;
                    let left = i % 3 == 0 && game.leave(conn.id()).await.is_some();
                    (name, answered, left)
                }));
            }

            let ticker = {
                let game = Arc::clone(&game);
                tokio::spawn(async move {
                    for _ in 0..40 {
                        assert!(game.tick().await);
                        tokio::task::yield_now().await;
                    }
                })
            };

            for task in tasks {
                let (name, answered, left) = task.await.unwrap();
                if answered {
                    accepted_answers += 1;
                }
                if !left {
                    expected.insert(name);
                }
            }
            ticker.await.unwrap();

            while game.state().await == GameState::Play {
                assert!(game.tick().await);
            }
            assert_eq!(game.state().await, GameState::Reveal);
            assert!(game.advance().await);
            if round + 1 < ROUNDS {
                assert!(game.next_question().await);
            }
        }
        assert_eq!(game.state().await, GameState::End);

        let inner = game.inner.read().await;
        let mut ids = std::collections::HashSet::new();
        let mut names = std::collections::HashSet::new();
        for player in inner.roster.iter() {
            assert!(ids.insert(player.id), "duplicate id {}", player.id);
            assert!(names.insert(player.name.clone()), "duplicate name {}", player.name);
        }
        assert_eq!(names, expected);
        assert_eq!(inner.roster.len(), expected.len());

        let total_correct: u32 = inner.correct_counts.values().sum();
        assert!(total_correct as usize <= accepted_answers);
        for count in inner.correct_counts.values() {
            assert!(*count as usize <= ROUNDS);
        }
    }
}
