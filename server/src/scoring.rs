//! Round scoring and leaderboard ordering.
//!
//! Correct answers earn [`BASE_POINTS`] plus a speed bonus by rank among the
//! correct players (fastest = most time remaining). Streaks pay a bonus on
//! the second consecutive correct answer and a larger one on the third, which
//! also restarts the streak.

use shared::LeaderboardEntry;
use std::collections::HashMap;
use uuid::Uuid;

use crate::roster::Player;

pub const BASE_POINTS: u32 = 100;
/// Speed bonus for the 1st, 2nd and 3rd fastest correct player.
pub const RANKED_SPEED_BONUS: [u32; 3] = [26, 24, 22];
/// Speed bonus for every correct player after the third.
pub const SPEED_BONUS: u32 = 20;
pub const DOUBLE_STREAK_BONUS: u32 = 10;
pub const TRIPLE_STREAK_BONUS: u32 = 20;

/// Per-player result of scoring one question.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundOutcome {
    pub player_id: Uuid,
    pub is_correct: bool,
    pub awarded: u32,
    pub streak_bonus: u32,
    pub max_streak: u32,
    pub total: u32,
}

/// Player position on the leaderboard.
#[derive(Debug, Clone, PartialEq)]
pub struct Standing {
    pub player_id: Uuid,
    pub entry: LeaderboardEntry,
}

pub fn speed_bonus(rank: usize) -> u32 {
    RANKED_SPEED_BONUS.get(rank).copied().unwrap_or(SPEED_BONUS)
}

pub fn is_correct(choice: usize, correct_choices: &[usize]) -> bool {
    correct_choices.contains(&choice)
}

/// Advances a player's streak after a correct answer and returns the bonus.
pub fn apply_streak(player: &mut Player) -> u32 {
    player.correct_streak += 1;
    player.max_correct_streak = player.max_correct_streak.max(player.correct_streak);

    match player.correct_streak {
        2 => DOUBLE_STREAK_BONUS,
        3 => {
            player.correct_streak = 0;
            TRIPLE_STREAK_BONUS
        }
        _ => 0,
    }
}

/// Scores a finished question for every player.
///
/// Updates points, streaks, `last_awarded_points` and the per-player correct
/// answer counters, and returns one outcome per player in roster order.
/// Players who did not answer are scored as incorrect.
pub fn score_round<'a, I>(
    players: I,
    correct_choices: &[usize],
    correct_counts: &mut HashMap<Uuid, u32>,
) -> Vec<RoundOutcome>
where
    I: IntoIterator<Item = &'a mut Player>,
{
    let mut players: Vec<&mut Player> = players.into_iter().collect();

    let mut fastest: Vec<(Uuid, u32)> = players
        .iter()
        .filter(|p| p.answered && is_correct(p.current_answer, correct_choices))
        .map(|p| (p.id, p.answer_time_remaining))
        .collect();
    // Stable: equal times keep roster order.
    fastest.sort_by(|a, b| b.1.cmp(&a.1));

    let bonuses: HashMap<Uuid, u32> = fastest
        .iter()
        .enumerate()
        .map(|(rank, (id, _))| (*id, speed_bonus(rank)))
        .collect();

    players
        .iter_mut()
        .map(|player| {
            let mut awarded = 0;
            let mut streak_bonus = 0;
            let correct = bonuses.get(&player.id);

            if let Some(bonus) = correct {
                streak_bonus = apply_streak(player);
                awarded = BASE_POINTS + bonus + streak_bonus;
                player.points += awarded;
                *correct_counts.entry(player.id).or_insert(0) += 1;
            } else {
                player.correct_streak = 0;
            }
            player.last_awarded_points = awarded;

            RoundOutcome {
                player_id: player.id,
                is_correct: correct.is_some(),
                awarded,
                streak_bonus,
                max_streak: player.max_correct_streak,
                total: player.points,
            }
        })
        .collect()
}

/// Orders players by points, then by correct answers, both descending.
pub fn standings<'a, I>(players: I, correct_counts: &HashMap<Uuid, u32>) -> Vec<Standing>
where
    I: IntoIterator<Item = &'a Player>,
{
    let mut standings: Vec<Standing> = players
        .into_iter()
        .map(|p| Standing {
            player_id: p.id,
            entry: LeaderboardEntry {
                name: p.name.clone(),
                points: p.points,
                correct_count: correct_counts.get(&p.id).copied().unwrap_or(0),
            },
        })
        .collect();

    standings.sort_by(|a, b| {
        b.entry
            .points
            .cmp(&a.entry.points)
            .then(b.entry.correct_count.cmp(&a.entry.correct_count))
    });
    standings
}
