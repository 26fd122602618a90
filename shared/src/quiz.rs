//! Read-only quiz model shared by the server and clients.
//!
//! A match takes an owned snapshot of a [`Quiz`] when it is hosted, so later
//! edits made by the quiz provider never reach a running match.

use serde::{Deserialize, Serialize};

/// Time budget applied to questions stored without one.
pub const DEFAULT_QUESTION_TIME: u32 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quiz {
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub questions: Vec<Question>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    /// Seconds players get to answer
    #[serde(default)]
    pub time: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Choice {
    #[serde(default)]
    pub id: u64,
    pub name: String,
    #[serde(default)]
    pub correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Quiz {
    pub fn question(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn is_last_question(&self, index: usize) -> bool {
        index + 1 >= self.questions.len()
    }
}

impl Question {
    /// Positional indices of every choice flagged correct.
    pub fn correct_choices(&self) -> Vec<usize> {
        self.choices
            .iter()
            .enumerate()
            .filter(|(_, choice)| choice.correct)
            .map(|(index, _)| index)
            .collect()
    }

    /// Countdown start value for this question.
    pub fn time_budget(&self) -> u32 {
        if self.time == 0 {
            DEFAULT_QUESTION_TIME
        } else {
            self.time
        }
    }

    pub fn has_choice(&self, index: usize) -> bool {
        index < self.choices.len()
    }
}

impl Choice {
    pub fn new(name: &str, correct: bool) -> Self {
        Self {
            id: 0,
            name: name.to_string(),
            correct,
            image_url: None,
        }
    }
}
