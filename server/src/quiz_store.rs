//! Quiz lookup.
//!
//! Matches only ever need to fetch a quiz by id, once, when a host asks to
//! host it. [`QuizProvider`] is that seam; [`QuizStore`] is the in-memory
//! implementation used by the server binary, loaded from a JSON file holding
//! an array of quizzes.

use log::{info, warn};
use shared::Quiz;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Source of quizzes that can be hosted.
pub trait QuizProvider: Send + Sync {
    fn get_quiz_by_id(&self, id: u64) -> Option<Quiz>;
}

#[derive(Debug, Error)]
pub enum QuizStoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Default, Clone)]
pub struct QuizStore {
    quizzes: HashMap<u64, Quiz>,
}

impl QuizStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_quizzes(quizzes: impl IntoIterator<Item = Quiz>) -> Self {
        let mut store = Self::new();
        for quiz in quizzes {
            store.insert(quiz);
        }
        store
    }

    /// Adds or replaces a quiz.
    pub fn insert(&mut self, quiz: Quiz) {
        self.quizzes.insert(quiz.id, quiz);
    }

    pub fn len(&self) -> usize {
        self.quizzes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.quizzes.is_empty()
    }

    /// Loads quizzes from a JSON array on disk.
    ///
    /// A missing file yields an empty store so the server can still run;
    /// an unreadable or malformed file is an error.
    pub fn load(path: &Path) -> Result<Self, QuizStoreError> {
        let contents = match fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                warn!("Quiz file {} not found, starting with no quizzes", path.display());
                return Ok(Self::new());
            }
            Err(source) => {
                return Err(QuizStoreError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let quizzes: Vec<Quiz> =
            serde_json::from_str(&contents).map_err(|source| QuizStoreError::Parse {
                path: path.to_path_buf(),
                source,
            })?;

        let store = Self::from_quizzes(quizzes);
        info!("Loaded {} quizzes from {}", store.len(), path.display());
        Ok(store)
    }
}

impl QuizProvider for QuizStore {
    fn get_quiz_by_id(&self, id: u64) -> Option<Quiz> {
        self.quizzes.get(&id).cloned()
    }
}
