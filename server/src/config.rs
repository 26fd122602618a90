//! Command line / environment configuration for the server binary.

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::game::MatchSettings;
use crate::network::TransportSettings;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about)]
pub struct ServerConfig {
    /// Server IP address to bind to
    #[clap(short = 'H', long, env = "QUIZ_HOST", default_value = "127.0.0.1")]
    pub host: String,
    /// Server port to listen on
    #[clap(short, long, env = "QUIZ_PORT", default_value = "3000")]
    pub port: u16,
    /// JSON file holding the quizzes that can be hosted
    #[clap(short, long, env = "QUIZ_FILE", default_value = "data/quizzes.json")]
    pub quizzes: PathBuf,
    /// Seconds between keep-alive pings
    #[clap(long, env = "QUIZ_KEEPALIVE_SECS", default_value = "10")]
    pub keepalive_secs: u64,
    /// Seconds of silence before a connection is dropped
    #[clap(long, env = "QUIZ_READ_TIMEOUT_SECS", default_value = "30")]
    pub read_timeout_secs: u64,
    /// Maximum players per match
    #[clap(long, env = "QUIZ_MAX_PLAYERS", default_value = "200")]
    pub max_players: usize,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn transport(&self) -> TransportSettings {
        TransportSettings {
            keepalive_interval: Duration::from_secs(self.keepalive_secs.max(1)),
            read_timeout: Duration::from_secs(self.read_timeout_secs.max(1)),
        }
    }

    pub fn match_settings(&self) -> MatchSettings {
        MatchSettings {
            max_players: self.max_players,
            ..MatchSettings::default()
        }
    }
}
