use clap::Parser;
use log::{error, info};
use server::api::AppState;
use server::config::ServerConfig;
use server::network::Server;
use server::quiz_store::QuizStore;
use server::registry::MatchRegistry;
use std::sync::Arc;

/// Parses the configuration, loads the quizzes and serves until Ctrl+C.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = ServerConfig::parse();

    let quizzes = QuizStore::load(&config.quizzes)?;
    let registry = MatchRegistry::new(Arc::new(quizzes), config.match_settings());
    let state = AppState::new(registry, config.transport());

    let server = Server::bind(&config.address(), state).await?;

    tokio::select! {
        result = server.run() => {
            if let Err(e) = result {
                error!("Server error: {}", e);
                return Err(e.into());
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down");
        }
    }

    Ok(())
}
