//! Server network layer: WebSocket connections and the listening server.
//!
//! Every WebSocket runs in its own task with a single event loop that
//!
//! - drains the connection's outgoing queue onto the socket
//! - hands each received frame to the [`MatchRegistry`](crate::registry::MatchRegistry)
//! - sends a keep-alive ping on a fixed interval
//! - drops the connection when nothing has been received before the read
//!   deadline
//!
//! Whatever ends the loop (close frame, read or write error, deadline, or a
//! `Close` queued by match code), the disconnect is reported to the registry
//! exactly once, after the loop has exited.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{ConnectInfo, State};
use axum::response::Response;
use axum::Router;
use log::{debug, info, warn};
use std::io;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

use crate::api::{create_router, AppState};
use crate::connection::{Connection, Outgoing};

pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Liveness settings for persistent connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportSettings {
    /// Time between keep-alive pings
    pub keepalive_interval: Duration,
    /// Longest silence tolerated from the peer
    pub read_timeout: Duration,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// `GET /ws`
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    ws.on_upgrade(move |socket| handle_connection(socket, addr, state))
}

/// Runs one connection until it closes, then reports the disconnect.
pub async fn handle_connection(mut socket: WebSocket, addr: SocketAddr, state: AppState) {
    let (connection, mut outgoing) = Connection::open(Some(addr));
    let settings = state.transport;
    let registry = state.registry;
    info!("Connection {} opened from {}", connection.id(), addr);

    let mut keepalive = interval(settings.keepalive_interval);
    keepalive.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // Skip the first tick since it fires immediately
    keepalive.tick().await;

    let deadline = sleep(settings.read_timeout);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            item = outgoing.recv() => match item {
                Some(Outgoing::Frame(bytes)) => {
                    if let Err(e) = socket.send(Message::Binary(bytes)).await {
                        warn!("Connection {}: write failed: {}", connection.id(), e);
                        break;
                    }
                }
                Some(Outgoing::Close) | None => {
                    if let Err(e) = socket.send(Message::Close(None)).await {
                        debug!("Connection {}: close frame not sent: {}", connection.id(), e);
                    }
                    break;
                }
            },

            message = socket.recv() => {
                match message {
                    Some(Ok(Message::Binary(bytes))) => {
                        deadline.as_mut().reset(Instant::now() + settings.read_timeout);
                        registry.dispatch(&connection, &bytes).await;
                    }
                    Some(Ok(Message::Text(text))) => {
                        deadline.as_mut().reset(Instant::now() + settings.read_timeout);
                        registry.dispatch(&connection, text.as_bytes()).await;
                    }
                    Some(Ok(Message::Ping(_))) | Some(Ok(Message::Pong(_))) => {
                        deadline.as_mut().reset(Instant::now() + settings.read_timeout);
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("Connection {}: read failed: {}", connection.id(), e);
                        break;
                    }
                }
            }

            _ = keepalive.tick() => {
                if let Err(e) = socket.send(Message::Ping(Vec::new())).await {
                    warn!("Connection {}: ping failed: {}", connection.id(), e);
                    break;
                }
            }

            _ = &mut deadline => {
                warn!("Connection {} timed out", connection.id());
                break;
            }
        }
    }

    registry.on_disconnect(&connection).await;
    info!("Connection {} closed", connection.id());
}

/// HTTP + WebSocket server bound to a listening socket.
pub struct Server {
    listener: TcpListener,
    router: Router,
}

impl Server {
    pub async fn bind(address: &str, state: AppState) -> io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        info!("Server listening on {}", listener.local_addr()?);
        Ok(Self {
            listener,
            router: create_router(state),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Serves until the listener fails.
    pub async fn run(self) -> io::Result<()> {
        axum::serve(
            self.listener,
            self.router
                .into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transport_settings() {
        let settings = TransportSettings::default();
        assert_eq!(settings.keepalive_interval, Duration::from_secs(10));
        assert_eq!(settings.read_timeout, Duration::from_secs(30));
        assert!(settings.keepalive_interval < settings.read_timeout);
    }

    #[tokio::test]
    async fn test_bind_ephemeral_port() {
        use crate::game::MatchSettings;
        use crate::quiz_store::QuizStore;
        use crate::registry::MatchRegistry;

        let registry = MatchRegistry::new(
            std::sync::Arc::new(QuizStore::new()),
            MatchSettings::default(),
        );
        let state = AppState::new(registry, TransportSettings::default());
        let server = Server::bind("127.0.0.1:0", state).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }
}
