//! Handles to live connections.
//!
//! Match code never touches a socket. It holds a [`Connection`], a cheap
//! clonable handle that queues encoded frames for the task owning the socket
//! (see [`crate::network`]). Queuing never blocks; a send to a connection whose
//! task has already exited simply fails and is reported as `false`.

use log::{debug, warn};
use shared::{encode_outbound, Outbound};
use std::fmt;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;

pub type ConnectionId = u64;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Work queued for the task that owns the socket.
#[derive(Debug, Clone, PartialEq)]
pub enum Outgoing {
    Frame(Vec<u8>),
    Close,
}

#[derive(Clone)]
pub struct Connection {
    id: ConnectionId,
    addr: Option<SocketAddr>,
    sender: mpsc::UnboundedSender<Outgoing>,
}

impl Connection {
    /// Creates a handle with a fresh id and the receiving end of its queue.
    pub fn open(addr: Option<SocketAddr>) -> (Self, mpsc::UnboundedReceiver<Outgoing>) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let id = NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed);
        (Self { id, addr, sender }, receiver)
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub fn addr(&self) -> Option<SocketAddr> {
        self.addr
    }

    /// Encodes and queues a packet. Returns false if it could not be queued.
    pub fn send(&self, packet: &Outbound) -> bool {
        match encode_outbound(packet) {
            Ok(bytes) => self.send_bytes(bytes),
            Err(e) => {
                warn!("Failed to encode {:?} for connection {}: {}", packet.kind(), self.id, e);
                false
            }
        }
    }

    pub fn send_bytes(&self, bytes: Vec<u8>) -> bool {
        if self.sender.send(Outgoing::Frame(bytes)).is_err() {
            debug!("Connection {} is gone, dropping frame", self.id);
            return false;
        }
        true
    }

    /// Asks the owning task to send a close frame and hang up.
    pub fn close(&self) {
        let _ = self.sender.send(Outgoing::Close);
    }
}

impl PartialEq for Connection {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Connection {}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("addr", &self.addr)
            .finish()
    }
}

/// Decodes every frame currently queued on `receiver`.
///
/// Test helper for observing what a connection was sent.
#[cfg(test)]
pub(crate) fn drain(receiver: &mut mpsc::UnboundedReceiver<Outgoing>) -> Vec<Outbound> {
    let mut packets = Vec::new();
    while let Ok(item) = receiver.try_recv() {
        if let Outgoing::Frame(bytes) = item {
            packets.push(shared::decode_outbound(&bytes).expect("server sent undecodable frame"));
        }
    }
    packets
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::packets::Tick;

    #[test]
    fn test_ids_are_unique() {
        let (a, _ra) = Connection::open(None);
        let (b, _rb) = Connection::open(None);
        assert_ne!(a.id(), b.id());
        assert_ne!(a, b);
        assert_eq!(a.clone(), a);
    }

    #[test]
    fn test_send_queues_encoded_frame() {
        let (conn, mut rx) = Connection::open(None);
        assert!(conn.send(&Outbound::Tick(Tick { tick: 3 })));

        match rx.try_recv() {
            Ok(Outgoing::Frame(bytes)) => assert_eq!(bytes, b"\x06{\"tick\":3}".to_vec()),
            other => panic!("Unexpected queue item {:?}", other),
        }
    }

    #[test]
    fn test_send_after_receiver_dropped_fails() {
        let (conn, rx) = Connection::open(None);
        drop(rx);
        assert!(!conn.send(&Outbound::Tick(Tick { tick: 1 })));
    }

    #[test]
    fn test_close_is_queued_after_frames() {
        let (conn, mut rx) = Connection::open(None);
        conn.send(&Outbound::Tick(Tick { tick: 1 }));
        conn.close();

        assert!(matches!(rx.try_recv(), Ok(Outgoing::Frame(_))));
        assert_eq!(rx.try_recv().ok(), Some(Outgoing::Close));
    }
}
