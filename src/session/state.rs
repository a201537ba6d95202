//! Individual stream session
//!
//! Holds the identity and lifecycle state of one client's media stream.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Session lifecycle states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Session id announced, no chunk accepted yet
    Created,
    /// At least one chunk has been forwarded to the sink
    Streaming,
    /// Connection is gone; terminal state
    Closed,
}

/// Snapshot of a session's traffic counters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    pub chunks: u64,
    pub bytes: u64,
}

/// A single client stream, shared between its connection task and the registry
pub struct Session {
    /// Unique identifier, never reused within the process
    id: String,
    /// Remote address of the owning connection
    peer_addr: SocketAddr,
    created_at: Instant,
    state: RwLock<SessionState>,
    chunks: AtomicU64,
    bytes: AtomicU64,
}

impl Session {
    /// Create a new session in the `Created` state
    pub(crate) fn new(id: String, peer_addr: SocketAddr) -> Self {
        Self {
            id,
            peer_addr,
            created_at: Instant::now(),
            state: RwLock::new(SessionState::Created),
            chunks: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
        }
    }

    /// Get the session ID
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the peer address of the owning connection
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    /// Time since the session was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Get the current state
    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Record an accepted chunk, moving `Created` to `Streaming`
    ///
    /// Returns the state the chunk was accepted in, or `None` if the session
    /// is already closed and the chunk must not be forwarded.
    pub async fn accept_chunk(&self, len: usize) -> Option<SessionState> {
        let mut state = self.state.write().await;
        match *state {
            SessionState::Closed => return None,
            SessionState::Created => *state = SessionState::Streaming,
            SessionState::Streaming => {}
        }
        self.chunks.fetch_add(1, Ordering::Relaxed);
        self.bytes.fetch_add(len as u64, Ordering::Relaxed);
        Some(*state)
    }

    /// Move the session to `Closed`. Returns false if it was already closed.
    pub async fn close(&self) -> bool {
        let mut state = self.state.write().await;
        if *state == SessionState::Closed {
            return false;
        }
        *state = SessionState::Closed;
        true
    }

    /// Get the traffic counters
    pub fn stats(&self) -> SessionStats {
        SessionStats {
            chunks: self.chunks.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("peer_addr", &self.peer_addr)
            .field("stats", &self.stats())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_session() -> Session {
        Session::new("s-1".to_string(), "127.0.0.1:5000".parse().unwrap())
    }

    #[tokio::test]
    async fn test_new_session_is_created() {
        let session = test_session();
        assert_eq!(session.id(), "s-1");
        assert_eq!(session.state().await, SessionState::Created);
        assert_eq!(session.stats(), SessionStats { chunks: 0, bytes: 0 });
    }

    #[tokio::test]
    async fn test_first_chunk_starts_streaming() {
        let session = test_session();

        assert_eq!(session.accept_chunk(5).await, Some(SessionState::Streaming));
        assert_eq!(session.accept_chunk(3).await, Some(SessionState::Streaming));
        assert_eq!(session.state().await, SessionState::Streaming);
        assert_eq!(session.stats(), SessionStats { chunks: 2, bytes: 8 });
    }

    #[tokio::test]
    async fn test_closed_is_terminal() {
        let session = test_session();
        session.accept_chunk(1).await;

        assert!(session.close().await);
        assert!(!session.close().await);
        assert_eq!(session.accept_chunk(10).await, None);
        assert_eq!(session.state().await, SessionState::Closed);
        // Rejected chunk is not counted
        assert_eq!(session.stats().chunks, 1);
    }

    #[tokio::test]
    async fn test_close_from_created() {
        let session = test_session();
        assert!(session.close().await);
        assert_eq!(session.state().await, SessionState::Closed);
    }
}
