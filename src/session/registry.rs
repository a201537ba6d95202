//! Session registry
//!
//! Maintains the set of live sessions and hands out session ids.
//! The registry is the only state shared between connection tasks; every
//! access goes through the single lock inside it.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use super::Session;

/// Thread-safe map from session id to live session
///
/// Sessions are inserted fully built, so readers never observe a partial entry.
/// Closed sessions are removed; their ids are never issued again.
pub struct SessionRegistry {
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    issued: AtomicU64,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            issued: AtomicU64::new(0),
        }
    }

    /// Create and register a new session for the connection at `peer_addr`
    pub async fn create(&self, peer_addr: SocketAddr) -> Arc<Session> {
        let mut sessions = self.sessions.write().await;

        // v4 collisions are not expected; the loop keeps a live id from ever being handed out twice
        let id = loop {
            let candidate = Uuid::new_v4().to_string();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };

        let session = Arc::new(Session::new(id.clone(), peer_addr));
        sessions.insert(id, Arc::clone(&session));
        self.issued.fetch_add(1, Ordering::Relaxed);

        debug!("Registered session {} for {}", session.id(), peer_addr);
        session
    }

    /// Check if a live session with this id exists
    pub async fn exists(&self, id: &str) -> bool {
        self.sessions.read().await.contains_key(id)
    }

    /// Look up a live session by id
    pub async fn get(&self, id: &str) -> Option<Arc<Session>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// Mark a session closed and remove it from the registry
    ///
    /// Returns the removed session, or `None` if the id was not live.
    pub async fn close(&self, id: &str) -> Option<Arc<Session>> {
        let session = self.sessions.write().await.remove(id)?;
        session.close().await;
        debug!("Session {} removed from registry", id);
        Some(session)
    }

    /// Close every live session. Used during server shutdown.
    pub async fn close_all(&self) -> usize {
        let drained: Vec<Arc<Session>> = {
            let mut sessions = self.sessions.write().await;
            sessions.drain().map(|(_, session)| session).collect()
        };

        for session in &drained {
            session.close().await;
        }

        if !drained.is_empty() {
            info!("Closed {} remaining sessions", drained.len());
        }
        drained.len()
    }

    /// Get the number of live sessions
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Get the number of session ids issued since startup
    pub fn issued_count(&self) -> u64 {
        self.issued.load(Ordering::Relaxed)
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use std::collections::HashSet;

    fn peer() -> SocketAddr {
        "127.0.0.1:40000".parse().unwrap()
    }

    #[tokio::test]
    async fn test_registry_new() {
        let registry = SessionRegistry::new();
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.issued_count(), 0);
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let registry = SessionRegistry::new();
        let session = registry.create(peer()).await;

        assert!(registry.exists(session.id()).await);
        let found = registry.get(session.id()).await.unwrap();
        assert!(Arc::ptr_eq(&found, &session));
        assert_eq!(found.peer_addr(), peer());
        assert_eq!(found.state().await, SessionState::Created);
    }

    #[tokio::test]
    async fn test_unknown_session() {
        let registry = SessionRegistry::new();
        assert!(!registry.exists("missing").await);
        assert!(registry.get("missing").await.is_none());
        assert!(registry.close("missing").await.is_none());
    }

    #[tokio::test]
    async fn test_close_removes_and_marks_closed() {
        let registry = SessionRegistry::new();
        let session = registry.create(peer()).await;
        let id = session.id().to_string();

        let closed = registry.close(&id).await.unwrap();
        assert_eq!(closed.state().await, SessionState::Closed);
        assert!(!registry.exists(&id).await);
        assert!(registry.get(&id).await.is_none());
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(registry.issued_count(), 1);
    }

    #[tokio::test]
    async fn test_ids_are_unique() {
        let registry = SessionRegistry::new();
        let mut ids = HashSet::new();
        for _ in 0..100 {
            let session = registry.create(peer()).await;
            // Closing immediately makes sure removed ids are not handed out again
            registry.close(session.id()).await;
            assert!(ids.insert(session.id().to_string()));
        }
        assert_eq!(registry.issued_count(), 100);
    }

    #[tokio::test]
    async fn test_concurrent_create() {
        let registry = Arc::new(SessionRegistry::new());
        let mut handles = Vec::new();
        for _ in 0..32 {
            let registry = Arc::clone(&registry);
            handles.push(tokio::spawn(async move {
                registry.create(peer()).await.id().to_string()
            }));
        }

        let mut ids = HashSet::new();
        for handle in handles {
            let id = handle.await.unwrap();
            assert!(registry.exists(&id).await);
            ids.insert(id);
        }
        assert_eq!(ids.len(), 32);
        assert_eq!(registry.session_count().await, 32);
    }

    #[tokio::test]
    async fn test_close_all() {
        let registry = SessionRegistry::new();
        let a = registry.create(peer()).await;
        let b = registry.create(peer()).await;

        assert_eq!(registry.close_all().await, 2);
        assert_eq!(registry.session_count().await, 0);
        assert_eq!(a.state().await, SessionState::Closed);
        assert_eq!(b.state().await, SessionState::Closed);
    }
}
