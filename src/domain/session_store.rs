//! Concurrent session storage with per-session fine-grained locking.
//!
//! [`SessionStore`] keeps all live session documents in a `HashMap` where
//! each entry is individually protected by a [`tokio::sync::RwLock`]. This
//! allows concurrent reads on the same session and concurrent writes on
//! different sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;

use super::SessionId;
use super::session::SessionDoc;
use crate::error::RelayError;

/// Central store for all session documents.
///
/// Uses a `RwLock<HashMap<...>>` for the outer map and per-entry
/// `Arc<RwLock<SessionDoc>>` for fine-grained per-session locking.
///
/// # Concurrency
///
/// - Multiple tasks may read the same session concurrently.
/// - Writes to different sessions are concurrent.
/// - Writes to the same session are serialized on the entry lock.
///
/// Sessions are never removed when their last connection leaves — the
/// document stays available for any later joiner. The only removal path is
/// the optional idle sweeper (see [`SessionStore::remove`]).
#[derive(Debug)]
pub struct SessionStore {
    sessions: RwLock<HashMap<SessionId, Arc<RwLock<SessionDoc>>>>,
}

impl SessionStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Allocates a new session with default code and language.
    ///
    /// Returns the fresh identifier. Never fails under normal operation;
    /// an id collision (vanishingly unlikely with random 8-hex ids) is
    /// resolved by regenerating.
    pub async fn create(&self) -> SessionId {
        let mut map = self.sessions.write().await;
        let mut id = SessionId::new();
        while map.contains_key(&id) {
            id = SessionId::new();
        }
        map.insert(id.clone(), Arc::new(RwLock::new(SessionDoc::new())));
        id
    }

    /// Returns a shared handle to the session document behind its lock.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SessionNotFound`] if no session with the given
    /// id exists.
    pub async fn get(&self, id: &SessionId) -> Result<Arc<RwLock<SessionDoc>>, RelayError> {
        let map = self.sessions.read().await;
        map.get(id)
            .cloned()
            .ok_or_else(|| RelayError::SessionNotFound(id.clone()))
    }

    /// Returns the session document for `id`, creating it if absent.
    ///
    /// Used by the WebSocket join path: a client presenting an unknown id
    /// gets a fresh default document rather than a rejection.
    pub async fn get_or_create(&self, id: &SessionId) -> Arc<RwLock<SessionDoc>> {
        {
            let map = self.sessions.read().await;
            if let Some(doc) = map.get(id) {
                return Arc::clone(doc);
            }
        }
        let mut map = self.sessions.write().await;
        Arc::clone(
            map.entry(id.clone())
                .or_insert_with(|| Arc::new(RwLock::new(SessionDoc::new()))),
        )
    }

    /// Removes a session, returning `true` if it existed.
    pub async fn remove(&self, id: &SessionId) -> bool {
        self.sessions.write().await.remove(id).is_some()
    }

    /// Returns the ids of all stored sessions.
    pub async fn ids(&self) -> Vec<SessionId> {
        self.sessions.read().await.keys().cloned().collect()
    }

    /// Returns the number of stored sessions.
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// Returns `true` if the store contains no sessions.
    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
