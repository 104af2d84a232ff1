//! Session service: orchestrates the relay protocol.
//!
//! [`SessionService`] owns the session store and the connection registry
//! and implements the join handshake, edit relay, presence updates, and
//! idle eviction on top of them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;

use crate::domain::{ConnectionId, Language, SessionDoc, SessionId, SessionStore};
use crate::error::RelayError;
use crate::ws::messages::WireMessage;
use crate::ws::registry::{ConnectionRegistry, PeerSender};

/// Orchestration layer for all session operations.
///
/// Stateless coordinator: owns references to [`SessionStore`] for document
/// state and [`ConnectionRegistry`] for fan-out. Every edit method follows
/// the pattern: acquire the session's write lock, mutate the document, then
/// enqueue the rebroadcast while still holding the lock. Holding the lock
/// across the enqueue is what guarantees that broadcasts for one session
/// leave in the same order the writes were applied; the enqueue is a plain
/// channel push, so no network I/O happens under the lock.
#[derive(Debug, Clone)]
pub struct SessionService {
    store: Arc<SessionStore>,
    registry: Arc<ConnectionRegistry>,
}

/// Point-in-time view of a session returned by the REST layer.
#[derive(Debug, Clone)]
pub struct SessionSnapshot {
    /// Session identifier.
    pub id: SessionId,
    /// Document text at the time of the snapshot.
    pub code: String,
    /// Selected language at the time of the snapshot.
    pub language: Language,
    /// When the session was created.
    pub created_at: chrono::DateTime<chrono::Utc>,
    /// Live connection count at the time of the snapshot.
    pub participants: usize,
}

impl SessionService {
    /// Creates a new `SessionService`.
    #[must_use]
    pub fn new(store: Arc<SessionStore>, registry: Arc<ConnectionRegistry>) -> Self {
        Self { store, registry }
    }

    /// Returns a reference to the inner [`SessionStore`].
    #[must_use]
    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    /// Returns a reference to the inner [`ConnectionRegistry`].
    #[must_use]
    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    /// Creates a new session and returns its snapshot.
    pub async fn create_session(&self) -> SessionSnapshot {
        let id = self.store.create().await;
        tracing::info!(session_id = %id, "session created");
        // The session was just created; absence would be a bug.
        match self.fetch_session(&id).await {
            Ok(snapshot) => snapshot,
            Err(_) => SessionSnapshot {
                id,
                code: SessionDoc::new().code,
                language: Language::default(),
                created_at: Utc::now(),
                participants: 0,
            },
        }
    }

    /// Returns a snapshot of an existing session with its live participant
    /// count.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::SessionNotFound`] if no session with the given
    /// id exists.
    pub async fn fetch_session(&self, id: &SessionId) -> Result<SessionSnapshot, RelayError> {
        let doc_lock = self.store.get(id).await?;
        let doc = doc_lock.read().await;
        Ok(SessionSnapshot {
            id: id.clone(),
            code: doc.code.clone(),
            language: doc.language,
            created_at: doc.created_at,
            participants: self.registry.count(id).await,
        })
    }

    /// Runs the join handshake for a freshly upgraded connection.
    ///
    /// Lazily creates the session, registers the connection, sends the
    /// newcomer a single `init` snapshot so a late joiner never sees a
    /// blank document, then broadcasts the updated participant count to
    /// every member including the newcomer. Returns the count.
    pub async fn join(
        &self,
        session_id: &SessionId,
        connection_id: ConnectionId,
        sender: PeerSender,
    ) -> usize {
        let doc_lock = self.store.get_or_create(session_id).await;

        let count = {
            let doc = doc_lock.read().await;
            let count = self
                .registry
                .join(session_id, connection_id, sender.clone())
                .await;
            // Queued before the participants broadcast below, so the
            // newcomer always sees init first.
            let _ = sender.send(WireMessage::Init {
                code: doc.code.clone(),
                language: doc.language,
            });
            count
        };

        self.registry
            .broadcast(session_id, &WireMessage::Participants { count }, None)
            .await;

        tracing::info!(%session_id, %connection_id, participants = count, "connection joined");
        count
    }

    /// Applies a `code_change` from one connection and rebroadcasts it to
    /// the other members.
    ///
    /// Last write observed by the store wins; concurrent conflicting edits
    /// are overwritten, not merged. No acknowledgement is sent back to the
    /// sender.
    pub async fn apply_code_change(
        &self,
        session_id: &SessionId,
        sender: ConnectionId,
        code: String,
    ) {
        let doc_lock = self.store.get_or_create(session_id).await;
        let mut doc = doc_lock.write().await;
        doc.set_code(code.clone());
        self.registry
            .broadcast(
                session_id,
                &WireMessage::CodeChange { code },
                Some(sender),
            )
            .await;
    }

    /// Applies a `language_change` from one connection and rebroadcasts it
    /// to the other members.
    pub async fn apply_language_change(
        &self,
        session_id: &SessionId,
        sender: ConnectionId,
        language: Language,
    ) {
        let doc_lock = self.store.get_or_create(session_id).await;
        let mut doc = doc_lock.write().await;
        doc.set_language(language);
        self.registry
            .broadcast(
                session_id,
                &WireMessage::LanguageChange { language },
                Some(sender),
            )
            .await;
    }

    /// Relays a `cursor_position` to the other members without touching the
    /// document.
    pub async fn relay_cursor(
        &self,
        session_id: &SessionId,
        sender: ConnectionId,
        message: WireMessage,
    ) {
        self.registry
            .broadcast(session_id, &message, Some(sender))
            .await;
    }

    /// Handles a connection leaving: deregisters it and pushes the updated
    /// participant count to the remaining members.
    pub async fn leave(&self, session_id: &SessionId, connection_id: ConnectionId) {
        let remaining = self.registry.leave(session_id, connection_id).await;
        if remaining > 0 {
            self.registry
                .broadcast(
                    session_id,
                    &WireMessage::Participants { count: remaining },
                    None,
                )
                .await;
        }
        tracing::info!(%session_id, %connection_id, participants = remaining, "connection left");
    }

    /// Removes sessions with no live connections whose last mutation is
    /// older than `ttl`. Returns the number of sessions removed.
    pub async fn evict_idle(&self, ttl: Duration) -> usize {
        let Ok(ttl) = chrono::Duration::from_std(ttl) else {
            return 0;
        };
        let cutoff = Utc::now() - ttl;
        let mut removed = 0;

        for id in self.store.ids().await {
            if self.registry.count(&id).await > 0 {
                continue;
            }
            let Ok(doc_lock) = self.store.get(&id).await else {
                continue;
            };
            let idle = doc_lock.read().await.last_modified_at < cutoff;
            if idle && self.store.remove(&id).await {
                tracing::info!(session_id = %id, "idle session evicted");
                removed += 1;
            }
        }
        removed
    }
}
