//! Per-session connection registry.
//!
//! [`ConnectionRegistry`] tracks the live connections of every session and
//! fans messages out to them. Each session owns an independently locked
//! room, so join/leave/broadcast on unrelated sessions never contend.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{RwLock, mpsc};

use super::messages::WireMessage;
use crate::domain::{ConnectionId, SessionId};

/// Outbound queue handle for one connection.
///
/// The connection's writer task drains this queue onto the socket, so
/// pushing a broadcast never performs network I/O and a slow peer cannot
/// stall delivery to the others.
pub type PeerSender = mpsc::UnboundedSender<WireMessage>;

type Room = Arc<RwLock<HashMap<ConnectionId, PeerSender>>>;

/// Registry of live connections keyed by session.
///
/// # Concurrency
///
/// The outer map is only locked to look up or create a room; membership
/// changes lock a single room. Broadcast snapshots the room membership and
/// releases the lock before delivering.
#[derive(Debug, Default)]
pub struct ConnectionRegistry {
    rooms: RwLock<HashMap<SessionId, Room>>,
}

impl ConnectionRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connection under a session and returns the updated live
    /// connection count.
    pub async fn join(
        &self,
        session_id: &SessionId,
        connection_id: ConnectionId,
        sender: PeerSender,
    ) -> usize {
        let room = {
            let mut rooms = self.rooms.write().await;
            Arc::clone(rooms.entry(session_id.clone()).or_default())
        };
        let mut members = room.write().await;
        members.insert(connection_id, sender);
        members.len()
    }

    /// Deregisters a connection and returns the remaining live count.
    ///
    /// The last leaver's empty room is removed from the map; the session
    /// document itself is untouched and stays in the session store.
    pub async fn leave(&self, session_id: &SessionId, connection_id: ConnectionId) -> usize {
        let Some(room) = self.room(session_id).await else {
            return 0;
        };
        let remaining = {
            let mut members = room.write().await;
            members.remove(&connection_id);
            members.len()
        };
        if remaining == 0 {
            let mut rooms = self.rooms.write().await;
            // Re-check under the outer lock: a new joiner may have raced in.
            let still_empty = match rooms.get(session_id) {
                Some(room) => room.read().await.is_empty(),
                None => false,
            };
            if still_empty {
                rooms.remove(session_id);
            }
        }
        remaining
    }

    /// Delivers `message` to every live connection in the session except
    /// the optionally excluded one.
    ///
    /// Best-effort: a peer whose queue is closed is skipped and
    /// deregistered; remaining peers still receive the message.
    pub async fn broadcast(
        &self,
        session_id: &SessionId,
        message: &WireMessage,
        exclude: Option<ConnectionId>,
    ) {
        let Some(room) = self.room(session_id).await else {
            return;
        };

        let recipients: Vec<(ConnectionId, PeerSender)> = {
            let members = room.read().await;
            members
                .iter()
                .filter(|(id, _)| Some(**id) != exclude)
                .map(|(id, tx)| (*id, tx.clone()))
                .collect()
        };

        let mut dead = Vec::new();
        for (connection_id, tx) in recipients {
            if tx.send(message.clone()).is_err() {
                dead.push(connection_id);
            }
        }

        if !dead.is_empty() {
            let mut members = room.write().await;
            for connection_id in dead {
                members.remove(&connection_id);
                tracing::debug!(%session_id, %connection_id, "pruned dead connection");
            }
        }
    }

    /// Returns the current live connection count for a session.
    pub async fn count(&self, session_id: &SessionId) -> usize {
        match self.room(session_id).await {
            Some(room) => room.read().await.len(),
            None => 0,
        }
    }

    async fn room(&self, session_id: &SessionId) -> Option<Room> {
        self.rooms.read().await.get(session_id).cloned()
    }
}
