//! Wire protocol: `type`-tagged JSON messages exchanged over a session
//! WebSocket.

use serde::{Deserialize, Serialize};

use crate::domain::Language;

/// A message on the session wire, discriminated by its `type` field.
///
/// The same enum covers both directions. `init` and `participants` are only
/// ever produced by the server; a client sending them is ignored. Frames
/// that fail to deserialize (unknown `type`, missing or mistyped payload
/// fields) are dropped by the receiving side without closing the
/// connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WireMessage {
    /// Full document snapshot sent to a connection on join.
    Init {
        /// Current document text.
        code: String,
        /// Currently selected language.
        language: Language,
    },
    /// The document text was replaced.
    CodeChange {
        /// New full document text.
        code: String,
    },
    /// The selected language was changed.
    LanguageChange {
        /// New language.
        language: Language,
    },
    /// Presence update carrying the live connection count.
    Participants {
        /// Number of live connections in the session.
        count: usize,
    },
    /// Another participant's cursor moved. Relayed verbatim, never stored.
    CursorPosition {
        /// Opaque identifier of the moving participant.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        /// Editor-defined position payload, passed through untouched.
        position: serde_json::Value,
    },
}

impl WireMessage {
    /// Returns the discriminant of this message.
    #[must_use]
    pub const fn kind(&self) -> MessageKind {
        match self {
            Self::Init { .. } => MessageKind::Init,
            Self::CodeChange { .. } => MessageKind::CodeChange,
            Self::LanguageChange { .. } => MessageKind::LanguageChange,
            Self::Participants { .. } => MessageKind::Participants,
            Self::CursorPosition { .. } => MessageKind::CursorPosition,
        }
    }
}

/// Payload-free discriminant of [`WireMessage`], used to key client-side
/// handler registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    /// `init` snapshot.
    Init,
    /// `code_change` edit.
    CodeChange,
    /// `language_change` edit.
    LanguageChange,
    /// `participants` presence update.
    Participants,
    /// `cursor_position` relay.
    CursorPosition,
}
