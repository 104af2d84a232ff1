//! Type-safe session identifier.
//!
//! [`SessionId`] is a short opaque string identifier used as the routing
//! key for a collaborative session and in shareable URLs.

use std::fmt;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Unique identifier for a collaborative session.
///
/// Eight lowercase hex characters taken from a freshly generated UUID v4.
/// Short enough to paste into a URL by hand, random enough that collisions
/// are not a practical concern at this scale. Generated once at session
/// creation time and immutable thereafter. Used as the dictionary key in
/// [`super::SessionStore`] and the connection registry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = String)]
pub struct SessionId(String);

impl SessionId {
    /// Generates a new random `SessionId`.
    #[must_use]
    pub fn new() -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self(uuid.chars().take(8).collect())
    }

    /// Wraps an existing identifier string without validation.
    ///
    /// Callers arriving over the wire may present ids that no session was
    /// ever created with; the store surfaces those as not-found.
    #[must_use]
    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    /// Returns the identifier as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}
