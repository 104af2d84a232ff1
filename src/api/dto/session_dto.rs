//! Session DTOs for REST request/response serialization.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{Language, SessionId};
use crate::service::SessionSnapshot;

/// Session representation returned by the REST endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SessionDto {
    /// Session identifier, usable in shareable URLs.
    pub id: SessionId,
    /// Current full document text.
    pub code: String,
    /// Currently selected language.
    pub language: Language,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Live connection count at response time.
    pub participants: usize,
}

impl From<SessionSnapshot> for SessionDto {
    fn from(snapshot: SessionSnapshot) -> Self {
        Self {
            id: snapshot.id,
            code: snapshot.code,
            language: snapshot.language,
            created_at: snapshot.created_at,
            participants: snapshot.participants,
        }
    }
}

/// Response body for `POST /sessions`.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSessionResponse {
    /// Identifier of the freshly created session.
    pub session_id: SessionId,
    /// Full session record.
    pub session: SessionDto,
}
