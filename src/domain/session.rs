//! Shared session document.

use chrono::{DateTime, Utc};

use super::Language;

/// Default document contents for a freshly created session.
pub const DEFAULT_CODE: &str = "# Write your code here\n";

/// The mutable shared state of one collaborative session.
///
/// Holds the full document text and the selected language, plus bookkeeping
/// timestamps. There is exactly one `SessionDoc` per session id at any
/// instant; mutation is last-write-wins through the per-entry lock in
/// [`super::SessionStore`]. The document itself notifies no one — the relay
/// layer broadcasts after mutating.
#[derive(Debug, Clone)]
pub struct SessionDoc {
    /// Full text of the shared document.
    pub code: String,
    /// Currently selected language.
    pub language: Language,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the document was last mutated (creation time until then).
    pub last_modified_at: DateTime<Utc>,
}

impl SessionDoc {
    /// Creates a session document with the default code and language.
    #[must_use]
    pub fn new() -> Self {
        let now = Utc::now();
        Self {
            code: DEFAULT_CODE.to_string(),
            language: Language::default(),
            created_at: now,
            last_modified_at: now,
        }
    }

    /// Replaces the document text unconditionally (last write wins).
    pub fn set_code(&mut self, code: String) {
        self.code = code;
        self.last_modified_at = Utc::now();
    }

    /// Replaces the selected language unconditionally.
    pub fn set_language(&mut self, language: Language) {
        self.language = language;
        self.last_modified_at = Utc::now();
    }
}

impl Default for SessionDoc {
    fn default() -> Self {
        Self::new()
    }
}
