//! Domain layer: session identity, the shared document model, and the
//! session store.
//!
//! This module contains the server-side domain model: session and
//! connection identifiers, the supported language set, the mutable session
//! document, and the concurrent session store.

pub mod connection_id;
pub mod language;
pub mod session;
pub mod session_id;
pub mod session_store;

pub use connection_id::ConnectionId;
pub use language::Language;
pub use session::SessionDoc;
pub use session_id::SessionId;
pub use session_store::SessionStore;
