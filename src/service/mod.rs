//! Service layer: relay orchestration.
//!
//! [`SessionService`] coordinates the session store and the connection
//! registry to implement the join handshake, edit relay, and presence
//! updates.

pub mod session_service;

pub use session_service::{SessionService, SessionSnapshot};
