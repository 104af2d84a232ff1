//! Shared application state injected into all Axum handlers.

use std::sync::Arc;

use crate::service::SessionService;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Session service for all relay logic.
    pub service: Arc<SessionService>,
}
