//! Axum WebSocket upgrade handler.

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Path, State};
use axum::response::IntoResponse;

use super::connection::run_connection;
use crate::app_state::AppState;
use crate::domain::SessionId;

/// `GET /ws/{session_id}` — Upgrade HTTP connection to WebSocket and join
/// the session.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    Path(session_id): Path<String>,
    State(state): State<AppState>,
) -> impl IntoResponse {
    let session_id = SessionId::from_string(session_id);
    let service = std::sync::Arc::clone(&state.service);

    ws.on_upgrade(move |socket| run_connection(socket, session_id, service))
}
