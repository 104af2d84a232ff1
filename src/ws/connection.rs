//! WebSocket connection state machine.
//!
//! Handles the read/write loop for a single WebSocket connection: join
//! handshake on entry, per-message dispatch while joined, deregistration
//! and presence update on close.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;

use super::messages::WireMessage;
use crate::domain::{ConnectionId, SessionId};
use crate::service::SessionService;

/// Runs the message pump for a single WebSocket connection.
///
/// A writer task drains this connection's outbound queue onto the socket;
/// the read loop dispatches inbound frames to the [`SessionService`].
/// Malformed or unrecognized frames are dropped without closing the
/// connection. Any transport close or error ends the loop, after which the
/// connection leaves its session and the remaining members get a presence
/// update.
pub async fn run_connection(socket: WebSocket, session_id: SessionId, service: Arc<SessionService>) {
    let connection_id = ConnectionId::new();
    let (mut ws_tx, mut ws_rx) = socket.split();
    let (peer_tx, mut peer_rx) = mpsc::unbounded_channel::<WireMessage>();

    let mut writer = tokio::spawn(async move {
        while let Some(message) = peer_rx.recv().await {
            let Ok(json) = serde_json::to_string(&message) else {
                continue;
            };
            if ws_tx.send(Message::text(json)).await.is_err() {
                break;
            }
        }
    });

    service.join(&session_id, connection_id, peer_tx).await;

    loop {
        tokio::select! {
            msg = ws_rx.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        handle_text_message(&text, &session_id, connection_id, &service).await;
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(%session_id, %connection_id, error = %e, "ws transport error");
                        break;
                    }
                    _ => {}
                }
            }
            // Writer gone means the socket is dead; stop reading too.
            _ = &mut writer => break,
        }
    }

    service.leave(&session_id, connection_id).await;
    writer.abort();
    tracing::debug!(%session_id, %connection_id, "ws connection closed");
}

/// Dispatches one inbound text frame.
///
/// Lenient by design: anything that fails to parse, and any server-only
/// message type echoed back by a client, is ignored.
async fn handle_text_message(
    text: &str,
    session_id: &SessionId,
    connection_id: ConnectionId,
    service: &SessionService,
) {
    let message = match serde_json::from_str::<WireMessage>(text) {
        Ok(message) => message,
        Err(e) => {
            tracing::debug!(%session_id, %connection_id, error = %e, "dropping malformed frame");
            return;
        }
    };

    match message {
        WireMessage::CodeChange { code } => {
            service.apply_code_change(session_id, connection_id, code).await;
        }
        WireMessage::LanguageChange { language } => {
            service
                .apply_language_change(session_id, connection_id, language)
                .await;
        }
        cursor @ WireMessage::CursorPosition { .. } => {
            service.relay_cursor(session_id, connection_id, cursor).await;
        }
        // Server-to-client only; ignore if a client sends them.
        WireMessage::Init { .. } | WireMessage::Participants { .. } => {}
    }
}
