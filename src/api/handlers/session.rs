//! Session lifecycle handlers: create and fetch.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{CreateSessionResponse, SessionDto};
use crate::app_state::AppState;
use crate::domain::SessionId;
use crate::error::{ErrorResponse, RelayError};

/// `POST /sessions` — Create a new collaborative session.
///
/// # Errors
///
/// Never fails under normal operation.
#[utoipa::path(
    post,
    path = "/api/v1/sessions",
    tag = "Sessions",
    summary = "Create a new session",
    description = "Allocates a session with a fresh shareable id, default code, and default language. Clients then join over WebSocket at /ws/{session_id}.",
    responses(
        (status = 201, description = "Session created successfully", body = CreateSessionResponse),
    )
)]
pub async fn create_session(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, RelayError> {
    let snapshot = state.service.create_session().await;
    let response = CreateSessionResponse {
        session_id: snapshot.id.clone(),
        session: SessionDto::from(snapshot),
    };
    Ok((StatusCode::CREATED, Json(response)))
}

/// `GET /sessions/:id` — Get session details with live participant count.
///
/// # Errors
///
/// Returns [`RelayError::SessionNotFound`] if the session does not exist.
#[utoipa::path(
    get,
    path = "/api/v1/sessions/{id}",
    tag = "Sessions",
    summary = "Get session details",
    description = "Returns the session's current code, language, creation time, and live participant count.",
    params(
        ("id" = String, Path, description = "Session id"),
    ),
    responses(
        (status = 200, description = "Session details", body = SessionDto),
        (status = 404, description = "Session not found", body = ErrorResponse),
    )
)]
pub async fn get_session(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, RelayError> {
    let session_id = SessionId::from_string(id);
    let snapshot = state.service.fetch_session(&session_id).await?;
    Ok(Json(SessionDto::from(snapshot)))
}

/// Session lifecycle routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/sessions", post(create_session))
        .route("/sessions/{id}", get(get_session))
}
