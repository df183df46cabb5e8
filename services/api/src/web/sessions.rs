//! services/api/src/web/sessions.rs
//!
//! Saving and browsing write-once snapshots of a phase's conversation.

use crate::error::ApiError;
use crate::web::chat::parse_phase;
use crate::web::protocol::{
    FailureResponse, SaveSessionRequest, SaveSessionResponse, SessionDetail,
    SessionListResponse, SessionSummary,
};
use crate::web::rest::parse_body;
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    response::{IntoResponse, Json, Response},
};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;
use writing_coach_core::threads::SessionEntryInput;

/// Save the current phase's conversation as a named session.
///
/// Failures are reported as `{success: false, error}` with the matching status code.
#[utoipa::path(
    post,
    path = "/chat/save",
    request_body = SaveSessionRequest,
    responses(
        (status = 200, description = "Session saved", body = SaveSessionResponse),
        (status = 400, description = "Invalid messages, title or phase", body = FailureResponse),
        (status = 404, description = "Event not found", body = FailureResponse)
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn save_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<SaveSessionRequest>, JsonRejection>,
) -> Response {
    match save_session(&app_state, user_id, payload).await {
        Ok(saved) => Json(saved).into_response(),
        Err(err) => {
            let (status, message) = err.status_and_message();
            warn!("Could not save session for user {}: {}", user_id, err);
            (
                status,
                Json(FailureResponse {
                    success: false,
                    error: message,
                }),
            )
                .into_response()
        }
    }
}

async fn save_session(
    app_state: &AppState,
    user_id: Uuid,
    payload: Result<Json<SaveSessionRequest>, JsonRejection>,
) -> Result<SaveSessionResponse, ApiError> {
    let request = parse_body(payload)?;
    let phase = parse_phase(&request.phase)?;
    let event = app_state.coach.owned_event(user_id, request.event_id).await?;
    let entries = request
        .messages
        .into_iter()
        .map(SessionEntryInput::from)
        .collect();

    let session = app_state
        .coach
        .threads()
        .save_session(&event, phase, entries, request.title)
        .await?;

    Ok(SaveSessionResponse {
        success: true,
        session_id: session.id,
        title: session.title,
    })
}

/// List the saved sessions for an event's phase, newest first.
#[utoipa::path(
    get,
    path = "/api/sessions/{event_id}/{phase}",
    responses(
        (status = 200, description = "Saved sessions", body = SessionListResponse),
        (status = 400, description = "Unknown phase"),
        (status = 404, description = "Event not found")
    ),
    params(
        ("event_id" = Uuid, Path, description = "The event."),
        ("phase" = String, Path, description = "One of facts, feelings, associations, growth."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn list_sessions_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((event_id, phase)): Path<(Uuid, String)>,
) -> Result<Json<SessionListResponse>, ApiError> {
    let phase = parse_phase(&phase)?;
    let event = app_state.coach.owned_event(user_id, event_id).await?;
    let sessions = app_state.db.list_sessions(event.id, phase).await?;

    Ok(Json(SessionListResponse {
        success: true,
        sessions: sessions.iter().map(SessionSummary::from).collect(),
    }))
}

/// Fetch one saved session with all of its messages.
#[utoipa::path(
    get,
    path = "/session/{session_id}",
    responses(
        (status = 200, description = "The saved session", body = SessionDetail),
        (status = 404, description = "Session not found")
    ),
    params(
        ("session_id" = Uuid, Path, description = "The saved session."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn session_detail_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionDetail>, ApiError> {
    let session = app_state.db.get_session(session_id).await?;
    // Sessions belong to whoever owns the event.
    app_state.coach.owned_event(user_id, session.event_id).await?;
    Ok(Json(SessionDetail::from(&session)))
}
