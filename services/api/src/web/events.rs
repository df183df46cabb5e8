//! services/api/src/web/events.rs
//!
//! CRUD for the events a user journals about, plus starting a writing session on one.

use crate::error::ApiError;
use crate::web::protocol::{
    DeletedResponse, EventDetail, EventPayload, EventView, StartSessionResponse,
};
use crate::web::rest::parse_body;
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    http::StatusCode,
    response::Json,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use writing_coach_core::{domain::EventDraft, threads::TITLE_LIMIT};

impl EventPayload {
    fn into_draft(self) -> Result<EventDraft, ApiError> {
        let title = self.title.trim().to_string();
        if title.is_empty() {
            return Err(ApiError::BadRequest("title must not be empty".to_string()));
        }
        if title.chars().count() > TITLE_LIMIT {
            return Err(ApiError::BadRequest(format!(
                "title must be at most {TITLE_LIMIT} characters"
            )));
        }
        Ok(EventDraft {
            title,
            description: self.description.unwrap_or_default().trim().to_string(),
            date_occurred: self.date_occurred,
        })
    }
}

/// List the user's events, most recently occurred first.
#[utoipa::path(
    get,
    path = "/events/",
    responses((status = 200, description = "The user's events", body = [EventView])),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn list_events_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
) -> Result<Json<Vec<EventView>>, ApiError> {
    let events = app_state.db.list_events(user_id).await?;
    Ok(Json(events.iter().map(EventView::from).collect()))
}

/// Create an event. New events start in the facts phase.
#[utoipa::path(
    post,
    path = "/events/create/",
    request_body = EventPayload,
    responses(
        (status = 201, description = "Event created", body = EventView),
        (status = 400, description = "Malformed body or invalid title")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn create_event_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> Result<(StatusCode, Json<EventView>), ApiError> {
    let draft = parse_body(payload)?.into_draft()?;
    let event = app_state.db.create_event(user_id, draft).await?;
    info!("User {} created event {}", user_id, event.id);
    Ok((StatusCode::CREATED, Json(EventView::from(&event))))
}

/// An event with its phase progress and conversation threads.
#[utoipa::path(
    get,
    path = "/events/{event_id}/",
    responses(
        (status = 200, description = "Event detail", body = EventDetail),
        (status = 404, description = "Event not found")
    ),
    params(
        ("event_id" = Uuid, Path, description = "The event."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn event_detail_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<EventDetail>, ApiError> {
    let event = app_state.coach.owned_event(user_id, event_id).await?;
    let threads = app_state.db.list_threads_for_event(event.id).await?;
    Ok(Json(EventDetail::new(&event, &threads)))
}

#[utoipa::path(
    post,
    path = "/events/{event_id}/update/",
    request_body = EventPayload,
    responses(
        (status = 200, description = "Event updated", body = EventView),
        (status = 400, description = "Malformed body or invalid title"),
        (status = 404, description = "Event not found")
    ),
    params(
        ("event_id" = Uuid, Path, description = "The event."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn update_event_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(event_id): Path<Uuid>,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> Result<Json<EventView>, ApiError> {
    let draft = parse_body(payload)?.into_draft()?;
    let event = app_state.coach.owned_event(user_id, event_id).await?;
    let updated = app_state.db.update_event(event.id, draft).await?;
    Ok(Json(EventView::from(&updated)))
}

/// Delete an event together with its threads, messages and saved sessions.
#[utoipa::path(
    post,
    path = "/events/{event_id}/delete/",
    responses(
        (status = 200, description = "Event deleted", body = DeletedResponse),
        (status = 404, description = "Event not found")
    ),
    params(
        ("event_id" = Uuid, Path, description = "The event."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn delete_event_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<DeletedResponse>, ApiError> {
    let event = app_state.coach.owned_event(user_id, event_id).await?;
    app_state.db.delete_event(event.id).await?;
    info!("User {} deleted event {}", user_id, event.id);
    Ok(Json(DeletedResponse { success: true }))
}

/// Start a fresh writing session on an event at its current phase.
#[utoipa::path(
    post,
    path = "/events/{event_id}/write/",
    responses(
        (status = 200, description = "Session started", body = StartSessionResponse),
        (status = 404, description = "Event not found")
    ),
    params(
        ("event_id" = Uuid, Path, description = "The event."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn start_session_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(event_id): Path<Uuid>,
) -> Result<Json<StartSessionResponse>, ApiError> {
    let thread = app_state.coach.start_session(user_id, event_id).await?;
    Ok(Json(StartSessionResponse {
        thread_id: thread.id,
        correlation_id: thread.correlation_id,
        phase: thread.writing_phase.as_str().to_string(),
        phase_display: thread.writing_phase.description().to_string(),
    }))
}
