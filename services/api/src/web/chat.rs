//! services/api/src/web/chat.rs
//!
//! Handlers for talking to the writing coach and reading back what was said.

use crate::error::ApiError;
use crate::web::protocol::{
    ChatRequest, ChatResponse, ConversationResponse, HistoryMessage, HistoryResponse,
    SimpleChatRequest, SimpleChatResponse, ThreadView,
};
use crate::web::rest::parse_body;
use crate::web::state::AppState;
use axum::{
    extract::{rejection::JsonRejection, Extension, Path, State},
    response::{Html, Json},
};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use writing_coach_core::{domain::Phase, ports::PortError};

/// Parses a phase key from a path or body, rejecting anything outside the fixed sequence.
pub(crate) fn parse_phase(raw: &str) -> Result<Phase, ApiError> {
    raw.parse::<Phase>()
        .map_err(|e| ApiError::BadRequest(e.to_string()))
}

/// Send a message to the writing coach.
///
/// When `event_id` is given the conversation is scoped to that event and may advance its phase.
#[utoipa::path(
    post,
    path = "/chat/response",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "The coach's reply", body = ChatResponse),
        (status = 400, description = "Malformed body, blank message or unknown phase"),
        (status = 401, description = "Missing or invalid x-user-id header"),
        (status = 404, description = "Event not found"),
        (status = 502, description = "The completion service failed or timed out")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn chat_response_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>, ApiError> {
    let request = parse_body(payload)?;
    if let Some(raw) = request.phase.as_deref() {
        let claimed = parse_phase(raw)?;
        debug!("Client reports phase {} for user {}", claimed, user_id);
    }

    let outcome = app_state
        .coach
        .respond(user_id, request.event_id, &request.message, &app_state.shutdown)
        .await?;

    if outcome.advanced {
        info!(
            "User {} moved to phase {} (thread {})",
            user_id, outcome.phase, outcome.active_thread.correlation_id
        );
    }

    Ok(Json(ChatResponse {
        response: outcome.reply,
        phase: outcome.phase.as_str().to_string(),
        advanced: outcome.advanced,
        thread_id: outcome.active_thread.id,
    }))
}

/// Free-form chat outside of any event.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = SimpleChatRequest,
    responses(
        (status = 200, description = "The coach's reply", body = SimpleChatResponse),
        (status = 400, description = "Malformed body or blank message"),
        (status = 502, description = "The completion service failed or timed out")
    ),
    params(("x-user-id" = Uuid, Header, description = "The unique ID of the user."))
)]
pub async fn simple_chat_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    payload: Result<Json<SimpleChatRequest>, JsonRejection>,
) -> Result<Json<SimpleChatResponse>, ApiError> {
    let request = parse_body(payload)?;
    let outcome = app_state
        .coach
        .respond(user_id, None, &request.message, &app_state.shutdown)
        .await?;
    Ok(Json(SimpleChatResponse {
        message: outcome.reply,
    }))
}

/// A minimal page for chatting with the coach from a browser.
pub async fn chat_page_handler() -> Html<&'static str> {
    Html(CHAT_PAGE)
}

const CHAT_PAGE: &str = r#"<!doctype html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Writing Coach</title>
</head>
<body>
  <h1>Writing Coach</h1>
  <div id="log"></div>
  <form id="chat">
    <input id="message" autocomplete="off" placeholder="Write something...">
    <button type="submit">Send</button>
  </form>
  <script>
    const userId = new URLSearchParams(location.search).get("user") || "";
    const log = document.getElementById("log");
    const append = (who, text) => {
      const p = document.createElement("p");
      p.textContent = who + ": " + text;
      log.appendChild(p);
    };
    document.getElementById("chat").addEventListener("submit", async (e) => {
      e.preventDefault();
      const input = document.getElementById("message");
      const message = input.value;
      input.value = "";
      append("You", message);
      const res = await fetch("/chat", {
        method: "POST",
        headers: { "content-type": "application/json", "x-user-id": userId },
        body: JSON.stringify({ message }),
      });
      const body = await res.json();
      append("Coach", body.message || body.error);
    });
  </script>
</body>
</html>
"#;

/// Every message recorded for an event in one phase, oldest first.
#[utoipa::path(
    get,
    path = "/chat/history/{event_id}/{phase}",
    responses(
        (status = 200, description = "Message history", body = HistoryResponse),
        (status = 400, description = "Unknown phase"),
        (status = 404, description = "Event not found")
    ),
    params(
        ("event_id" = Uuid, Path, description = "The event."),
        ("phase" = String, Path, description = "One of facts, feelings, associations, growth."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn history_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path((event_id, phase)): Path<(Uuid, String)>,
) -> Result<Json<HistoryResponse>, ApiError> {
    let phase = parse_phase(&phase)?;
    let event = app_state.coach.owned_event(user_id, event_id).await?;
    let messages = app_state.db.messages_for_phase(event.id, phase).await?;

    Ok(Json(HistoryResponse {
        phase: phase.as_str().to_string(),
        phase_display: phase.description().to_string(),
        messages: messages.iter().map(HistoryMessage::from).collect(),
    }))
}

/// The messages of a single thread.
#[utoipa::path(
    get,
    path = "/conversation/{thread_id}",
    responses(
        (status = 200, description = "The thread and its messages", body = ConversationResponse),
        (status = 404, description = "Thread not found")
    ),
    params(
        ("thread_id" = Uuid, Path, description = "The thread."),
        ("x-user-id" = Uuid, Header, description = "The unique ID of the user.")
    )
)]
pub async fn conversation_handler(
    State(app_state): State<Arc<AppState>>,
    Extension(user_id): Extension<Uuid>,
    Path(thread_id): Path<Uuid>,
) -> Result<Json<ConversationResponse>, ApiError> {
    let thread = app_state.db.get_thread(thread_id).await?;
    if thread.user_id != user_id {
        return Err(PortError::NotFound(format!("Thread {} not found", thread_id)).into());
    }
    let messages = app_state.db.messages_for_thread(thread.id).await?;

    Ok(Json(ConversationResponse {
        thread: ThreadView::from(&thread),
        messages: messages.iter().map(HistoryMessage::from).collect(),
    }))
}
