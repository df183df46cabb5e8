//! services/api/src/web/protocol.rs
//!
//! Defines the JSON payloads exchanged between the browser client and the API server.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use writing_coach_core::domain::{
    Event, Message, Personality, Phase, Profile, Session, SessionEntry, Thread,
};
use writing_coach_core::threads::SessionEntryInput;

/// Display format for saved-session dates, e.g. "March 04, 2024 09:15 PM".
pub const SESSION_DATE_FORMAT: &str = "%B %d, %Y %I:%M %p";
/// Display format for message timestamps.
pub const MESSAGE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

//=========================================================================================
// Chat
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub event_id: Option<Uuid>,
    /// Optional phase key; must be valid when present.
    #[serde(default)]
    pub phase: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
    pub phase: String,
    pub advanced: bool,
    /// The thread the next message will be recorded on.
    pub thread_id: Uuid,
}

#[derive(Deserialize, ToSchema)]
pub struct SimpleChatRequest {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct SimpleChatResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct HistoryMessage {
    #[serde(rename = "type")]
    pub kind: String,
    pub content: String,
    pub timestamp: String,
}

impl From<&Message> for HistoryMessage {
    fn from(message: &Message) -> Self {
        Self {
            kind: message.role.as_str().to_string(),
            content: message.content.clone(),
            timestamp: message.created_at.format(MESSAGE_TIME_FORMAT).to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HistoryResponse {
    pub phase: String,
    pub phase_display: String,
    pub messages: Vec<HistoryMessage>,
}

#[derive(Serialize, ToSchema)]
pub struct ConversationResponse {
    pub thread: ThreadView,
    pub messages: Vec<HistoryMessage>,
}

//=========================================================================================
// Saved Sessions
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct SessionEntryPayload {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

impl From<SessionEntryPayload> for SessionEntryInput {
    fn from(payload: SessionEntryPayload) -> Self {
        Self {
            content: payload.content,
            kind: payload.kind,
        }
    }
}

#[derive(Deserialize, ToSchema)]
pub struct SaveSessionRequest {
    pub event_id: Uuid,
    pub phase: String,
    pub messages: Vec<SessionEntryPayload>,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct SaveSessionResponse {
    pub success: bool,
    pub session_id: Uuid,
    pub title: String,
}

#[derive(Serialize, ToSchema)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
}

#[derive(Serialize, ToSchema)]
pub struct SessionSummary {
    pub id: Uuid,
    pub title: String,
    pub formatted_date: String,
}

impl From<&Session> for SessionSummary {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            title: session.title.clone(),
            formatted_date: session.created_at.format(SESSION_DATE_FORMAT).to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionListResponse {
    pub success: bool,
    pub sessions: Vec<SessionSummary>,
}

#[derive(Serialize, ToSchema)]
pub struct SessionEntryView {
    pub content: String,
    #[serde(rename = "type")]
    pub kind: String,
}

impl From<&SessionEntry> for SessionEntryView {
    fn from(entry: &SessionEntry) -> Self {
        Self {
            content: entry.content.clone(),
            kind: entry.role.as_str().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct SessionDetail {
    pub id: Uuid,
    pub event_id: Uuid,
    pub phase: String,
    pub phase_display: String,
    pub title: String,
    pub formatted_date: String,
    pub messages: Vec<SessionEntryView>,
}

impl From<&Session> for SessionDetail {
    fn from(session: &Session) -> Self {
        Self {
            id: session.id,
            event_id: session.event_id,
            phase: session.phase.as_str().to_string(),
            phase_display: session.phase.description().to_string(),
            title: session.title.clone(),
            formatted_date: session.created_at.format(SESSION_DATE_FORMAT).to_string(),
            messages: session.messages.iter().map(SessionEntryView::from).collect(),
        }
    }
}

//=========================================================================================
// Events and Threads
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct EventPayload {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    pub date_occurred: NaiveDate,
}

#[derive(Serialize, ToSchema)]
pub struct EventView {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub date_occurred: NaiveDate,
    pub current_phase: String,
    pub phase_display: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Event> for EventView {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            title: event.title.clone(),
            description: event.description.clone(),
            date_occurred: event.date_occurred,
            current_phase: event.current_phase.as_str().to_string(),
            phase_display: event.current_phase.description().to_string(),
            created_at: event.created_at,
            updated_at: event.updated_at,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ThreadView {
    pub id: Uuid,
    pub correlation_id: String,
    pub writing_phase: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl From<&Thread> for ThreadView {
    fn from(thread: &Thread) -> Self {
        Self {
            id: thread.id,
            correlation_id: thread.correlation_id.clone(),
            writing_phase: thread.writing_phase.as_str().to_string(),
            status: thread.status.as_str().to_string(),
            created_at: thread.created_at,
            last_interaction: thread.last_interaction,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct PhaseProgress {
    pub phase: String,
    pub phase_display: String,
    /// Whether the event has reached this phase.
    pub reached: bool,
}

#[derive(Serialize, ToSchema)]
pub struct EventDetail {
    pub event: EventView,
    pub phases: Vec<PhaseProgress>,
    pub threads: Vec<ThreadView>,
}

impl EventDetail {
    pub fn new(event: &Event, threads: &[Thread]) -> Self {
        Self {
            event: EventView::from(event),
            phases: Phase::ALL
                .into_iter()
                .map(|phase| PhaseProgress {
                    phase: phase.as_str().to_string(),
                    phase_display: phase.description().to_string(),
                    reached: phase <= event.current_phase,
                })
                .collect(),
            threads: threads.iter().map(ThreadView::from).collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct StartSessionResponse {
    pub thread_id: Uuid,
    pub correlation_id: String,
    pub phase: String,
    pub phase_display: String,
}

#[derive(Serialize, ToSchema)]
pub struct DeletedResponse {
    pub success: bool,
}

//=========================================================================================
// Profile
//=========================================================================================

#[derive(Deserialize, ToSchema)]
pub struct ProfilePayload {
    #[serde(default)]
    pub bio_context: Option<String>,
    #[serde(default)]
    pub writing_goals: Option<String>,
    #[serde(default)]
    pub personality_preference: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct PersonalityChoice {
    pub value: String,
    pub label: String,
}

#[derive(Serialize, ToSchema)]
pub struct ProfileView {
    pub bio_context: Option<String>,
    pub writing_goals: Option<String>,
    pub personality_preference: String,
    pub personality_display: String,
    pub personality_choices: Vec<PersonalityChoice>,
}

impl From<&Profile> for ProfileView {
    fn from(profile: &Profile) -> Self {
        Self {
            bio_context: profile.bio_context.clone(),
            writing_goals: profile.writing_goals.clone(),
            personality_preference: profile.personality_preference.as_str().to_string(),
            personality_display: profile.personality_preference.label().to_string(),
            personality_choices: Personality::ALL
                .into_iter()
                .map(|style| PersonalityChoice {
                    value: style.as_str().to_string(),
                    label: style.label().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
}
