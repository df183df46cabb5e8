//! crates/writing_coach_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the application's core logic.
//! These traits form the boundary of the hexagonal architecture, allowing the core
//! to be independent of specific external implementations like databases or APIs.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Event, EventDraft, Message, Phase, Profile, ProfileUpdate, Role, Session, Thread,
};

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// A generic error type for all port operations.
/// This abstracts away the specific errors from external services (e.g., database, network).
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("Item not found: {0}")]
    NotFound(String),
    #[error("Validation failed: {0}")]
    Invalid(String),
    #[error("Completion service failed: {0}")]
    Upstream(String),
    #[error("An unexpected error occurred: {0}")]
    Unexpected(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait JournalStore: Send + Sync {
    // --- Profiles ---
    /// Returns the user's profile, creating a default one on first access.
    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile>;

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile>;

    // --- Events ---
    async fn create_event(&self, user_id: Uuid, draft: EventDraft) -> PortResult<Event>;

    async fn get_event(&self, event_id: Uuid) -> PortResult<Event>;

    /// Lists a user's events, most recently occurred first.
    async fn list_events(&self, user_id: Uuid) -> PortResult<Vec<Event>>;

    async fn update_event(&self, event_id: Uuid, draft: EventDraft) -> PortResult<Event>;

    /// Moves the event from `from` to `to` only if it is still at `from`.
    /// Returns `false`, changing nothing, when another turn got there first.
    async fn advance_event_phase(&self, event_id: Uuid, from: Phase, to: Phase)
        -> PortResult<bool>;

    /// Deletes the event together with its threads, messages and sessions.
    async fn delete_event(&self, event_id: Uuid) -> PortResult<()>;

    // --- Threads ---
    async fn create_thread(&self, thread: Thread) -> PortResult<()>;

    async fn get_thread(&self, thread_id: Uuid) -> PortResult<Thread>;

    /// The open thread for (user, event) with the latest interaction, ties broken
    /// by the latest creation.
    async fn latest_open_thread(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
    ) -> PortResult<Option<Thread>>;

    async fn supersede_thread(&self, thread_id: Uuid) -> PortResult<()>;

    async fn list_threads_for_event(&self, event_id: Uuid) -> PortResult<Vec<Thread>>;

    // --- Messages ---
    /// Stores one user/assistant exchange and marks its thread as used at `at`,
    /// all or nothing.
    async fn record_exchange(
        &self,
        user: Message,
        assistant: Message,
        at: DateTime<Utc>,
    ) -> PortResult<()>;

    /// The last `limit` messages for (user, event, phase), in chronological order.
    async fn recent_messages(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
        phase: Phase,
        limit: usize,
    ) -> PortResult<Vec<Message>>;

    /// Every message recorded for an event in one phase, in chronological order.
    async fn messages_for_phase(&self, event_id: Uuid, phase: Phase) -> PortResult<Vec<Message>>;

    async fn messages_for_thread(&self, thread_id: Uuid) -> PortResult<Vec<Message>>;

    // --- Saved Sessions ---
    async fn save_session(&self, session: Session) -> PortResult<()>;

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session>;

    /// Saved sessions for an event and phase, newest first.
    async fn list_sessions(&self, event_id: Uuid, phase: Phase) -> PortResult<Vec<Session>>;
}

/// One role-tagged block of a prompt sent to the completion service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

#[async_trait]
pub trait CompletionService: Send + Sync {
    /// Sends an ordered, role-tagged conversation and returns the assistant's reply.
    async fn complete(&self, prompt: &[PromptMessage]) -> PortResult<String>;
}
