//! crates/writing_coach_core/src/threads.rs
//!
//! Decides which conversation thread a turn belongs to, rotates threads when the
//! phase advances, and stores explicitly saved sessions.
//!
//! Resolution of the active thread is read-then-write without a lock; two
//! concurrent first messages for the same event can each create a thread.

use chrono::Utc;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::domain::{Event, Phase, Role, Session, SessionEntry, Thread};
use crate::ports::{JournalStore, PortError, PortResult};

/// Upper bound, in characters, for a title derived from the first user message.
pub const SESSION_TITLE_MAX_CHARS: usize = 100;

/// Upper bound, in characters, for any stored session title.
pub const TITLE_LIMIT: usize = 200;

/// A message entry as submitted for saving; both fields are required.
#[derive(Debug, Clone, Default)]
pub struct SessionEntryInput {
    pub content: Option<String>,
    pub kind: Option<String>,
}

pub struct ThreadManager {
    store: Arc<dyn JournalStore>,
}

impl ThreadManager {
    pub fn new(store: Arc<dyn JournalStore>) -> Self {
        Self { store }
    }

    /// Returns the most recently used open thread for (user, event), creating one
    /// at the event's current phase if none exists.
    pub async fn get_or_create_active_thread(
        &self,
        user_id: Uuid,
        event: Option<&Event>,
    ) -> PortResult<Thread> {
        let event_id = event.map(|e| e.id);
        if let Some(thread) = self.store.latest_open_thread(user_id, event_id).await? {
            return Ok(thread);
        }

        let phase = event.map(|e| e.current_phase).unwrap_or_default();
        let thread = Thread::open(user_id, event_id, phase);
        self.store.create_thread(thread.clone()).await?;
        info!(
            "Created thread {} for user {} (event {:?}, phase {})",
            thread.correlation_id, user_id, event_id, phase
        );
        Ok(thread)
    }

    /// Supersedes `thread` and opens its successor at `new_phase`. The old row is kept.
    pub async fn rotate_on_phase_advance(
        &self,
        thread: &Thread,
        new_phase: Phase,
    ) -> PortResult<Thread> {
        self.store.supersede_thread(thread.id).await?;
        let successor = Thread::open(thread.user_id, thread.event_id, new_phase);
        self.store.create_thread(successor.clone()).await?;
        info!(
            "Rotated thread {} -> {} at phase {}",
            thread.correlation_id, successor.correlation_id, new_phase
        );
        Ok(successor)
    }

    /// Explicit "start a new writing session": closes whatever thread is open for
    /// the event and opens a fresh one at the event's current phase.
    pub async fn start_new_thread(&self, user_id: Uuid, event: &Event) -> PortResult<Thread> {
        if let Some(current) = self.store.latest_open_thread(user_id, Some(event.id)).await? {
            self.store.supersede_thread(current.id).await?;
        }
        let thread = Thread::open(user_id, Some(event.id), event.current_phase);
        self.store.create_thread(thread.clone()).await?;
        info!(
            "Started writing session {} for event {} at phase {}",
            thread.correlation_id, event.id, event.current_phase
        );
        Ok(thread)
    }

    /// Validates and stores a write-once snapshot of a phase's conversation.
    pub async fn save_session(
        &self,
        event: &Event,
        phase: Phase,
        entries: Vec<SessionEntryInput>,
        title: Option<String>,
    ) -> PortResult<Session> {
        let messages = validate_entries(entries)?;
        let title = match title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty()) {
            Some(title) if title.chars().count() > TITLE_LIMIT => {
                return Err(PortError::Invalid(format!(
                    "title must be at most {TITLE_LIMIT} characters"
                )));
            }
            Some(title) => title,
            None => derive_session_title(&event.title, phase, &messages)
                .chars()
                .take(TITLE_LIMIT)
                .collect(),
        };

        let session = Session {
            id: Uuid::new_v4(),
            event_id: event.id,
            phase,
            title,
            messages,
            created_at: Utc::now(),
        };
        self.store.save_session(session.clone()).await?;
        info!("Saved session '{}' for event {}", session.title, event.id);
        Ok(session)
    }
}

/// Every entry must carry a text body and a known role tag.
pub fn validate_entries(entries: Vec<SessionEntryInput>) -> PortResult<Vec<SessionEntry>> {
    if entries.is_empty() {
        return Err(PortError::Invalid("no messages to save".to_string()));
    }

    entries
        .into_iter()
        .enumerate()
        .map(|(index, entry)| {
            let content = entry.content.ok_or_else(|| {
                PortError::Invalid(format!("message {index} is missing 'content'"))
            })?;
            let kind = entry
                .kind
                .ok_or_else(|| PortError::Invalid(format!("message {index} is missing 'type'")))?;
            let role = kind
                .parse::<Role>()
                .map_err(|e| PortError::Invalid(format!("message {index}: {e}")))?;
            Ok(SessionEntry { content, role })
        })
        .collect()
}

/// Title from the first user message, truncated with an ellipsis, or
/// "<event title> - <phase> Session" when the user said nothing.
pub fn derive_session_title(event_title: &str, phase: Phase, messages: &[SessionEntry]) -> String {
    let first_user = messages
        .iter()
        .find(|m| m.role == Role::User)
        .map(|m| m.content.trim())
        .filter(|c| !c.is_empty());

    match first_user {
        Some(content) if content.chars().count() > SESSION_TITLE_MAX_CHARS => {
            let head: String = content.chars().take(SESSION_TITLE_MAX_CHARS).collect();
            format!("{head}...")
        }
        Some(content) => content.to_string(),
        None => format!("{} - {} Session", event_title, phase.label()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    fn entry(role: Role, content: &str) -> SessionEntry {
        SessionEntry {
            content: content.to_string(),
            role,
        }
    }

    #[test]
    fn long_first_user_message_is_truncated_with_ellipsis() {
        let long = "A".repeat(150);
        let title = derive_session_title("Event", Phase::Facts, &[entry(Role::User, &long)]);
        assert_eq!(title, format!("{}...", "A".repeat(100)));
    }

    #[test]
    fn short_first_user_message_is_used_verbatim() {
        let messages = [
            entry(Role::Assistant, "What happened?"),
            entry(Role::User, "I moved house"),
        ];
        assert_eq!(
            derive_session_title("Event", Phase::Facts, &messages),
            "I moved house"
        );
    }

    #[test]
    fn exactly_one_hundred_chars_is_not_truncated() {
        let exact = "b".repeat(100);
        assert_eq!(
            derive_session_title("Event", Phase::Facts, &[entry(Role::User, &exact)]),
            exact
        );
    }

    #[test]
    fn falls_back_to_event_and_phase() {
        let title =
            derive_session_title("Graduation", Phase::Growth, &[entry(Role::Assistant, "Hi")]);
        assert_eq!(title, "Graduation - Growth Session");
    }

    #[test]
    fn truncation_counts_characters_not_bytes() {
        let long = "é".repeat(120);
        let title = derive_session_title("Event", Phase::Facts, &[entry(Role::User, &long)]);
        assert_eq!(title.chars().count(), 103);
    }

    #[test]
    fn validation_rejects_missing_fields_and_unknown_roles() {
        let missing_content = vec![SessionEntryInput {
            content: None,
            kind: Some("user".to_string()),
        }];
        assert!(matches!(
            validate_entries(missing_content),
            Err(PortError::Invalid(_))
        ));

        let unknown_role = vec![SessionEntryInput {
            content: Some("x".to_string()),
            kind: Some("narrator".to_string()),
        }];
        assert!(matches!(
            validate_entries(unknown_role),
            Err(PortError::Invalid(_))
        ));

        assert!(matches!(validate_entries(vec![]), Err(PortError::Invalid(_))));
    }
}
