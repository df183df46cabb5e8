//! crates/writing_coach_core/src/memory.rs
//!
//! In-memory implementations of the ports, for tests and local experiments.
//! Rows live in insertion-ordered vectors, so insertion order breaks timestamp ties.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{
    Event, EventDraft, Message, Phase, Profile, ProfileUpdate, Session, Thread, ThreadStatus,
};
use crate::ports::{
    CompletionService, JournalStore, PortError, PortResult, PromptMessage,
};

#[derive(Default)]
struct Tables {
    profiles: Vec<Profile>,
    events: Vec<Event>,
    threads: Vec<Thread>,
    messages: Vec<Message>,
    sessions: Vec<Session>,
}

/// A `JournalStore` backed by process memory.
#[derive(Default)]
pub struct InMemoryStore {
    tables: Mutex<Tables>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn not_found(kind: &str, id: Uuid) -> PortError {
    PortError::NotFound(format!("{} {} not found", kind, id))
}

#[async_trait]
impl JournalStore for InMemoryStore {
    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        let mut tables = self.tables.lock().await;
        if let Some(profile) = tables.profiles.iter().find(|p| p.user_id == user_id) {
            return Ok(profile.clone());
        }
        let profile = Profile::new(user_id);
        tables.profiles.push(profile.clone());
        Ok(profile)
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile> {
        let mut tables = self.tables.lock().await;
        let index = match tables.profiles.iter().position(|p| p.user_id == user_id) {
            Some(index) => index,
            None => {
                tables.profiles.push(Profile::new(user_id));
                tables.profiles.len() - 1
            }
        };
        let profile = &mut tables.profiles[index];
        if let Some(bio) = update.bio_context {
            profile.bio_context = Some(bio);
        }
        if let Some(goals) = update.writing_goals {
            profile.writing_goals = Some(goals);
        }
        if let Some(style) = update.personality_preference {
            profile.personality_preference = style;
        }
        profile.updated_at = Utc::now();
        Ok(profile.clone())
    }

    async fn create_event(&self, user_id: Uuid, draft: EventDraft) -> PortResult<Event> {
        let now = Utc::now();
        let event = Event {
            id: Uuid::new_v4(),
            user_id,
            title: draft.title,
            description: draft.description,
            date_occurred: draft.date_occurred,
            current_phase: Phase::default(),
            created_at: now,
            updated_at: now,
        };
        self.tables.lock().await.events.push(event.clone());
        Ok(event)
    }

    async fn get_event(&self, event_id: Uuid) -> PortResult<Event> {
        self.tables
            .lock()
            .await
            .events
            .iter()
            .find(|e| e.id == event_id)
            .cloned()
            .ok_or_else(|| not_found("Event", event_id))
    }

    async fn list_events(&self, user_id: Uuid) -> PortResult<Vec<Event>> {
        let tables = self.tables.lock().await;
        let mut events: Vec<Event> = tables
            .events
            .iter()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.date_occurred.cmp(&a.date_occurred));
        Ok(events)
    }

    async fn update_event(&self, event_id: Uuid, draft: EventDraft) -> PortResult<Event> {
        let mut tables = self.tables.lock().await;
        let event = tables
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| not_found("Event", event_id))?;
        event.title = draft.title;
        event.description = draft.description;
        event.date_occurred = draft.date_occurred;
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn advance_event_phase(
        &self,
        event_id: Uuid,
        from: Phase,
        to: Phase,
    ) -> PortResult<bool> {
        let mut tables = self.tables.lock().await;
        let event = tables
            .events
            .iter_mut()
            .find(|e| e.id == event_id)
            .ok_or_else(|| not_found("Event", event_id))?;
        if event.current_phase != from {
            return Ok(false);
        }
        event.current_phase = to;
        event.updated_at = Utc::now();
        Ok(true)
    }

    async fn delete_event(&self, event_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let before = tables.events.len();
        tables.events.retain(|e| e.id != event_id);
        if tables.events.len() == before {
            return Err(not_found("Event", event_id));
        }
        tables.threads.retain(|t| t.event_id != Some(event_id));
        tables.messages.retain(|m| m.event_id != Some(event_id));
        tables.sessions.retain(|s| s.event_id != event_id);
        Ok(())
    }

    async fn create_thread(&self, thread: Thread) -> PortResult<()> {
        self.tables.lock().await.threads.push(thread);
        Ok(())
    }

    async fn get_thread(&self, thread_id: Uuid) -> PortResult<Thread> {
        self.tables
            .lock()
            .await
            .threads
            .iter()
            .find(|t| t.id == thread_id)
            .cloned()
            .ok_or_else(|| not_found("Thread", thread_id))
    }

    async fn latest_open_thread(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
    ) -> PortResult<Option<Thread>> {
        let tables = self.tables.lock().await;
        // max_by_key keeps the last of equal elements, i.e. the latest created.
        Ok(tables
            .threads
            .iter()
            .filter(|t| {
                t.user_id == user_id && t.event_id == event_id && t.status == ThreadStatus::Open
            })
            .max_by_key(|t| (t.last_interaction, t.created_at))
            .cloned())
    }

    async fn supersede_thread(&self, thread_id: Uuid) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let thread = tables
            .threads
            .iter_mut()
            .find(|t| t.id == thread_id)
            .ok_or_else(|| not_found("Thread", thread_id))?;
        thread.status = ThreadStatus::Superseded;
        Ok(())
    }

    async fn list_threads_for_event(&self, event_id: Uuid) -> PortResult<Vec<Thread>> {
        Ok(self
            .tables
            .lock()
            .await
            .threads
            .iter()
            .filter(|t| t.event_id == Some(event_id))
            .cloned()
            .collect())
    }

    async fn record_exchange(
        &self,
        user: Message,
        assistant: Message,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        let mut tables = self.tables.lock().await;
        let thread = tables
            .threads
            .iter_mut()
            .find(|t| t.id == user.thread_id)
            .ok_or_else(|| not_found("Thread", user.thread_id))?;
        thread.last_interaction = at;
        tables.messages.push(user);
        tables.messages.push(assistant);
        Ok(())
    }

    async fn recent_messages(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
        phase: Phase,
        limit: usize,
    ) -> PortResult<Vec<Message>> {
        let tables = self.tables.lock().await;
        let matching: Vec<&Message> = tables
            .messages
            .iter()
            .filter(|m| m.user_id == user_id && m.event_id == event_id && m.phase == phase)
            .collect();
        let skip = matching.len().saturating_sub(limit);
        Ok(matching.into_iter().skip(skip).cloned().collect())
    }

    async fn messages_for_phase(&self, event_id: Uuid, phase: Phase) -> PortResult<Vec<Message>> {
        Ok(self
            .tables
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.event_id == Some(event_id) && m.phase == phase)
            .cloned()
            .collect())
    }

    async fn messages_for_thread(&self, thread_id: Uuid) -> PortResult<Vec<Message>> {
        Ok(self
            .tables
            .lock()
            .await
            .messages
            .iter()
            .filter(|m| m.thread_id == thread_id)
            .cloned()
            .collect())
    }

    async fn save_session(&self, session: Session) -> PortResult<()> {
        self.tables.lock().await.sessions.push(session);
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        self.tables
            .lock()
            .await
            .sessions
            .iter()
            .find(|s| s.id == session_id)
            .cloned()
            .ok_or_else(|| not_found("Session", session_id))
    }

    async fn list_sessions(&self, event_id: Uuid, phase: Phase) -> PortResult<Vec<Session>> {
        Ok(self
            .tables
            .lock()
            .await
            .sessions
            .iter()
            .rev()
            .filter(|s| s.event_id == event_id && s.phase == phase)
            .cloned()
            .collect())
    }
}

/// A `CompletionService` that replays canned replies in order and records
/// every prompt it receives. Running out of replies is an upstream failure.
#[derive(Default)]
pub struct ScriptedCompletion {
    replies: Mutex<VecDeque<String>>,
    received: Mutex<Vec<Vec<PromptMessage>>>,
}

impl ScriptedCompletion {
    pub fn new<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            replies: Mutex::new(replies.into_iter().map(Into::into).collect()),
            received: Mutex::new(Vec::new()),
        }
    }

    /// Prompts received so far, oldest first.
    pub async fn received(&self) -> Vec<Vec<PromptMessage>> {
        self.received.lock().await.clone()
    }
}

#[async_trait]
impl CompletionService for ScriptedCompletion {
    async fn complete(&self, prompt: &[PromptMessage]) -> PortResult<String> {
        self.received.lock().await.push(prompt.to_vec());
        self.replies
            .lock()
            .await
            .pop_front()
            .ok_or_else(|| PortError::Upstream("no scripted reply left".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Role;
    use chrono::NaiveDate;

    fn draft(title: &str, day: u32) -> EventDraft {
        EventDraft {
            title: title.to_string(),
            description: String::new(),
            date_occurred: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
        }
    }

    #[tokio::test]
    async fn deleting_an_event_cascades() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let event = store.create_event(user, draft("x", 1)).await.unwrap();
        let thread = Thread::open(user, Some(event.id), Phase::Facts);
        store.create_thread(thread.clone()).await.unwrap();
        store
            .record_exchange(
                Message::new(&thread, Role::User, Phase::Facts, "hi"),
                Message::new(&thread, Role::Assistant, Phase::Facts, "hello"),
                Utc::now(),
            )
            .await
            .unwrap();

        store.delete_event(event.id).await.unwrap();

        assert!(matches!(store.get_event(event.id).await, Err(PortError::NotFound(_))));
        assert!(matches!(store.get_thread(thread.id).await, Err(PortError::NotFound(_))));
        assert!(store.messages_for_thread(thread.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn events_are_listed_newest_occurrence_first() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        store.create_event(user, draft("older", 3)).await.unwrap();
        store.create_event(user, draft("newer", 20)).await.unwrap();
        store.create_event(Uuid::new_v4(), draft("someone else", 25)).await.unwrap();
        let titles: Vec<String> = store
            .list_events(user)
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(titles, vec!["newer", "older"]);
    }

    #[tokio::test]
    async fn latest_open_thread_prefers_recent_interaction() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let older = Thread::open(user, None, Phase::Facts);
        let newer = Thread::open(user, None, Phase::Facts);
        store.create_thread(older.clone()).await.unwrap();
        store.create_thread(newer.clone()).await.unwrap();
        store
            .record_exchange(
                Message::new(&older, Role::User, Phase::Facts, "still here"),
                Message::new(&older, Role::Assistant, Phase::Facts, "go on"),
                Utc::now() + chrono::Duration::seconds(5),
            )
            .await
            .unwrap();
        let latest = store.latest_open_thread(user, None).await.unwrap().unwrap();
        assert_eq!(latest.id, older.id);
    }

    #[tokio::test]
    async fn latest_open_thread_breaks_timestamp_ties_by_creation_order() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let first = Thread::open(user, None, Phase::Facts);
        let mut second = Thread::open(user, None, Phase::Facts);
        second.created_at = first.created_at;
        second.last_interaction = first.last_interaction;
        store.create_thread(first.clone()).await.unwrap();
        store.create_thread(second.clone()).await.unwrap();

        let latest = store.latest_open_thread(user, None).await.unwrap().unwrap();
        assert_eq!(latest.id, second.id);
    }

    #[tokio::test]
    async fn exchange_for_unknown_thread_records_nothing() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let ghost = Thread::open(user, None, Phase::Facts);
        let err = store
            .record_exchange(
                Message::new(&ghost, Role::User, Phase::Facts, "hi"),
                Message::new(&ghost, Role::Assistant, Phase::Facts, "hello"),
                Utc::now(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, PortError::NotFound(_)));
        assert!(store.messages_for_thread(ghost.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn phase_advance_only_applies_from_the_expected_phase() {
        let store = InMemoryStore::new();
        let event = store.create_event(Uuid::new_v4(), draft("x", 1)).await.unwrap();

        assert!(store
            .advance_event_phase(event.id, Phase::Facts, Phase::Feelings)
            .await
            .unwrap());
        // A second writer still believing the event is at facts loses.
        assert!(!store
            .advance_event_phase(event.id, Phase::Facts, Phase::Feelings)
            .await
            .unwrap());
        assert_eq!(
            store.get_event(event.id).await.unwrap().current_phase,
            Phase::Feelings
        );
    }

    #[tokio::test]
    async fn profile_is_created_once() {
        let store = InMemoryStore::new();
        let user = Uuid::new_v4();
        let first = store.get_or_create_profile(user).await.unwrap();
        let second = store.get_or_create_profile(user).await.unwrap();
        assert_eq!(first, second);
    }
}
