//! services/api/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `JournalStore` port from the `core` crate. It handles all interactions
//! with the PostgreSQL database using `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use writing_coach_core::domain::{
    Event, EventDraft, Message, Personality, Phase, Profile, ProfileUpdate, Session,
    SessionEntry, Thread,
};
use writing_coach_core::ports::{JournalStore, PortError, PortResult};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A database adapter that implements the `JournalStore` port.
#[derive(Clone)]
pub struct DbAdapter {
    pool: PgPool,
}

impl DbAdapter {
    /// Creates a new `DbAdapter`.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// A helper function to run database migrations at startup.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;
        Ok(())
    }
}

fn unexpected(e: sqlx::Error) -> PortError {
    PortError::Unexpected(e.to_string())
}

fn lookup_error(e: sqlx::Error, what: String) -> PortError {
    match e {
        sqlx::Error::RowNotFound => PortError::NotFound(format!("{} not found", what)),
        _ => PortError::Unexpected(e.to_string()),
    }
}

fn parse_column<T: std::str::FromStr>(value: &str) -> PortResult<T>
where
    T::Err: std::fmt::Display,
{
    value
        .parse::<T>()
        .map_err(|e| PortError::Unexpected(format!("corrupt column value: {}", e)))
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct ProfileRecord {
    user_id: Uuid,
    bio_context: Option<String>,
    writing_goals: Option<String>,
    personality_preference: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl ProfileRecord {
    fn to_domain(self) -> Profile {
        Profile {
            user_id: self.user_id,
            bio_context: self.bio_context,
            writing_goals: self.writing_goals,
            personality_preference: Personality::resolve(Some(&self.personality_preference)),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(FromRow)]
struct EventRecord {
    id: Uuid,
    user_id: Uuid,
    title: String,
    description: String,
    date_occurred: NaiveDate,
    current_phase: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}
impl EventRecord {
    fn to_domain(self) -> PortResult<Event> {
        Ok(Event {
            id: self.id,
            user_id: self.user_id,
            title: self.title,
            description: self.description,
            date_occurred: self.date_occurred,
            current_phase: parse_column(&self.current_phase)?,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(FromRow)]
struct ThreadRecord {
    id: Uuid,
    user_id: Uuid,
    event_id: Option<Uuid>,
    correlation_id: String,
    writing_phase: String,
    status: String,
    created_at: DateTime<Utc>,
    last_interaction: DateTime<Utc>,
}
impl ThreadRecord {
    fn to_domain(self) -> PortResult<Thread> {
        Ok(Thread {
            id: self.id,
            user_id: self.user_id,
            event_id: self.event_id,
            correlation_id: self.correlation_id,
            writing_phase: parse_column(&self.writing_phase)?,
            status: parse_column(&self.status)?,
            created_at: self.created_at,
            last_interaction: self.last_interaction,
        })
    }
}

#[derive(FromRow)]
struct MessageRecord {
    id: Uuid,
    thread_id: Uuid,
    user_id: Uuid,
    event_id: Option<Uuid>,
    role: String,
    phase: String,
    content: String,
    created_at: DateTime<Utc>,
}
impl MessageRecord {
    fn to_domain(self) -> PortResult<Message> {
        Ok(Message {
            id: self.id,
            thread_id: self.thread_id,
            user_id: self.user_id,
            event_id: self.event_id,
            role: parse_column(&self.role)?,
            phase: parse_column(&self.phase)?,
            content: self.content,
            created_at: self.created_at,
        })
    }
}

#[derive(FromRow)]
struct SessionRecord {
    id: Uuid,
    event_id: Uuid,
    phase: String,
    title: String,
    messages: String,
    created_at: DateTime<Utc>,
}
impl SessionRecord {
    fn to_domain(self) -> PortResult<Session> {
        let messages: Vec<SessionEntry> = serde_json::from_str(&self.messages)
            .map_err(|e| PortError::Unexpected(format!("corrupt session messages: {}", e)))?;
        Ok(Session {
            id: self.id,
            event_id: self.event_id,
            phase: parse_column(&self.phase)?,
            title: self.title,
            messages,
            created_at: self.created_at,
        })
    }
}

fn collect_domain<R, T>(records: Vec<R>, convert: fn(R) -> PortResult<T>) -> PortResult<Vec<T>> {
    records.into_iter().map(convert).collect()
}

const PROFILE_COLUMNS: &str =
    "user_id, bio_context, writing_goals, personality_preference, created_at, updated_at";
const EVENT_COLUMNS: &str =
    "id, user_id, title, description, date_occurred, current_phase, created_at, updated_at";
const THREAD_COLUMNS: &str =
    "id, user_id, event_id, correlation_id, writing_phase, status, created_at, last_interaction";
const MESSAGE_COLUMNS: &str =
    "id, thread_id, user_id, event_id, role, phase, content, created_at";
const SESSION_COLUMNS: &str = "id, event_id, phase, title, messages, created_at";

//=========================================================================================
// `JournalStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl JournalStore for DbAdapter {
    async fn get_or_create_profile(&self, user_id: Uuid) -> PortResult<Profile> {
        sqlx::query("INSERT INTO profiles (user_id) VALUES ($1) ON CONFLICT (user_id) DO NOTHING")
            .bind(user_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;

        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "SELECT {PROFILE_COLUMNS} FROM profiles WHERE user_id = $1"
        ))
        .bind(user_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| lookup_error(e, format!("Profile for user {}", user_id)))?;

        Ok(record.to_domain())
    }

    async fn update_profile(&self, user_id: Uuid, update: ProfileUpdate) -> PortResult<Profile> {
        self.get_or_create_profile(user_id).await?;

        let record = sqlx::query_as::<_, ProfileRecord>(&format!(
            "UPDATE profiles SET \
                bio_context = COALESCE($2, bio_context), \
                writing_goals = COALESCE($3, writing_goals), \
                personality_preference = COALESCE($4, personality_preference), \
                updated_at = NOW() \
             WHERE user_id = $1 RETURNING {PROFILE_COLUMNS}"
        ))
        .bind(user_id)
        .bind(update.bio_context)
        .bind(update.writing_goals)
        .bind(update.personality_preference.map(|p| p.as_str()))
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;

        Ok(record.to_domain())
    }

    async fn create_event(&self, user_id: Uuid, draft: EventDraft) -> PortResult<Event> {
        let record = sqlx::query_as::<_, EventRecord>(&format!(
            "INSERT INTO events (id, user_id, title, description, date_occurred, current_phase) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {EVENT_COLUMNS}"
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(draft.title)
        .bind(draft.description)
        .bind(draft.date_occurred)
        .bind(Phase::default().as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(unexpected)?;
        record.to_domain()
    }

    async fn get_event(&self, event_id: Uuid) -> PortResult<Event> {
        let record = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE id = $1"
        ))
        .bind(event_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| lookup_error(e, format!("Event {}", event_id)))?;
        record.to_domain()
    }

    async fn list_events(&self, user_id: Uuid) -> PortResult<Vec<Event>> {
        let records = sqlx::query_as::<_, EventRecord>(&format!(
            "SELECT {EVENT_COLUMNS} FROM events WHERE user_id = $1 \
             ORDER BY date_occurred DESC, created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect_domain(records, EventRecord::to_domain)
    }

    async fn update_event(&self, event_id: Uuid, draft: EventDraft) -> PortResult<Event> {
        let record = sqlx::query_as::<_, EventRecord>(&format!(
            "UPDATE events SET title = $2, description = $3, date_occurred = $4, updated_at = NOW() \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        ))
        .bind(event_id)
        .bind(draft.title)
        .bind(draft.description)
        .bind(draft.date_occurred)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| lookup_error(e, format!("Event {}", event_id)))?;
        record.to_domain()
    }

    async fn advance_event_phase(&self, event_id: Uuid, from: Phase, to: Phase) -> PortResult<bool> {
        let result = sqlx::query(
            "UPDATE events SET current_phase = $3, updated_at = NOW() \
             WHERE id = $1 AND current_phase = $2",
        )
        .bind(event_id)
        .bind(from.as_str())
        .bind(to.as_str())
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        if result.rows_affected() == 1 {
            return Ok(true);
        }

        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM events WHERE id = $1)")
            .bind(event_id)
            .fetch_one(&self.pool)
            .await
            .map_err(unexpected)?;
        if !exists {
            return Err(PortError::NotFound(format!("Event {} not found", event_id)));
        }
        Ok(false)
    }

    async fn delete_event(&self, event_id: Uuid) -> PortResult<()> {
        let result = sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        if result.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Event {} not found", event_id)));
        }
        Ok(())
    }

    async fn create_thread(&self, thread: Thread) -> PortResult<()> {
        sqlx::query(
            "INSERT INTO threads \
                (id, user_id, event_id, correlation_id, writing_phase, status, created_at, last_interaction) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(thread.id)
        .bind(thread.user_id)
        .bind(thread.event_id)
        .bind(thread.correlation_id)
        .bind(thread.writing_phase.as_str())
        .bind(thread.status.as_str())
        .bind(thread.created_at)
        .bind(thread.last_interaction)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_thread(&self, thread_id: Uuid) -> PortResult<Thread> {
        let record = sqlx::query_as::<_, ThreadRecord>(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE id = $1"
        ))
        .bind(thread_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| lookup_error(e, format!("Thread {}", thread_id)))?;
        record.to_domain()
    }

    async fn latest_open_thread(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
    ) -> PortResult<Option<Thread>> {
        let record = sqlx::query_as::<_, ThreadRecord>(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads \
             WHERE user_id = $1 AND event_id IS NOT DISTINCT FROM $2 AND status = 'open' \
             ORDER BY last_interaction DESC, created_at DESC, seq DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(event_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(unexpected)?;
        record.map(ThreadRecord::to_domain).transpose()
    }

    async fn supersede_thread(&self, thread_id: Uuid) -> PortResult<()> {
        sqlx::query("UPDATE threads SET status = 'superseded' WHERE id = $1")
            .bind(thread_id)
            .execute(&self.pool)
            .await
            .map_err(unexpected)?;
        Ok(())
    }

    async fn list_threads_for_event(&self, event_id: Uuid) -> PortResult<Vec<Thread>> {
        let records = sqlx::query_as::<_, ThreadRecord>(&format!(
            "SELECT {THREAD_COLUMNS} FROM threads WHERE event_id = $1 ORDER BY created_at ASC, seq ASC"
        ))
        .bind(event_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect_domain(records, ThreadRecord::to_domain)
    }

    async fn record_exchange(
        &self,
        user: Message,
        assistant: Message,
        at: DateTime<Utc>,
    ) -> PortResult<()> {
        let thread_id = user.thread_id;
        let mut tx = self.pool.begin().await.map_err(unexpected)?;

        let touched = sqlx::query("UPDATE threads SET last_interaction = $2 WHERE id = $1")
            .bind(thread_id)
            .bind(at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        if touched.rows_affected() == 0 {
            return Err(PortError::NotFound(format!("Thread {} not found", thread_id)));
        }

        for message in [user, assistant] {
            sqlx::query(
                "INSERT INTO messages (id, thread_id, user_id, event_id, role, phase, content, created_at) \
                 VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
            )
            .bind(message.id)
            .bind(message.thread_id)
            .bind(message.user_id)
            .bind(message.event_id)
            .bind(message.role.as_str())
            .bind(message.phase.as_str())
            .bind(message.content)
            .bind(message.created_at)
            .execute(&mut *tx)
            .await
            .map_err(unexpected)?;
        }

        tx.commit().await.map_err(unexpected)?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
        phase: Phase,
        limit: usize,
    ) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM ( \
                SELECT {MESSAGE_COLUMNS}, seq FROM messages \
                WHERE user_id = $1 AND event_id IS NOT DISTINCT FROM $2 AND phase = $3 \
                ORDER BY created_at DESC, seq DESC LIMIT $4 \
             ) recent ORDER BY created_at ASC, seq ASC"
        ))
        .bind(user_id)
        .bind(event_id)
        .bind(phase.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect_domain(records, MessageRecord::to_domain)
    }

    async fn messages_for_phase(&self, event_id: Uuid, phase: Phase) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE event_id = $1 AND phase = $2 \
             ORDER BY created_at ASC, seq ASC"
        ))
        .bind(event_id)
        .bind(phase.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect_domain(records, MessageRecord::to_domain)
    }

    async fn messages_for_thread(&self, thread_id: Uuid) -> PortResult<Vec<Message>> {
        let records = sqlx::query_as::<_, MessageRecord>(&format!(
            "SELECT {MESSAGE_COLUMNS} FROM messages WHERE thread_id = $1 \
             ORDER BY created_at ASC, seq ASC"
        ))
        .bind(thread_id)
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect_domain(records, MessageRecord::to_domain)
    }

    async fn save_session(&self, session: Session) -> PortResult<()> {
        let messages = serde_json::to_string(&session.messages)
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        sqlx::query(
            "INSERT INTO sessions (id, event_id, phase, title, messages, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6)",
        )
        .bind(session.id)
        .bind(session.event_id)
        .bind(session.phase.as_str())
        .bind(session.title)
        .bind(messages)
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(unexpected)?;
        Ok(())
    }

    async fn get_session(&self, session_id: Uuid) -> PortResult<Session> {
        let record = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = $1"
        ))
        .bind(session_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| lookup_error(e, format!("Session {}", session_id)))?;
        record.to_domain()
    }

    async fn list_sessions(&self, event_id: Uuid, phase: Phase) -> PortResult<Vec<Session>> {
        let records = sqlx::query_as::<_, SessionRecord>(&format!(
            "SELECT {SESSION_COLUMNS} FROM sessions WHERE event_id = $1 AND phase = $2 \
             ORDER BY created_at DESC"
        ))
        .bind(event_id)
        .bind(phase.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(unexpected)?;
        collect_domain(records, SessionRecord::to_domain)
    }
}
