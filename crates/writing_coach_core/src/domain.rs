//! crates/writing_coach_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format,
//! apart from the wire keys of the enumerations.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

//=========================================================================================
// Phase
//=========================================================================================

/// One stage of the emotional-processing sequence an event moves through.
///
/// The ordering of the variants is the ordering of the sequence, so `Phase`
/// compares the way the conversation progresses.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Facts,
    Feelings,
    Associations,
    Growth,
}

impl Phase {
    pub const ALL: [Phase; 4] = [
        Phase::Facts,
        Phase::Feelings,
        Phase::Associations,
        Phase::Growth,
    ];

    /// The key used on the wire and in the database.
    pub fn as_str(self) -> &'static str {
        match self {
            Phase::Facts => "facts",
            Phase::Feelings => "feelings",
            Phase::Associations => "associations",
            Phase::Growth => "growth",
        }
    }

    /// Short human-readable name.
    pub fn label(self) -> &'static str {
        match self {
            Phase::Facts => "Facts",
            Phase::Feelings => "Feelings",
            Phase::Associations => "Associations",
            Phase::Growth => "Growth",
        }
    }

    /// Long human-readable name, used for display headings.
    pub fn description(self) -> &'static str {
        match self {
            Phase::Facts => "Factual Description",
            Phase::Feelings => "Emotional Response",
            Phase::Associations => "Behavioral Associations",
            Phase::Growth => "Positive Reframing & Growth",
        }
    }

    pub fn is_terminal(self) -> bool {
        self == Phase::Growth
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string is not one of the known enumeration keys.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown {kind} '{value}'")]
pub struct ParseKeyError {
    pub kind: &'static str,
    pub value: String,
}

impl FromStr for Phase {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Phase::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseKeyError {
                kind: "phase",
                value: s.to_string(),
            })
    }
}

//=========================================================================================
// Personality
//=========================================================================================

/// The tone the writing coach adopts for a user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Personality {
    #[default]
    Professional,
    Empathetic,
    Encouraging,
    Friendly,
}

impl Personality {
    pub const ALL: [Personality; 4] = [
        Personality::Professional,
        Personality::Empathetic,
        Personality::Encouraging,
        Personality::Friendly,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Personality::Professional => "professional",
            Personality::Empathetic => "empathetic",
            Personality::Encouraging => "encouraging",
            Personality::Friendly => "friendly",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Personality::Professional => "Professional and Academic",
            Personality::Empathetic => "Empathetic and Supportive",
            Personality::Encouraging => "Encouraging and Motivational",
            Personality::Friendly => "Friendly and Casual",
        }
    }

    /// Resolves a stored preference, falling back to the default style for
    /// anything missing or unrecognised.
    pub fn resolve(value: Option<&str>) -> Self {
        value
            .and_then(|v| v.parse().ok())
            .unwrap_or_default()
    }
}

impl fmt::Display for Personality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Personality {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Personality::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ParseKeyError {
                kind: "personality",
                value: s.to_string(),
            })
    }
}

//=========================================================================================
// Role
//=========================================================================================

/// Who authored a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::System => "system",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            "system" => Ok(Role::System),
            _ => Err(ParseKeyError {
                kind: "role",
                value: s.to_string(),
            }),
        }
    }
}

//=========================================================================================
// Entities
//=========================================================================================

/// A user-owned journaling subject.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub description: String,
    pub date_occurred: NaiveDate,
    pub current_phase: Phase,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The user-editable fields of an event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub title: String,
    pub description: String,
    pub date_occurred: NaiveDate,
}

/// Lifecycle of a conversation thread. A thread never leaves `Superseded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThreadStatus {
    Open,
    Superseded,
}

impl ThreadStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ThreadStatus::Open => "open",
            ThreadStatus::Superseded => "superseded",
        }
    }
}

impl FromStr for ThreadStatus {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(ThreadStatus::Open),
            "superseded" => Ok(ThreadStatus::Superseded),
            _ => Err(ParseKeyError {
                kind: "thread status",
                value: s.to_string(),
            }),
        }
    }
}

/// A conversation lineage with the completion service.
#[derive(Debug, Clone, PartialEq)]
pub struct Thread {
    pub id: Uuid,
    pub user_id: Uuid,
    pub event_id: Option<Uuid>,
    /// Opaque id correlating this lineage with the completion service.
    pub correlation_id: String,
    pub writing_phase: Phase,
    pub status: ThreadStatus,
    pub created_at: DateTime<Utc>,
    pub last_interaction: DateTime<Utc>,
}

impl Thread {
    /// Builds a fresh, open thread with a newly allocated correlation id.
    pub fn open(user_id: Uuid, event_id: Option<Uuid>, phase: Phase) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            event_id,
            correlation_id: new_correlation_id(),
            writing_phase: phase,
            status: ThreadStatus::Open,
            created_at: now,
            last_interaction: now,
        }
    }
}

pub fn new_correlation_id() -> String {
    format!("thread_{}", Uuid::new_v4().simple())
}

/// A single immutable conversation turn.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub user_id: Uuid,
    pub event_id: Option<Uuid>,
    pub role: Role,
    pub phase: Phase,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl Message {
    pub fn new(thread: &Thread, role: Role, phase: Phase, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            thread_id: thread.id,
            user_id: thread.user_id,
            event_id: thread.event_id,
            role,
            phase,
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// One entry of a saved session, in the `{content, type}` shape the client sends.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionEntry {
    pub content: String,
    #[serde(rename = "type")]
    pub role: Role,
}

/// An explicitly saved, write-once snapshot of a phase's conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub id: Uuid,
    pub event_id: Uuid,
    pub phase: Phase,
    pub title: String,
    pub messages: Vec<SessionEntry>,
    pub created_at: DateTime<Utc>,
}

/// Per-user coaching preferences and background.
#[derive(Debug, Clone, PartialEq)]
pub struct Profile {
    pub user_id: Uuid,
    pub bio_context: Option<String>,
    pub writing_goals: Option<String>,
    pub personality_preference: Personality,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    pub fn new(user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            user_id,
            bio_context: None,
            writing_goals: None,
            personality_preference: Personality::default(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// The changes a user may apply to their profile. `None` leaves a field untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileUpdate {
    pub bio_context: Option<String>,
    pub writing_goals: Option<String>,
    pub personality_preference: Option<Personality>,
}
