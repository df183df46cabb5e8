pub mod coach;
pub mod context;
pub mod domain;
pub mod phase;
pub mod ports;
pub mod threads;
pub mod wait;

#[cfg(any(test, feature = "test-util"))]
pub mod memory;

pub use coach::{CoachService, TurnOutcome};
pub use context::ContextBuilder;
pub use domain::{
    Event, EventDraft, Message, Personality, Phase, Profile, ProfileUpdate, Role, Session,
    SessionEntry, Thread, ThreadStatus,
};
pub use ports::{CompletionService, JournalStore, PortError, PortResult, PromptMessage};
pub use threads::{SessionEntryInput, ThreadManager};
pub use wait::CompletionWait;
