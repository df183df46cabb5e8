//! crates/writing_coach_core/src/coach.rs
//!
//! One conversation turn with the writing coach: compose the prompt, wait for the
//! completion service, run the phase state machine, persist the exchange and
//! rotate the thread when the phase advances.

use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use uuid::Uuid;

use crate::context::ContextBuilder;
use crate::domain::{Event, Message, Phase, Role, Thread};
use crate::phase::{self, PhaseOutcome};
use crate::ports::{CompletionService, JournalStore, PortError, PortResult};
use crate::threads::ThreadManager;
use crate::wait::{await_completion, CompletionWait};

/// The result of one turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// Assistant text with markers stripped, plus any transition announcement.
    pub reply: String,
    /// Phase after the turn.
    pub phase: Phase,
    pub advanced: bool,
    /// The thread the exchange was recorded on.
    pub thread_id: Uuid,
    /// The thread the next turn will use; differs from `thread_id` after a rotation.
    pub active_thread: Thread,
}

pub struct CoachService {
    store: Arc<dyn JournalStore>,
    completion: Arc<dyn CompletionService>,
    context: ContextBuilder,
    threads: ThreadManager,
    timeout: Duration,
}

impl CoachService {
    pub fn new(
        store: Arc<dyn JournalStore>,
        completion: Arc<dyn CompletionService>,
        context: ContextBuilder,
        timeout: Duration,
    ) -> Self {
        Self {
            threads: ThreadManager::new(store.clone()),
            store,
            completion,
            context,
            timeout,
        }
    }

    pub fn threads(&self) -> &ThreadManager {
        &self.threads
    }

    /// Loads an event, treating events owned by someone else as missing.
    pub async fn owned_event(&self, user_id: Uuid, event_id: Uuid) -> PortResult<Event> {
        let event = self.store.get_event(event_id).await?;
        if event.user_id != user_id {
            return Err(PortError::NotFound(format!("Event {} not found", event_id)));
        }
        Ok(event)
    }

    /// Runs one turn for `user_id`, optionally scoped to one of their events.
    pub async fn respond(
        &self,
        user_id: Uuid,
        event_id: Option<Uuid>,
        message: &str,
        cancel: &CancellationToken,
    ) -> PortResult<TurnOutcome> {
        let message = message.trim();
        if message.is_empty() {
            return Err(PortError::Invalid("message must not be empty".to_string()));
        }

        let event = match event_id {
            Some(id) => Some(self.owned_event(user_id, id).await?),
            None => None,
        };

        let thread = self
            .threads
            .get_or_create_active_thread(user_id, event.as_ref())
            .await?;
        let current = event
            .as_ref()
            .map(|e| e.current_phase)
            .unwrap_or(thread.writing_phase);

        let profile = self.store.get_or_create_profile(user_id).await?;
        let prompt = self
            .context
            .build(self.store.as_ref(), &profile, event.as_ref(), current, message)
            .await?;

        let wait = CompletionWait::child_of(self.timeout, cancel);
        let raw = await_completion(self.completion.complete(&prompt), &wait).await?;

        // Without an event there is nothing to carry the phase, so never advance.
        let outcome = if event.is_some() {
            phase::advance_if_complete(&raw, current)
        } else {
            PhaseOutcome {
                phase: current,
                advanced: false,
                text: phase::strip_markers(&raw),
            }
        };

        self.store
            .record_exchange(
                Message::new(&thread, Role::User, current, message),
                Message::new(&thread, Role::Assistant, current, phase::strip_markers(&raw)),
                Utc::now(),
            )
            .await?;

        let (outcome, active_thread) = match (&event, outcome.advanced) {
            (Some(event), true) => {
                self.apply_advance(event, &thread, current, outcome, &raw)
                    .await?
            }
            _ => (outcome, thread.clone()),
        };

        Ok(TurnOutcome {
            reply: outcome.text,
            phase: outcome.phase,
            advanced: outcome.advanced,
            thread_id: thread.id,
            active_thread,
        })
    }

    /// Persists a phase advance and rotates the thread. The phase only moves if
    /// the event is still where this turn found it; otherwise a concurrent turn
    /// already advanced it and this reply is returned without the announcement.
    async fn apply_advance(
        &self,
        event: &Event,
        thread: &Thread,
        current: Phase,
        outcome: PhaseOutcome,
        raw: &str,
    ) -> PortResult<(PhaseOutcome, Thread)> {
        if self
            .store
            .advance_event_phase(event.id, current, outcome.phase)
            .await?
        {
            info!(
                "Event {} advanced from {} to {}",
                event.id, current, outcome.phase
            );
            let successor = self
                .threads
                .rotate_on_phase_advance(thread, outcome.phase)
                .await?;
            return Ok((outcome, successor));
        }

        let fresh = self.store.get_event(event.id).await?;
        warn!(
            "Event {} left {} while a turn was in flight; keeping it at {}",
            event.id, current, fresh.current_phase
        );
        let active = self
            .threads
            .get_or_create_active_thread(thread.user_id, Some(&fresh))
            .await?;
        Ok((
            PhaseOutcome {
                phase: fresh.current_phase,
                advanced: false,
                text: phase::strip_markers(raw),
            },
            active,
        ))
    }

    /// Explicitly begins a fresh writing session for one of the user's events.
    pub async fn start_session(&self, user_id: Uuid, event_id: Uuid) -> PortResult<Thread> {
        let event = self.owned_event(user_id, event_id).await?;
        self.threads.start_new_thread(user_id, &event).await
    }
}
