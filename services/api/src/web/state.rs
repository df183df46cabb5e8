//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::config::Config;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use writing_coach_core::{
    context::ContextBuilder,
    ports::{CompletionService, JournalStore},
    CoachService,
};

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<dyn JournalStore>,
    pub config: Arc<Config>,
    pub coach: Arc<CoachService>,
    /// Cancelled on shutdown; every completion wait hangs off a child of this token.
    pub shutdown: CancellationToken,
}

impl AppState {
    /// Wires the coach service from its collaborators.
    pub fn new(
        db: Arc<dyn JournalStore>,
        completion: Arc<dyn CompletionService>,
        config: Arc<Config>,
        shutdown: CancellationToken,
    ) -> Self {
        let coach = CoachService::new(
            db.clone(),
            completion,
            ContextBuilder::new(config.history_limit),
            config.completion_timeout,
        );
        Self {
            db,
            config,
            coach: Arc::new(coach),
            shutdown,
        }
    }
}
