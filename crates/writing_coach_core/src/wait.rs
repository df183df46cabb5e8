//! crates/writing_coach_core/src/wait.rs
//!
//! Bounded waiting on the completion service. A call is raced against a timeout
//! and a cancellation token; whichever finishes first decides the result.
//! Nothing is retried.

use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::ports::{PortError, PortResult};

pub const DEFAULT_COMPLETION_TIMEOUT: Duration = Duration::from_secs(60);

/// How long a completion may take, and the token that aborts the wait early.
#[derive(Debug, Clone)]
pub struct CompletionWait {
    pub timeout: Duration,
    pub cancel: CancellationToken,
}

impl CompletionWait {
    pub fn new(timeout: Duration, cancel: CancellationToken) -> Self {
        Self { timeout, cancel }
    }

    /// A wait tied to `parent`: cancelling the parent cancels this wait too.
    pub fn child_of(timeout: Duration, parent: &CancellationToken) -> Self {
        Self::new(timeout, parent.child_token())
    }
}

impl Default for CompletionWait {
    fn default() -> Self {
        Self::new(DEFAULT_COMPLETION_TIMEOUT, CancellationToken::new())
    }
}

/// Awaits `completion` within the bounds of `wait`.
///
/// Timing out or being cancelled drops the future; any work the remote service
/// already started continues on its side.
pub async fn await_completion<F, T>(completion: F, wait: &CompletionWait) -> PortResult<T>
where
    F: Future<Output = PortResult<T>>,
{
    tokio::select! {
        biased;
        _ = wait.cancel.cancelled() => {
            warn!("Completion request cancelled");
            Err(PortError::Upstream("the request was cancelled".to_string()))
        }
        outcome = tokio::time::timeout(wait.timeout, completion) => match outcome {
            Ok(result) => result,
            Err(_) => {
                warn!("Completion request timed out after {:?}", wait.timeout);
                Err(PortError::Upstream(format!(
                    "the coach did not respond within {} seconds",
                    wait.timeout.as_secs()
                )))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn passes_through_a_timely_result() {
        let result = await_completion(async { Ok::<_, PortError>(7) }, &CompletionWait::default()).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_completion_times_out_as_upstream_error() {
        let wait = CompletionWait::new(Duration::from_secs(1), CancellationToken::new());
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, PortError>("late")
        };
        let err = await_completion(slow, &wait).await.unwrap_err();
        assert!(matches!(err, PortError::Upstream(msg) if msg.contains("1 seconds")));
    }

    #[tokio::test]
    async fn cancelled_parent_aborts_the_wait() {
        let parent = CancellationToken::new();
        let wait = CompletionWait::child_of(Duration::from_secs(60), &parent);
        parent.cancel();
        let never = std::future::pending::<PortResult<()>>();
        let err = await_completion(never, &wait).await.unwrap_err();
        assert!(matches!(err, PortError::Upstream(_)));
    }

    #[tokio::test]
    async fn upstream_errors_are_not_retried_or_rewritten() {
        let failing = async { Err::<(), _>(PortError::Upstream("rate limited".to_string())) };
        let err = await_completion(failing, &CompletionWait::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Completion service failed: rate limited");
    }
}
