//! Worker pools, cooperative cancellation and progress reporting.
//!
//! CPU-bound work (parsing, resolving) runs on a bounded rayon pool sized to the available
//! hardware concurrency. Fire-and-forget work that must not compete with it (cache writes)
//! runs on a small background pool. Cancellation is cooperative: tasks receive a
//! [`CancellationToken`] and are expected to check it between units of work.

mod progress;
mod scheduler;
mod task;

pub use progress::{Progress, ProgressEvent, ProgressId, ProgressReceiver, ProgressSender};
pub use scheduler::{PoolKind, Scheduler, SchedulerConfig};
pub use task::BlockingTask;
pub use tokio_util::sync::CancellationToken;

/// Marker returned by work that stopped because its token was cancelled.
///
/// Cancellation is an expected outcome, not a failure, so this carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, thiserror::Error)]
#[error("operation cancelled")]
pub struct Cancelled;

/// Returns `Err(Cancelled)` once `token` has been cancelled.
#[inline]
pub fn check_cancelled(token: &CancellationToken) -> Result<(), Cancelled> {
    if token.is_cancelled() {
        Err(Cancelled)
    } else {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TaskError {
    #[error("task cancelled")]
    Cancelled,
    #[error("task panicked")]
    Panicked,
}

impl From<Cancelled> for TaskError {
    fn from(_: Cancelled) -> Self {
        TaskError::Cancelled
    }
}
