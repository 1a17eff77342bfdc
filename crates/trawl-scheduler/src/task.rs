use tokio::sync::oneshot;

use crate::{CancellationToken, TaskError};

type Outcome<T> = Result<T, TaskError>;

/// Handle to a job on one of the scheduler's pools.
///
/// Dropping the handle detaches the job; it still runs to completion.
pub struct BlockingTask<T> {
    token: CancellationToken,
    rx: oneshot::Receiver<Outcome<T>>,
}

impl<T> BlockingTask<T> {
    pub(crate) fn new(token: CancellationToken, rx: oneshot::Receiver<Outcome<T>>) -> Self {
        Self { token, rx }
    }

    /// Ask the job to stop. It observes this through its token.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    /// Wait for the job, giving up with [`TaskError::Cancelled`] as soon as the token fires.
    pub async fn join(self) -> Outcome<T> {
        let Self { token, rx } = self;
        tokio::select! {
            biased;
            _ = token.cancelled() => Err(TaskError::Cancelled),
            received = rx => flatten(received),
        }
    }

    /// Wait for the job to return, even if its token is cancelled meanwhile.
    ///
    /// For jobs that report cancellation through their own result.
    pub async fn join_completion(self) -> Outcome<T> {
        flatten(self.rx.await)
    }

    /// Blocking [`BlockingTask::join_completion`]. Must not run on the job's own pool.
    pub fn wait(self) -> Outcome<T> {
        flatten(self.rx.blocking_recv())
    }
}

/// A dropped sender means the job never reported, which only happens when it unwound past
/// the panic guard.
fn flatten<T>(received: Result<Outcome<T>, oneshot::error::RecvError>) -> Outcome<T> {
    received.unwrap_or(Err(TaskError::Panicked))
}
