use std::time::Duration;

use parking_lot::{Condvar, Mutex};
use tokio::sync::Notify;
use trawl_scheduler::{CancellationToken, Cancelled};

/// How often a blocked waiter re-checks its cancellation token.
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Write-once cell that both blocking threads and async tasks can wait on.
///
/// Exactly one producer completes the slot; every waiter observes that value.
pub(crate) struct LoadSlot<T> {
    value: Mutex<Option<T>>,
    ready: Condvar,
    notify: Notify,
}

impl<T: Clone> LoadSlot<T> {
    pub(crate) fn new() -> Self {
        Self {
            value: Mutex::new(None),
            ready: Condvar::new(),
            notify: Notify::new(),
        }
    }

    pub(crate) fn get(&self) -> Option<T> {
        self.value.lock().clone()
    }

    pub(crate) fn is_complete(&self) -> bool {
        self.value.lock().is_some()
    }

    /// Store `value` and wake all waiters. Returns `false` if the slot was already complete;
    /// the first value wins.
    pub(crate) fn complete(&self, value: T) -> bool {
        {
            let mut guard = self.value.lock();
            if guard.is_some() {
                return false;
            }
            *guard = Some(value);
        }
        self.ready.notify_all();
        self.notify.notify_waiters();
        true
    }

    /// Block until the slot is complete or `cancel` fires.
    pub(crate) fn wait(&self, cancel: Option<&CancellationToken>) -> Result<T, Cancelled> {
        let mut guard = self.value.lock();
        loop {
            if let Some(value) = guard.as_ref() {
                return Ok(value.clone());
            }
            match cancel {
                Some(token) => {
                    if token.is_cancelled() {
                        return Err(Cancelled);
                    }
                    self.ready.wait_for(&mut guard, CANCEL_POLL_INTERVAL);
                }
                None => self.ready.wait(&mut guard),
            }
        }
    }

    pub(crate) async fn wait_async(&self) -> T {
        loop {
            let notified = self.notify.notified();
            tokio::pin!(notified);
            // Register before checking so a completion between the check and the await is
            // not missed.
            notified.as_mut().enable();
            if let Some(value) = self.get() {
                return value;
            }
            notified.await;
        }
    }
}
