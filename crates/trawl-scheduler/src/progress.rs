use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::broadcast;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgressId(pub u64);

/// Lifecycle of one reported operation, as seen by subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Begin { id: ProgressId, title: String },
    /// Whole percentage in `0..=100`, strictly increasing per operation.
    Report { id: ProgressId, percentage: u32 },
    End { id: ProgressId, cancelled: bool },
}

pub type ProgressReceiver = broadcast::Receiver<ProgressEvent>;

/// Starts operations on the scheduler's progress channel.
#[derive(Clone)]
pub struct ProgressSender {
    tx: broadcast::Sender<ProgressEvent>,
    next_id: Arc<AtomicU64>,
}

impl ProgressSender {
    pub(crate) fn new(tx: broadcast::Sender<ProgressEvent>) -> Self {
        Self {
            tx,
            next_id: Arc::new(AtomicU64::new(1)),
        }
    }

    pub fn subscribe(&self) -> ProgressReceiver {
        self.tx.subscribe()
    }

    pub fn start(&self, title: impl Into<String>) -> Progress {
        let id = ProgressId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let _ = self.tx.send(ProgressEvent::Begin {
            id,
            title: title.into(),
        });
        Progress {
            state: Arc::new(OperationState {
                id,
                tx: self.tx.clone(),
                reported: Mutex::new(Reported::default()),
            }),
        }
    }
}

/// Handle to one running operation. Clones share it; the operation ends when `finish` is
/// called or the last clone is dropped.
#[derive(Clone)]
pub struct Progress {
    state: Arc<OperationState>,
}

struct OperationState {
    id: ProgressId,
    tx: broadcast::Sender<ProgressEvent>,
    /// Held while sending, so events leave in the order their checks passed.
    reported: Mutex<Reported>,
}

#[derive(Default)]
struct Reported {
    percentage: u32,
    ended: bool,
}

impl OperationState {
    fn end(&self, cancelled: bool) {
        let mut reported = self.reported.lock();
        if !reported.ended {
            reported.ended = true;
            let _ = self.tx.send(ProgressEvent::End {
                id: self.id,
                cancelled,
            });
        }
    }
}

impl Drop for OperationState {
    fn drop(&mut self) {
        self.end(false);
    }
}

impl Progress {
    pub fn id(&self) -> ProgressId {
        self.state.id
    }

    /// Report a completed fraction in `[0, 1]`.
    ///
    /// Emits only when the whole percentage grows, so every worker can call this after every
    /// unit.
    pub fn report_fraction(&self, fraction: f64) {
        let percentage = (fraction.clamp(0.0, 1.0) * 100.0).floor() as u32;
        let mut reported = self.state.reported.lock();
        if reported.ended || percentage <= reported.percentage {
            return;
        }
        reported.percentage = percentage;
        let _ = self.state.tx.send(ProgressEvent::Report {
            id: self.state.id,
            percentage,
        });
    }

    pub fn finish(&self) {
        self.state.end(false);
    }

    pub fn finish_cancelled(&self) {
        self.state.end(true);
    }
}
