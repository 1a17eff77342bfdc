use std::sync::atomic::{AtomicU64, Ordering};

/// Fractional progress of one search, shared by all of its workers.
///
/// Every unit of work (one scope/file pair) adds exactly one completed unit, whether or not
/// it produced results. The fraction is `completed / total`, so a run where every unit
/// finishes ends at exactly `1.0`. A search with no work stays at `0.0`.
#[derive(Debug, Default)]
pub struct SearchProgress {
    total: AtomicU64,
    completed: AtomicU64,
}

impl SearchProgress {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn begin(&self, total: u64) {
        self.completed.store(0, Ordering::SeqCst);
        self.total.store(total, Ordering::SeqCst);
    }

    /// Record one finished unit and return the new fraction.
    pub(crate) fn complete_unit(&self) -> f64 {
        let total = self.total.load(Ordering::SeqCst);
        let completed = self
            .completed
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |done| {
                (done < total).then_some(done + 1)
            })
            .map_or(total, |previous| previous + 1);
        fraction(completed, total)
    }

    pub fn total_units(&self) -> u64 {
        self.total.load(Ordering::SeqCst)
    }

    pub fn completed_units(&self) -> u64 {
        self.completed.load(Ordering::SeqCst)
    }

    /// Completed fraction in `[0, 1]`.
    pub fn fraction(&self) -> f64 {
        fraction(self.completed_units(), self.total_units())
    }

    /// Whether every unit of a non-empty search has completed.
    pub fn is_complete(&self) -> bool {
        let total = self.total_units();
        total > 0 && self.completed_units() >= total
    }
}

fn fraction(completed: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (completed as f64 / total as f64).min(1.0)
}
