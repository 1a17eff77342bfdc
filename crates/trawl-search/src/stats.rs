use std::sync::atomic::{AtomicU64, Ordering};

/// Counters describing what a search did with its units of work.
///
/// Files that could not be read or failed to parse contribute no results; these counters make
/// that loss visible without changing what is delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SearchStats {
    pub units_completed: u64,
    pub files_unreadable: u64,
    pub files_skipped_by_term: u64,
    pub files_failed: u64,
    pub files_with_matches: u64,
    pub references_found: u64,
}

#[derive(Debug, Default)]
pub(crate) struct StatsCollector {
    units_completed: AtomicU64,
    files_unreadable: AtomicU64,
    files_skipped_by_term: AtomicU64,
    files_failed: AtomicU64,
    files_with_matches: AtomicU64,
    references_found: AtomicU64,
}

impl StatsCollector {
    pub(crate) fn unit_completed(&self) {
        self.units_completed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn file_unreadable(&self) {
        self.files_unreadable.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn file_skipped_by_term(&self) {
        self.files_skipped_by_term.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn file_failed(&self) {
        self.files_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn file_delivered(&self, references: usize) {
        self.files_with_matches.fetch_add(1, Ordering::Relaxed);
        self.references_found
            .fetch_add(references as u64, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> SearchStats {
        SearchStats {
            units_completed: self.units_completed.load(Ordering::Relaxed),
            files_unreadable: self.files_unreadable.load(Ordering::Relaxed),
            files_skipped_by_term: self.files_skipped_by_term.load(Ordering::Relaxed),
            files_failed: self.files_failed.load(Ordering::Relaxed),
            files_with_matches: self.files_with_matches.load(Ordering::Relaxed),
            references_found: self.references_found.load(Ordering::Relaxed),
        }
    }
}
