use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use parking_lot::Mutex;
use rayon::prelude::*;
use trawl_core::{panic_payload_to_str, FileId, LineIndex, TextRange, TextSize};
use trawl_scheduler::{CancellationToken, Cancelled, Scheduler};

use crate::error::SearchError;
use crate::interesting::InterestingFileSet;
use crate::model::{
    LinePreviewBuilder, MatchedNode, PreviewBuilder, Reference, SearchedFile, SourceRegion,
};
use crate::progress::SearchProgress;
use crate::project::CompiledProject;
use crate::resolver::SymbolResolver;
use crate::scope::{ScanMode, SearchScope};
use crate::stats::{SearchStats, StatsCollector};
use crate::text::TextProvider;

const PROGRESS_TITLE: &str = "Finding references";

/// How a search ended. Cancellation is an outcome, not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Completed(SearchStats),
    Cancelled(SearchStats),
}

impl SearchOutcome {
    pub fn stats(&self) -> &SearchStats {
        match self {
            SearchOutcome::Completed(stats) | SearchOutcome::Cancelled(stats) => stats,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SearchOutcome::Cancelled(_))
    }
}

struct ScopeUnits<R> {
    scope: SearchScope<R>,
    files: Vec<FileId>,
}

/// Scopes with their candidate files, computed once before any file is searched.
pub struct PreparedSearch<R> {
    units: Vec<ScopeUnits<R>>,
    work_amount: usize,
}

impl<R> PreparedSearch<R> {
    /// Total units of work: the sum of candidate files over all scopes.
    pub fn work_amount(&self) -> usize {
        self.work_amount
    }

    pub fn scopes(&self) -> impl Iterator<Item = (&SearchScope<R>, &[FileId])> {
        self.units
            .iter()
            .map(|unit| (&unit.scope, unit.files.as_slice()))
    }
}

impl<R> Clone for PreparedSearch<R> {
    fn clone(&self) -> Self {
        Self {
            units: self
                .units
                .iter()
                .map(|unit| ScopeUnits {
                    scope: unit.scope.clone(),
                    files: unit.files.clone(),
                })
                .collect(),
            work_amount: self.work_amount,
        }
    }
}

impl<R> std::fmt::Debug for PreparedSearch<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedSearch")
            .field("scopes", &self.units.len())
            .field("work_amount", &self.work_amount)
            .finish()
    }
}

/// Finds every reference to a symbol across a project's files.
///
/// Files are searched in parallel on the scheduler's compute pool, so parallelism is bounded
/// by its size. Results stream to the caller's callback one [`SearchedFile`] at a time, in
/// completion order. Failures confined to a single file (unreadable text, parse errors,
/// panics in the resolver) are logged and counted; the file contributes no results and the
/// search continues.
pub struct ParallelReferenceFinder<S: SymbolResolver> {
    resolver: Arc<S>,
    text_provider: Arc<dyn TextProvider>,
    preview_builder: Arc<dyn PreviewBuilder>,
    scheduler: Scheduler,
}

impl<S: SymbolResolver> Clone for ParallelReferenceFinder<S> {
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            text_provider: self.text_provider.clone(),
            preview_builder: self.preview_builder.clone(),
            scheduler: self.scheduler.clone(),
        }
    }
}

impl<S: SymbolResolver> ParallelReferenceFinder<S> {
    pub fn new(
        resolver: Arc<S>,
        text_provider: Arc<dyn TextProvider>,
        scheduler: Scheduler,
    ) -> Self {
        Self {
            resolver,
            text_provider,
            preview_builder: Arc::new(LinePreviewBuilder),
            scheduler,
        }
    }

    pub fn with_preview_builder(mut self, preview_builder: Arc<dyn PreviewBuilder>) -> Self {
        self.preview_builder = preview_builder;
        self
    }

    pub fn resolver(&self) -> &S {
        &self.resolver
    }

    /// Validate `scopes` and compute their candidate files.
    ///
    /// Usage errors are reported here, before any file is read.
    pub fn prepare<P>(
        &self,
        project: &P,
        scopes: Vec<SearchScope<S::Resolution>>,
    ) -> Result<PreparedSearch<S::Resolution>, SearchError>
    where
        P: CompiledProject + ?Sized,
    {
        for scope in &scopes {
            scope.validate()?;
        }

        let units: Vec<_> = scopes
            .into_iter()
            .map(|scope| {
                let files = InterestingFileSet::compute(&scope, project);
                ScopeUnits { scope, files }
            })
            .collect();
        let work_amount = units.iter().map(|unit| unit.files.len()).sum();

        tracing::debug!(
            target: "trawl.search",
            scopes = units.len(),
            work_amount,
            "prepared reference search"
        );
        Ok(PreparedSearch { units, work_amount })
    }

    /// Run `prepared`, calling `on_file_found` for every file with at least one reference.
    ///
    /// Blocks until all units finish or `cancel` fires. Calls to `on_file_found` are
    /// serialized, and none happen once cancellation has been observed.
    pub fn find_references<F>(
        &self,
        prepared: &PreparedSearch<S::Resolution>,
        on_file_found: F,
        progress: &SearchProgress,
        cancel: &CancellationToken,
    ) -> SearchOutcome
    where
        F: FnMut(SearchedFile<S::Resolution>) + Send,
    {
        progress.begin(prepared.work_amount as u64);
        let stats = StatsCollector::default();
        let reporter = self.scheduler.progress().start(PROGRESS_TITLE);

        if cancel.is_cancelled() {
            reporter.finish_cancelled();
            return SearchOutcome::Cancelled(stats.snapshot());
        }

        let sink = Mutex::new(on_file_found);
        for unit in &prepared.units {
            if cancel.is_cancelled() {
                break;
            }
            self.scheduler.install_compute(|| {
                unit.files.par_iter().for_each(|file| {
                    if cancel.is_cancelled() {
                        return;
                    }
                    self.search_unit(&unit.scope, file, &sink, cancel, &stats);
                    stats.unit_completed();
                    reporter.report_fraction(progress.complete_unit());
                });
            });
        }

        let stats = stats.snapshot();
        if cancel.is_cancelled() {
            tracing::debug!(target: "trawl.search", ?stats, "reference search cancelled");
            reporter.finish_cancelled();
            SearchOutcome::Cancelled(stats)
        } else {
            tracing::debug!(target: "trawl.search", ?stats, "reference search finished");
            reporter.finish();
            SearchOutcome::Completed(stats)
        }
    }

    /// Run `prepared` on the compute pool and wait for it without blocking the async caller.
    ///
    /// Cancelling `cancel` stops the search early, but this still resolves only after the
    /// in-flight units have finished, so the returned stats are final.
    pub async fn find_references_async<F>(
        &self,
        prepared: PreparedSearch<S::Resolution>,
        on_file_found: F,
        progress: Arc<SearchProgress>,
        cancel: CancellationToken,
    ) -> Result<SearchOutcome, SearchError>
    where
        S: 'static,
        F: FnMut(SearchedFile<S::Resolution>) + Send + 'static,
    {
        let finder = self.clone();
        let task = self.scheduler.spawn_compute(move |_| {
            Ok::<_, Cancelled>(finder.find_references(&prepared, on_file_found, &progress, &cancel))
        });
        Ok(task.join_completion().await?)
    }

    /// One unit of work. Never panics and never delivers a partial file.
    fn search_unit<F>(
        &self,
        scope: &SearchScope<S::Resolution>,
        file: &FileId,
        sink: &Mutex<F>,
        cancel: &CancellationToken,
        stats: &StatsCollector,
    ) where
        F: FnMut(SearchedFile<S::Resolution>),
    {
        let result = std::panic::catch_unwind(AssertUnwindSafe(|| {
            let Some(searched) = self.references_in_file(scope, file, cancel, stats) else {
                return;
            };
            let mut on_file_found = sink.lock();
            // Checked under the lock: nothing is delivered after cancellation is observed.
            if cancel.is_cancelled() {
                return;
            }
            stats.file_delivered(searched.references().len());
            (*on_file_found)(searched);
        }));

        if let Err(panic) = result {
            stats.file_failed();
            tracing::error!(
                target: "trawl.search",
                file = %file,
                panic = %panic_payload_to_str(&*panic),
                "reference search panicked on file"
            );
        }
    }

    fn references_in_file(
        &self,
        scope: &SearchScope<S::Resolution>,
        file: &FileId,
        cancel: &CancellationToken,
        stats: &StatsCollector,
    ) -> Option<SearchedFile<S::Resolution>> {
        let Some(text) = self.text_provider.text(file) else {
            tracing::debug!(target: "trawl.search", file = %file, "file text unavailable; skipping");
            stats.file_unreadable();
            return None;
        };

        if !scope.may_contain_match(&text) {
            stats.file_skipped_by_term();
            return None;
        }

        let tree = match self.resolver.parse(file, &text) {
            Ok(tree) => tree,
            Err(err) => {
                tracing::warn!(
                    target: "trawl.search",
                    file = %file,
                    error = %err,
                    "failed to parse file"
                );
                stats.file_failed();
                return None;
            }
        };

        let line_index = LineIndex::new(&text);
        let mut references = Vec::new();
        let scanned = match scope.scan_mode() {
            ScanMode::SyntaxTree => {
                let mut sink = |node: MatchedNode, resolution: S::Resolution| {
                    if scope.matches(&resolution) {
                        references.push(self.reference(
                            file,
                            &text,
                            &line_index,
                            node.reference_range(),
                            resolution,
                        ));
                    }
                };
                self.resolver
                    .find_references_in_file(scope, &tree, &text, cancel, &mut sink)
            }
            ScanMode::Occurrences { name } => self.scan_occurrences(
                scope,
                name,
                file,
                &tree,
                &text,
                &line_index,
                cancel,
                &mut references,
            ),
        };

        if scanned.is_err() {
            tracing::debug!(target: "trawl.search", file = %file, "file search cancelled");
            return None;
        }
        if references.is_empty() {
            return None;
        }
        Some(SearchedFile::new(file.clone(), references))
    }

    /// Resolve at each ordinal, non-overlapping occurrence of `name` in `text`.
    #[allow(clippy::too_many_arguments)]
    fn scan_occurrences(
        &self,
        scope: &SearchScope<S::Resolution>,
        name: &str,
        file: &FileId,
        tree: &S::Tree,
        text: &str,
        line_index: &LineIndex,
        cancel: &CancellationToken,
        references: &mut Vec<Reference<S::Resolution>>,
    ) -> Result<(), Cancelled> {
        let probe = name_midpoint(name);
        for (start, _) in text.match_indices(name) {
            trawl_scheduler::check_cancelled(cancel)?;
            let Some(resolution) = self
                .resolver
                .resolve_at(tree, text, TextSize::from((start + probe) as u32))
            else {
                continue;
            };
            if scope.matches(&resolution) {
                let range = TextRange::at(
                    TextSize::from(start as u32),
                    TextSize::from(name.len() as u32),
                );
                references.push(self.reference(file, text, line_index, range, resolution));
            }
        }
        Ok(())
    }

    fn reference(
        &self,
        file: &FileId,
        text: &str,
        line_index: &LineIndex,
        range: TextRange,
        resolution: S::Resolution,
    ) -> Reference<S::Resolution> {
        let region = SourceRegion {
            file: file.clone(),
            range: line_index.range(text, range),
        };
        let preview = self.preview_builder.build(file, text, line_index, range);
        Reference::new(region, resolution, range.start(), range.len(), preview)
    }
}

/// Byte offset of the middle of `name`, on a char boundary.
fn name_midpoint(name: &str) -> usize {
    let mut mid = name.len() / 2;
    while !name.is_char_boundary(mid) {
        mid -= 1;
    }
    mid
}

impl<S: SymbolResolver> std::fmt::Debug for ParallelReferenceFinder<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParallelReferenceFinder")
            .field("parallelism", &self.scheduler.compute_parallelism())
            .finish_non_exhaustive()
    }
}
