//! Parallel symbol reference search.
//!
//! A search runs in two phases:
//! 1. [`ParallelReferenceFinder::prepare`] validates the [`SearchScope`]s and narrows the
//!    project to candidate files with [`InterestingFileSet`]. The number of candidates is the
//!    search's work amount.
//! 2. [`ParallelReferenceFinder::find_references`] fans out over the candidates on a bounded
//!    worker pool. Each file is read, pre-filtered by the scope's search term, parsed and
//!    resolved. Files with matches are streamed to the caller as [`SearchedFile`]s while
//!    [`SearchProgress`] advances by one unit per file.
//!
//! The language front end, file contents and project model are collaborators behind the
//! [`SymbolResolver`], [`TextProvider`] and [`CompiledProject`] traits.

mod error;
mod finder;
mod interesting;
mod model;
mod progress;
mod project;
mod resolver;
mod scope;
mod stats;
mod text;

pub use error::{ParseError, SearchError};
pub use finder::{ParallelReferenceFinder, PreparedSearch, SearchOutcome};
pub use interesting::InterestingFileSet;
pub use model::{
    LinePreviewBuilder, MatchedNode, Preview, PreviewBuilder, Reference, SearchedFile,
    SourceRegion,
};
pub use progress::SearchProgress;
pub use project::{CompiledProject, DirectoryProject, InMemoryProject};
pub use resolver::SymbolResolver;
pub use scope::{ScanMode, ScopeRestriction, SearchScope, SymbolPredicate};
pub use stats::SearchStats;
pub use text::{FsTextProvider, InMemoryTextProvider, LayeredTextProvider, TextProvider};
