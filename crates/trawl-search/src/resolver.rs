use trawl_core::{FileId, TextSize};
use trawl_scheduler::{CancellationToken, Cancelled};

use crate::error::ParseError;
use crate::model::MatchedNode;
use crate::scope::SearchScope;

/// The language front end: parses text and resolves syntax to symbols.
///
/// Called concurrently from every search worker, so implementations must be thread-safe.
pub trait SymbolResolver: Send + Sync {
    type Tree;
    /// Symbol-level meaning of a node. Handed to callers inside every
    /// [`crate::Reference`].
    type Resolution: Send + Sync + 'static;

    fn parse(&self, file: &FileId, text: &str) -> Result<Self::Tree, ParseError>;

    /// Report every node in `tree` that may refer to the scope's symbol, with its
    /// resolution. Reporting non-matching nodes is fine; the scope's predicate is applied to
    /// each report.
    ///
    /// Implementations should check `cancel` periodically and return `Err(Cancelled)` once it
    /// fires; everything reported for the file so far is then discarded.
    fn find_references_in_file(
        &self,
        scope: &SearchScope<Self::Resolution>,
        tree: &Self::Tree,
        text: &str,
        cancel: &CancellationToken,
        sink: &mut dyn FnMut(MatchedNode, Self::Resolution),
    ) -> Result<(), Cancelled>;

    /// Resolve whatever sits at byte `offset`.
    fn resolve_at(&self, tree: &Self::Tree, text: &str, offset: TextSize)
        -> Option<Self::Resolution>;
}
