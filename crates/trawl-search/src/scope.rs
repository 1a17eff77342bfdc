use std::fmt;
use std::sync::Arc;

use trawl_core::FileId;

use crate::error::SearchError;

/// Decides whether a resolution produced by the resolver is the symbol being searched for.
pub type SymbolPredicate<R> = Arc<dyn Fn(&R) -> bool + Send + Sync>;

/// Which of a project's files can possibly contain a match for a scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScopeRestriction {
    /// Every declared file.
    #[default]
    Unrestricted,
    /// Only the declaring file (for example a private member or a local).
    File(FileId),
    /// Files from which the namespace is reachable.
    Namespace(String),
}

/// How candidate files are turned into matches.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Parse the file and let the resolver traverse the syntax tree.
    #[default]
    SyntaxTree,
    /// Resolve at every ordinal occurrence of `name` in the text. For markup-like files
    /// where symbol uses are plain names rather than syntax nodes.
    Occurrences { name: String },
}

/// One search request: what to look for and how to narrow the files worth looking at.
///
/// Scopes are immutable once built.
pub struct SearchScope<R> {
    search_term: Option<String>,
    predicate: SymbolPredicate<R>,
    restriction: ScopeRestriction,
    extensions: Option<Vec<String>>,
    scan_mode: ScanMode,
}

impl<R> SearchScope<R> {
    pub fn new(predicate: impl Fn(&R) -> bool + Send + Sync + 'static) -> Self {
        Self {
            search_term: None,
            predicate: Arc::new(predicate),
            restriction: ScopeRestriction::Unrestricted,
            extensions: None,
            scan_mode: ScanMode::SyntaxTree,
        }
    }

    /// Substring every true match's source text contains. Files without it are skipped
    /// without being parsed.
    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn restricted_to(mut self, restriction: ScopeRestriction) -> Self {
        self.restriction = restriction;
        self
    }

    /// Only consider files with one of `extensions` (case-insensitive, leading dot optional).
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.extensions = Some(
            extensions
                .into_iter()
                .map(|ext| ext.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        );
        self
    }

    pub fn scanning_occurrences_of(mut self, name: impl Into<String>) -> Self {
        self.scan_mode = ScanMode::Occurrences { name: name.into() };
        self
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search_term.as_deref()
    }

    pub fn restriction(&self) -> &ScopeRestriction {
        &self.restriction
    }

    pub fn extensions(&self) -> Option<&[String]> {
        self.extensions.as_deref()
    }

    pub fn scan_mode(&self) -> &ScanMode {
        &self.scan_mode
    }

    /// Whether `resolution` is the symbol this scope looks for.
    #[inline]
    pub fn matches(&self, resolution: &R) -> bool {
        (self.predicate)(resolution)
    }

    /// Cheap ordinal pre-filter on a file's text.
    ///
    /// Conservative: `false` means the file cannot contain a match, `true` only means it
    /// might.
    pub fn may_contain_match(&self, text: &str) -> bool {
        if let Some(term) = &self.search_term {
            if !text.contains(term.as_str()) {
                return false;
            }
        }
        match &self.scan_mode {
            ScanMode::SyntaxTree => true,
            ScanMode::Occurrences { name } => text.contains(name.as_str()),
        }
    }

    pub fn accepts_extension(&self, file: &FileId) -> bool {
        let Some(allowed) = &self.extensions else {
            return true;
        };
        file.extension()
            .is_some_and(|ext| allowed.iter().any(|allowed| *allowed == ext))
    }

    pub(crate) fn validate(&self) -> Result<(), SearchError> {
        if self.search_term.as_deref() == Some("") {
            return Err(SearchError::EmptySearchTerm);
        }
        if let ScanMode::Occurrences { name } = &self.scan_mode {
            if name.is_empty() {
                return Err(SearchError::EmptyOccurrenceName);
            }
        }
        Ok(())
    }
}

impl<R> Clone for SearchScope<R> {
    fn clone(&self) -> Self {
        Self {
            search_term: self.search_term.clone(),
            predicate: self.predicate.clone(),
            restriction: self.restriction.clone(),
            extensions: self.extensions.clone(),
            scan_mode: self.scan_mode.clone(),
        }
    }
}

impl<R> fmt::Debug for SearchScope<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SearchScope")
            .field("search_term", &self.search_term)
            .field("restriction", &self.restriction)
            .field("extensions", &self.extensions)
            .field("scan_mode", &self.scan_mode)
            .finish_non_exhaustive()
    }
}
