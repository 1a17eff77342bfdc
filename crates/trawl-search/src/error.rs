use trawl_scheduler::TaskError;

/// Failures that prevent a search from starting or finishing as a whole.
///
/// Per-file problems (unreadable text, parse failures, resolver panics) never surface here;
/// they are logged and counted in [`crate::SearchStats`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SearchError {
    #[error("search term must not be empty")]
    EmptySearchTerm,

    #[error("occurrence scan requires a non-empty name")]
    EmptyOccurrenceName,

    #[error("search task failed: {0}")]
    Task(#[from] TaskError),
}

/// The resolver could not turn a file's text into a syntax tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
