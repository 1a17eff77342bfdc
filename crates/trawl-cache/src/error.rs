use std::path::PathBuf;
use std::sync::Arc;

pub type Result<T> = std::result::Result<T, CacheError>;

/// Errors produced by cache directory management and persistence.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("failed to determine home directory for default cache path")]
    MissingHomeDir,

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("bincode error: {0}")]
    Bincode(#[from] bincode::Error),

    #[error("cache file {path} is truncated")]
    Truncated { path: PathBuf },

    #[error("failed to persist cache file: {0}")]
    Persist(#[from] tempfile::PersistError),
}

/// A failed metadata load, shared by every caller waiting on the same entry.
///
/// Loads are recorded as results, so the failure is stored in the resident entry and handed
/// out as often as the entry is requested. It is cheap to clone for that reason.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MetadataError {
    #[error("binary {path} does not exist")]
    NotFound { path: PathBuf },

    #[error("failed to read binary {path}: {message}")]
    Io { path: PathBuf, message: Arc<str> },

    #[error("failed to parse binary {path}: {message}")]
    Parse { path: PathBuf, message: Arc<str> },

    #[error("metadata loader panicked while loading {path}")]
    LoaderPanicked { path: PathBuf },

    /// The caller stopped waiting; the load itself keeps running for other callers.
    #[error("wait for metadata cancelled")]
    Cancelled,
}

impl MetadataError {
    pub fn parse(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::Parse {
            path: path.into(),
            message: message.to_string().into(),
        }
    }

    pub fn io(path: impl Into<PathBuf>, err: &std::io::Error) -> Self {
        let path = path.into();
        if err.kind() == std::io::ErrorKind::NotFound {
            return Self::NotFound { path };
        }
        Self::Io {
            path,
            message: err.to_string().into(),
        }
    }
}
