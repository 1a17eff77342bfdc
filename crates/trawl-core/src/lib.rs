//! Core shared types for trawl.
//!
//! This crate is intentionally small: file identities, text coordinates and a couple of
//! helpers shared by the search and cache crates.

mod fs;
mod text;

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use fs::{collect_files_with_extension, modified_time, system_time_to_nanos};
pub use text::{LineCol, LineIndex, Position, Range, TextRange, TextSize};

/// Version string baked into persisted artifacts.
pub const TRAWL_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Identity of a source file taking part in a search.
///
/// The path is stored in a simplified form (no `\\?\` verbatim prefix on Windows) so the
/// same file reached through different spellings compares equal.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(PathBuf);

impl FileId {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self(dunce::simplified(path.as_ref()).to_path_buf())
    }

    #[inline]
    pub fn path(&self) -> &Path {
        &self.0
    }

    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        self.0
            .extension()
            .map(|ext| ext.to_string_lossy().to_ascii_lowercase())
    }
}

impl fmt::Debug for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FileId({})", self.0.display())
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.display().fmt(f)
    }
}

impl From<PathBuf> for FileId {
    fn from(value: PathBuf) -> Self {
        Self::new(value)
    }
}

impl From<&Path> for FileId {
    fn from(value: &Path) -> Self {
        Self::new(value)
    }
}

impl From<&str> for FileId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl AsRef<Path> for FileId {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

/// Best-effort conversion of a `catch_unwind` payload into a printable message.
pub fn panic_payload_to_str(payload: &(dyn std::any::Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}
