use std::collections::HashMap;
use std::io;
use std::sync::Arc;

use parking_lot::RwLock;
use trawl_core::FileId;

/// Source of file contents for a search.
///
/// `None` means the text is unavailable (deleted, unreadable, not text); the file is then
/// skipped without failing the search.
pub trait TextProvider: Send + Sync {
    fn text(&self, file: &FileId) -> Option<Arc<str>>;
}

/// Reads file contents straight from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsTextProvider;

impl TextProvider for FsTextProvider {
    fn text(&self, file: &FileId) -> Option<Arc<str>> {
        match std::fs::read_to_string(file.path()) {
            Ok(text) => Some(text.into()),
            Err(err) => {
                if err.kind() != io::ErrorKind::NotFound {
                    tracing::debug!(
                        target: "trawl.search",
                        file = %file,
                        error = %err,
                        "failed to read file"
                    );
                }
                None
            }
        }
    }
}

/// Text snapshots held in memory, typically the editor's open (possibly unsaved) buffers.
#[derive(Debug, Default)]
pub struct InMemoryTextProvider {
    files: RwLock<HashMap<FileId, Arc<str>>>,
}

impl InMemoryTextProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, file: impl Into<FileId>, text: impl Into<Arc<str>>) {
        self.files.write().insert(file.into(), text.into());
    }

    pub fn remove(&self, file: &FileId) -> Option<Arc<str>> {
        self.files.write().remove(file)
    }
}

impl TextProvider for InMemoryTextProvider {
    fn text(&self, file: &FileId) -> Option<Arc<str>> {
        self.files.read().get(file).cloned()
    }
}

/// Overlay: `primary` wins, `fallback` fills the gaps. Lets open buffers shadow the disk.
#[derive(Debug)]
pub struct LayeredTextProvider<P, F> {
    primary: P,
    fallback: F,
}

impl<P, F> LayeredTextProvider<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }
}

impl<P: TextProvider, F: TextProvider> TextProvider for LayeredTextProvider<P, F> {
    fn text(&self, file: &FileId) -> Option<Arc<str>> {
        self.primary
            .text(file)
            .or_else(|| self.fallback.text(file))
    }
}
