use std::fmt;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::error::{CacheError, Result};
use crate::util::{atomic_write, read_file_limited, remove_file_best_effort};

/// Size of the timestamp header at the start of every cache file.
pub const TIMESTAMP_HEADER_LEN: usize = 8;

/// Longest file-stem suffix kept in a cache file name.
const MAX_STEM_CHARS: usize = 32;

/// Address of one binary's persisted metadata inside a [`CacheStore`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct CacheKey {
    file_name: String,
}

impl CacheKey {
    /// Key for the binary at `path`.
    ///
    /// The name is `<stem>.<hash>.dat`: the last 32 characters of the file stem keep names
    /// readable, and 8 hex digits of a SHA-256 over the upper-cased full path keep binaries
    /// with the same stem in different directories apart. The hash is deterministic across
    /// processes and runs.
    pub fn for_binary(path: &Path) -> Self {
        let stem = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let skip = stem.chars().count().saturating_sub(MAX_STEM_CHARS);
        let stem: String = stem.chars().skip(skip).collect();

        let mut hasher = Sha256::new();
        hasher.update(path.to_string_lossy().to_uppercase().as_bytes());
        let digest = hex::encode(hasher.finalize());

        Self {
            file_name: format!("{stem}.{}.dat", &digest[..8]),
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.file_name)
    }
}

/// A persisted entry: the binary's modification stamp plus an opaque payload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredEntry {
    pub timestamp: u64,
    pub payload: Vec<u8>,
}

/// Persistence backend for serialized metadata.
///
/// Implementations must replace entries as a whole: a reader may observe the previous entry
/// or the new one, never a mix.
pub trait CacheStore: Send + Sync + fmt::Debug {
    /// Read the entry for `key`. `Ok(None)` is a plain miss.
    fn read(&self, key: &CacheKey) -> Result<Option<StoredEntry>>;

    fn write(&self, key: &CacheKey, timestamp: u64, payload: &[u8]) -> Result<()>;

    /// Drop an entry that turned out to be unusable.
    fn discard(&self, key: &CacheKey);
}

/// [`CacheStore`] writing one file per key into a directory.
///
/// File layout: an 8-byte little-endian timestamp header followed by the payload.
#[derive(Clone, Debug)]
pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, key: &CacheKey) -> PathBuf {
        self.root.join(key.file_name())
    }
}

impl CacheStore for DiskCacheStore {
    fn read(&self, key: &CacheKey) -> Result<Option<StoredEntry>> {
        let path = self.path_for(key);
        let Some(mut bytes) = read_file_limited(&path) else {
            return Ok(None);
        };
        if bytes.len() < TIMESTAMP_HEADER_LEN {
            remove_file_best_effort(&path, "disk_store.truncated");
            return Err(CacheError::Truncated { path });
        }

        let mut header = [0u8; TIMESTAMP_HEADER_LEN];
        header.copy_from_slice(&bytes[..TIMESTAMP_HEADER_LEN]);
        let payload = bytes.split_off(TIMESTAMP_HEADER_LEN);
        Ok(Some(StoredEntry {
            timestamp: u64::from_le_bytes(header),
            payload,
        }))
    }

    fn write(&self, key: &CacheKey, timestamp: u64, payload: &[u8]) -> Result<()> {
        let path = self.path_for(key);
        tracing::debug!(target: "trawl.cache", path = %path.display(), "writing cache file");
        atomic_write(&path, &[&timestamp.to_le_bytes(), payload])
    }

    fn discard(&self, key: &CacheKey) {
        remove_file_best_effort(&self.path_for(key), "disk_store.discard");
    }
}
