use crate::error::CacheError;
use bincode::Options;
use serde::{Deserialize, Serialize};
use std::io::{self, Write};
use std::path::Path;

/// Hard upper bound for any cache file we will attempt to read and deserialize.
///
/// A corrupted length prefix must degrade to a cache miss, not an enormous allocation.
pub const BINCODE_PAYLOAD_LIMIT_BYTES: usize = 256 * 1024 * 1024;

pub(crate) fn bincode_options() -> impl bincode::Options + Copy {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .with_little_endian()
}

pub(crate) fn bincode_serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>, CacheError> {
    Ok(bincode_options().serialize(value)?)
}

pub(crate) fn bincode_deserialize<T: for<'de> Deserialize<'de>>(
    bytes: &[u8],
) -> Result<T, CacheError> {
    Ok(bincode_options()
        .with_limit(BINCODE_PAYLOAD_LIMIT_BYTES as u64)
        .deserialize(bytes)?)
}

/// Read a cache file, treating anything unexpected as a miss.
pub(crate) fn read_file_limited(path: &Path) -> Option<Vec<u8>> {
    // Do not follow symlinks out of the cache directory.
    let meta = match std::fs::symlink_metadata(path) {
        Ok(meta) => meta,
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::debug!(
                    target: "trawl.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to stat cache file"
                );
            }
            return None;
        }
    };
    if meta.file_type().is_symlink() || !meta.is_file() {
        remove_file_best_effort(path, "read_file_limited.invalid_type");
        return None;
    }
    if meta.len() > BINCODE_PAYLOAD_LIMIT_BYTES as u64 {
        remove_file_best_effort(path, "read_file_limited.oversize");
        return None;
    }

    match std::fs::read(path) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            if err.kind() != io::ErrorKind::NotFound {
                tracing::warn!(
                    target: "trawl.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to read cache file"
                );
            }
            None
        }
    }
}

pub(crate) fn remove_file_best_effort(path: &Path, reason: &'static str) -> bool {
    match std::fs::remove_file(path) {
        Ok(()) => true,
        Err(err) if err.kind() == io::ErrorKind::NotFound => true,
        Err(err) => {
            tracing::debug!(
                target: "trawl.cache",
                path = %path.display(),
                reason,
                error = %err,
                "failed to remove cache file"
            );
            false
        }
    }
}

/// Replace `path` with `chunks` written in order.
///
/// The bytes go to a temporary file in the same directory which is then renamed over the
/// destination, so readers only ever observe the old or the new file in full.
pub fn atomic_write(path: &Path, chunks: &[&[u8]]) -> Result<(), CacheError> {
    let Some(parent) = path.parent() else {
        return Err(io::Error::other("path has no parent").into());
    };
    let parent = if parent.as_os_str().is_empty() {
        Path::new(".")
    } else {
        parent
    };
    std::fs::create_dir_all(parent)?;

    let mut tmp = tempfile::Builder::new()
        .prefix(".trawl-")
        .suffix(".tmp")
        .tempfile_in(parent)?;
    for chunk in chunks {
        tmp.write_all(chunk)?;
    }
    tmp.as_file().sync_all()?;
    // Dropping a `NamedTempFile` that failed to persist removes it.
    tmp.persist(path)?;
    Ok(())
}
