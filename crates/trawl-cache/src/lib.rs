//! Metadata cache for binary dependencies.
//!
//! Parsing a referenced binary is expensive, so its metadata is kept resident in memory and
//! persisted to disk between sessions:
//! - [`MetadataCache`] holds one entry per binary path, invalidated by the file's modification
//!   time, with single-flight loading for concurrent callers
//! - [`CacheView`] is the scoped fast path that skips repeated timestamp checks
//! - [`CacheStore`] is the persistence seam; [`DiskCacheStore`] is the file-backed store
//!
//! ## On-disk layout
//!
//! Entries live under `<cache_root>/metadata/` (see [`metadata_cache_dir`]):
//! - `<stem>.<hash>.dat`, named by [`CacheKey::for_binary`]
//! - an 8-byte little-endian header with the binary's mtime in nanoseconds since the epoch
//! - a `bincode` envelope gated by [`METADATA_CACHE_SCHEMA_VERSION`], the loader's schema
//!   version and the crate version

mod cache_dir;
mod error;
mod metadata_cache;
mod slot;
mod store;
mod util;

pub use cache_dir::{metadata_cache_dir, CacheConfig, TRAWL_CACHE_DIR_ENV_VAR};
pub use error::{CacheError, MetadataError, Result};
pub use metadata_cache::{
    CacheView, MetadataCache, MetadataLoader, MetadataResult, METADATA_CACHE_SCHEMA_VERSION,
};
pub use store::{CacheKey, CacheStore, DiskCacheStore, StoredEntry, TIMESTAMP_HEADER_LEN};
pub use util::{atomic_write, BINCODE_PAYLOAD_LIMIT_BYTES};
