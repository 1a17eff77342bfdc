use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::{Condvar, Mutex};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use trawl_core::{modified_time, panic_payload_to_str, system_time_to_nanos, FileId, TRAWL_VERSION};
use trawl_scheduler::{CancellationToken, Cancelled, Scheduler};

use crate::cache_dir::{metadata_cache_dir, CacheConfig};
use crate::error::{CacheError, MetadataError};
use crate::slot::LoadSlot;
use crate::store::{CacheKey, CacheStore, DiskCacheStore};
use crate::util::{bincode_deserialize, bincode_serialize};

/// Bumped whenever the persisted envelope layout changes.
pub const METADATA_CACHE_SCHEMA_VERSION: u32 = 1;

/// Outcome of a metadata request. Both arms are shared by every caller of the same entry.
pub type MetadataResult<M> = Result<Arc<M>, MetadataError>;

/// Parses a binary dependency into metadata. This is the expensive step the cache exists to
/// avoid repeating.
pub trait MetadataLoader: Send + Sync + 'static {
    type Metadata: Serialize + DeserializeOwned + Send + Sync + 'static;

    fn load(&self, path: &Path) -> Result<Self::Metadata, MetadataError>;

    /// Version of the loader's output format. Persisted entries written with another version
    /// are ignored.
    fn schema_version(&self) -> u32 {
        1
    }
}

#[derive(Serialize)]
struct PersistedMetadataRef<'a, M> {
    schema_version: u32,
    loader_schema_version: u32,
    trawl_version: &'a str,
    path: &'a str,
    metadata: &'a M,
}

#[derive(Deserialize)]
struct PersistedMetadata<M> {
    schema_version: u32,
    loader_schema_version: u32,
    trawl_version: String,
    path: String,
    metadata: M,
}

/// One (path, timestamp) generation of a binary's metadata.
struct LoadedEntry<M> {
    modified: Option<SystemTime>,
    slot: LoadSlot<MetadataResult<M>>,
}

impl<M> LoadedEntry<M> {
    fn new(modified: Option<SystemTime>) -> Self {
        Self {
            modified,
            slot: LoadSlot::new(),
        }
    }
}

#[derive(Default)]
struct PendingWrites {
    count: Mutex<usize>,
    idle: Condvar,
}

impl PendingWrites {
    fn begin(self: &Arc<Self>) -> PendingWriteGuard {
        *self.count.lock() += 1;
        PendingWriteGuard(self.clone())
    }

    fn wait_idle(&self) {
        let mut count = self.count.lock();
        while *count > 0 {
            self.idle.wait(&mut count);
        }
    }
}

struct PendingWriteGuard(Arc<PendingWrites>);

impl Drop for PendingWriteGuard {
    fn drop(&mut self) {
        let mut count = self.0.count.lock();
        *count = count.saturating_sub(1);
        if *count == 0 {
            self.0.idle.notify_all();
        }
    }
}

/// Process-wide cache of parsed binary metadata.
///
/// Entries are keyed by path and validated against the file's modification time on every
/// request. A changed timestamp installs a fresh entry; the previous one is superseded, never
/// mutated. Concurrent requests for the same (path, timestamp) share a single load.
///
/// Entries are never evicted. The map is bounded by the number of distinct binaries a
/// session references, and a result vanishing under memory pressure would be observable.
///
/// Clones share the same entries.
pub struct MetadataCache<L: MetadataLoader> {
    inner: Arc<CacheInner<L>>,
}

impl<L: MetadataLoader> Clone for MetadataCache<L> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<L: MetadataLoader> fmt::Debug for MetadataCache<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetadataCache")
            .field("entries", &self.inner.entries.lock().len())
            .field("store", &self.inner.store)
            .finish()
    }
}

struct CacheInner<L: MetadataLoader> {
    loader: L,
    store: Option<Arc<dyn CacheStore>>,
    scheduler: Scheduler,
    entries: Mutex<HashMap<FileId, Arc<LoadedEntry<L::Metadata>>>>,
    pending_writes: Arc<PendingWrites>,
}

impl<L: MetadataLoader> MetadataCache<L> {
    /// In-memory cache only: misses always run the loader and nothing is persisted.
    pub fn new(loader: L, scheduler: Scheduler) -> Self {
        Self::build(loader, None, scheduler)
    }

    pub fn with_store(loader: L, store: Arc<dyn CacheStore>, scheduler: Scheduler) -> Self {
        Self::build(loader, Some(store), scheduler)
    }

    /// Cache persisting into the metadata directory selected by `config`.
    pub fn with_disk_cache(
        loader: L,
        config: &CacheConfig,
        scheduler: Scheduler,
    ) -> Result<Self, CacheError> {
        let dir = metadata_cache_dir(config)?;
        Ok(Self::with_store(
            loader,
            Arc::new(DiskCacheStore::new(dir)),
            scheduler,
        ))
    }

    fn build(loader: L, store: Option<Arc<dyn CacheStore>>, scheduler: Scheduler) -> Self {
        Self {
            inner: Arc::new(CacheInner {
                loader,
                store,
                scheduler,
                entries: Mutex::new(HashMap::new()),
                pending_writes: Arc::default(),
            }),
        }
    }

    pub fn loader(&self) -> &L {
        &self.inner.loader
    }

    /// Metadata for the binary at `path`, loading it if the resident entry is missing or
    /// stale. Blocks until the load finishes.
    pub fn get_metadata(&self, path: impl AsRef<Path>) -> MetadataResult<L::Metadata> {
        let path = path.as_ref();
        let (entry, is_new) = self.inner.entry_for(path);
        self.inner.resolve(&entry, is_new, path, None)
    }

    /// Like [`MetadataCache::get_metadata`], but stops waiting with
    /// [`MetadataError::Cancelled`] once `cancel` fires.
    ///
    /// Only the wait is cancelled. A load this call started still runs to completion on the
    /// calling thread, and a load started by another caller keeps running for its waiters.
    pub fn get_metadata_with_cancel(
        &self,
        path: impl AsRef<Path>,
        cancel: &CancellationToken,
    ) -> MetadataResult<L::Metadata> {
        let path = path.as_ref();
        let (entry, is_new) = self.inner.entry_for(path);
        self.inner.resolve(&entry, is_new, path, Some(cancel))
    }

    pub async fn get_metadata_async(&self, path: impl AsRef<Path>) -> MetadataResult<L::Metadata> {
        let path = path.as_ref();
        let (entry, is_new) = self.inner.entry_for(path);
        if is_new {
            let inner = self.inner.clone();
            let loading = entry.clone();
            let path = path.to_path_buf();
            // Background pool: compute workers may be blocked waiting on this very entry.
            // The handle is dropped; completion is observed through the entry's slot.
            drop(self.inner.scheduler.spawn_background(move |_| {
                let _ = inner.run_load(&loading, &path);
                Ok(())
            }));
        }
        entry.slot.wait_async().await
    }

    /// Open a scoped view that checks each binary's timestamp only once.
    pub fn view(&self) -> CacheView<'_, L> {
        CacheView {
            cache: self,
            pinned: RefCell::new(HashMap::new()),
        }
    }

    /// Block until every background cache write started so far has finished.
    pub fn wait_for_pending_writes(&self) {
        self.inner.pending_writes.wait_idle();
    }

    /// Number of entries whose load has completed, successfully or not.
    pub fn resident_len(&self) -> usize {
        self.inner
            .entries
            .lock()
            .values()
            .filter(|entry| entry.slot.is_complete())
            .count()
    }
}

impl<L: MetadataLoader> CacheInner<L> {
    /// Current entry for `path`, installing a fresh one when none exists or the recorded
    /// timestamp no longer matches. The lookup, comparison and installation happen under one
    /// lock, so exactly one caller sees `is_new` for a given generation.
    fn entry_for(&self, path: &Path) -> (Arc<LoadedEntry<L::Metadata>>, bool) {
        let modified = match modified_time(path) {
            Ok(modified) => modified,
            Err(err) => {
                tracing::debug!(
                    target: "trawl.cache",
                    path = %path.display(),
                    error = %err,
                    "failed to stat binary"
                );
                None
            }
        };

        let key = FileId::new(path);
        let mut entries = self.entries.lock();
        if let Some(existing) = entries.get(&key) {
            if existing.modified == modified {
                return (existing.clone(), false);
            }
            tracing::debug!(
                target: "trawl.cache",
                path = %path.display(),
                "binary changed on disk; superseding cached metadata"
            );
        }
        let entry = Arc::new(LoadedEntry::new(modified));
        entries.insert(key, entry.clone());
        (entry, true)
    }

    fn resolve(
        &self,
        entry: &LoadedEntry<L::Metadata>,
        is_new: bool,
        path: &Path,
        cancel: Option<&CancellationToken>,
    ) -> MetadataResult<L::Metadata> {
        if is_new {
            return self.run_load(entry, path);
        }
        match entry.slot.wait(cancel) {
            Ok(result) => result,
            Err(Cancelled) => Err(MetadataError::Cancelled),
        }
    }

    /// Load `path` and complete `entry` with the outcome. Always completes the entry, even if
    /// the loader panics, so waiters never hang.
    fn run_load(
        &self,
        entry: &LoadedEntry<L::Metadata>,
        path: &Path,
    ) -> MetadataResult<L::Metadata> {
        let result = match std::panic::catch_unwind(AssertUnwindSafe(|| self.load(path))) {
            Ok(result) => result,
            Err(panic) => {
                tracing::error!(
                    target: "trawl.cache",
                    path = %path.display(),
                    panic = %panic_payload_to_str(&*panic),
                    "metadata loader panicked"
                );
                Err(MetadataError::LoaderPanicked {
                    path: path.to_path_buf(),
                })
            }
        };

        match &result {
            Ok(_) => {}
            Err(err @ MetadataError::NotFound { .. }) => {
                tracing::debug!(target: "trawl.cache", error = %err, "binary missing");
            }
            Err(err) => {
                tracing::warn!(target: "trawl.cache", error = %err, "failed to load metadata");
            }
        }

        entry.slot.complete(result.clone());
        result
    }

    fn load(&self, path: &Path) -> MetadataResult<L::Metadata> {
        let modified = match modified_time(path) {
            Ok(Some(modified)) => modified,
            Ok(None) => {
                return Err(MetadataError::NotFound {
                    path: path.to_path_buf(),
                })
            }
            Err(err) => return Err(MetadataError::io(path, &err)),
        };
        let timestamp = system_time_to_nanos(modified);
        let persisted = self
            .store
            .as_ref()
            .map(|store| (store.clone(), CacheKey::for_binary(path)));

        if let Some((store, key)) = &persisted {
            if let Some(metadata) = self.try_read_from_cache(store.as_ref(), key, path, timestamp) {
                return Ok(Arc::new(metadata));
            }
        }

        let metadata = Arc::new(self.loader.load(path)?);

        if let Some((store, key)) = persisted {
            self.save_to_cache_async(store, key, path, timestamp, metadata.clone());
        }
        Ok(metadata)
    }

    fn try_read_from_cache(
        &self,
        store: &dyn CacheStore,
        key: &CacheKey,
        path: &Path,
        timestamp: u64,
    ) -> Option<L::Metadata> {
        let stored = match store.read(key) {
            Ok(Some(stored)) => stored,
            Ok(None) => return None,
            Err(err) => {
                tracing::warn!(
                    target: "trawl.cache",
                    path = %path.display(),
                    key = %key,
                    error = %err,
                    "failed to read metadata cache entry"
                );
                return None;
            }
        };

        if stored.timestamp != timestamp {
            tracing::debug!(
                target: "trawl.cache",
                path = %path.display(),
                key = %key,
                "timestamp mismatch; ignoring cached metadata"
            );
            return None;
        }

        let persisted: PersistedMetadata<L::Metadata> = match bincode_deserialize(&stored.payload)
        {
            Ok(persisted) => persisted,
            Err(err) => {
                tracing::warn!(
                    target: "trawl.cache",
                    path = %path.display(),
                    key = %key,
                    error = %err,
                    "failed to decode cached metadata"
                );
                store.discard(key);
                return None;
            }
        };

        if persisted.schema_version != METADATA_CACHE_SCHEMA_VERSION
            || persisted.loader_schema_version != self.loader.schema_version()
            || persisted.trawl_version != TRAWL_VERSION
        {
            tracing::debug!(
                target: "trawl.cache",
                path = %path.display(),
                key = %key,
                "cached metadata written by another version"
            );
            return None;
        }

        // Different paths may share a key when their hashes collide.
        if persisted.path != path.to_string_lossy() {
            tracing::debug!(
                target: "trawl.cache",
                path = %path.display(),
                cached_path = %persisted.path,
                "cache key collision"
            );
            return None;
        }

        Some(persisted.metadata)
    }

    fn save_to_cache_async(
        &self,
        store: Arc<dyn CacheStore>,
        key: CacheKey,
        path: &Path,
        timestamp: u64,
        metadata: Arc<L::Metadata>,
    ) {
        let guard = self.pending_writes.begin();
        let path: PathBuf = path.to_path_buf();
        let loader_schema_version = self.loader.schema_version();
        drop(self.scheduler.spawn_background(move |_| {
            let _guard = guard;
            let path_text = path.to_string_lossy();
            let envelope = PersistedMetadataRef {
                schema_version: METADATA_CACHE_SCHEMA_VERSION,
                loader_schema_version,
                trawl_version: TRAWL_VERSION,
                path: &path_text,
                metadata: &*metadata,
            };
            let written =
                bincode_serialize(&envelope).and_then(|bytes| store.write(&key, timestamp, &bytes));
            if let Err(err) = written {
                tracing::warn!(
                    target: "trawl.cache",
                    path = %path.display(),
                    key = %key,
                    error = %err,
                    "failed to persist metadata"
                );
            }
            Ok::<(), Cancelled>(())
        }));
    }

    /// Forget completed entries whose binary no longer exists.
    fn prune_missing_binaries(&self) {
        let candidates: Vec<(FileId, Arc<LoadedEntry<L::Metadata>>)> = self
            .entries
            .lock()
            .iter()
            .filter(|(_, entry)| entry.slot.is_complete())
            .map(|(file, entry)| (file.clone(), entry.clone()))
            .collect();

        let missing: Vec<_> = candidates
            .into_iter()
            .filter(|(file, _)| matches!(modified_time(file.path()), Ok(None)))
            .collect();
        if missing.is_empty() {
            return;
        }

        let mut entries = self.entries.lock();
        for (file, entry) in missing {
            // Only drop the generation we inspected; a newer one may have been installed.
            if entries
                .get(&file)
                .is_some_and(|current| Arc::ptr_eq(current, &entry))
            {
                entries.remove(&file);
                tracing::debug!(
                    target: "trawl.cache",
                    path = %file,
                    "dropped metadata for deleted binary"
                );
            }
        }
    }
}

/// Scoped, caller-owned view over a [`MetadataCache`].
///
/// The first request for a path inside the view goes through the cache as usual. Later
/// requests for the same path return that first result without checking the file's
/// timestamp again, even if the binary changes while the view is alive. Meant for one
/// bounded, single-threaded pass (for example analyzing a whole project); pass the view down
/// the call chain instead of the cache.
///
/// Dropping the view prunes cache entries for binaries that have since been deleted.
pub struct CacheView<'a, L: MetadataLoader> {
    cache: &'a MetadataCache<L>,
    pinned: RefCell<HashMap<FileId, Arc<LoadedEntry<L::Metadata>>>>,
}

impl<L: MetadataLoader> CacheView<'_, L> {
    pub fn get_metadata(&self, path: impl AsRef<Path>) -> MetadataResult<L::Metadata> {
        let path = path.as_ref();
        let key = FileId::new(path);

        let pinned = self.pinned.borrow().get(&key).cloned();
        if let Some(entry) = pinned {
            return self.cache.inner.resolve(&entry, false, path, None);
        }

        let (entry, is_new) = self.cache.inner.entry_for(path);
        self.pinned.borrow_mut().insert(key, entry.clone());
        self.cache.inner.resolve(&entry, is_new, path, None)
    }

    /// Number of distinct binaries requested through this view.
    pub fn pinned_len(&self) -> usize {
        self.pinned.borrow().len()
    }
}

impl<L: MetadataLoader> fmt::Debug for CacheView<'_, L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheView")
            .field("pinned", &self.pinned.borrow().len())
            .finish()
    }
}

impl<L: MetadataLoader> Drop for CacheView<'_, L> {
    fn drop(&mut self) {
        self.pinned.get_mut().clear();
        self.cache.inner.prune_missing_binaries();
    }
}
