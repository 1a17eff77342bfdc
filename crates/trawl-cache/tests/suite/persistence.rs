use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use trawl_cache::{
    CacheError, CacheKey, CacheStore, DiskCacheStore, MetadataCache, StoredEntry,
    TIMESTAMP_HEADER_LEN,
};
use trawl_core::{modified_time, system_time_to_nanos};

use super::support::{scheduler, write_binary, BinaryMetadata, CountingLoader};

fn disk_cache(root: &std::path::Path) -> MetadataCache<CountingLoader> {
    MetadataCache::with_store(
        CountingLoader::default(),
        Arc::new(DiskCacheStore::new(root)),
        scheduler(),
    )
}

#[test]
fn metadata_round_trips_without_reparsing() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_dir = tmp.path().join("cache");
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo\nBar\n", 0);

    let first_run = disk_cache(&cache_dir);
    let m1 = first_run.get_metadata(&binary).unwrap();
    first_run.wait_for_pending_writes();
    assert_eq!(first_run.loader().calls(), 1);

    let second_run = disk_cache(&cache_dir);
    let m2 = second_run.get_metadata(&binary).unwrap();
    assert_eq!(*m1, *m2);
    assert_eq!(second_run.loader().calls(), 0);
}

#[test]
fn cache_file_starts_with_the_binary_timestamp() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_dir = tmp.path().join("cache");
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo", 0);

    let cache = disk_cache(&cache_dir);
    cache.get_metadata(&binary).unwrap();
    cache.wait_for_pending_writes();

    let file = cache_dir.join(CacheKey::for_binary(&binary).file_name());
    let bytes = std::fs::read(file).unwrap();
    let mut header = [0u8; TIMESTAMP_HEADER_LEN];
    header.copy_from_slice(&bytes[..TIMESTAMP_HEADER_LEN]);

    let mtime = modified_time(&binary).unwrap().unwrap();
    assert_eq!(u64::from_le_bytes(header), system_time_to_nanos(mtime));
}

#[test]
fn stale_cache_entries_are_misses() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_dir = tmp.path().join("cache");
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Old", 0);

    let first_run = disk_cache(&cache_dir);
    first_run.get_metadata(&binary).unwrap();
    first_run.wait_for_pending_writes();

    write_binary(&binary, "New", 10);
    let second_run = disk_cache(&cache_dir);
    assert_eq!(
        *second_run.get_metadata(&binary).unwrap(),
        BinaryMetadata {
            types: vec!["New".to_string()]
        }
    );
    assert_eq!(second_run.loader().calls(), 1);
    second_run.wait_for_pending_writes();

    // The fresh parse replaced the stale entry.
    let third_run = disk_cache(&cache_dir);
    assert_eq!(third_run.get_metadata(&binary).unwrap().types, vec!["New"]);
    assert_eq!(third_run.loader().calls(), 0);
}

#[test]
fn corrupt_cache_entries_are_misses_and_get_replaced() {
    let tmp = tempfile::tempdir().unwrap();
    let cache_dir = tmp.path().join("cache");
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo", 0);

    let store = DiskCacheStore::new(&cache_dir);
    let key = CacheKey::for_binary(&binary);
    let mtime = modified_time(&binary).unwrap().unwrap();
    store
        .write(&key, system_time_to_nanos(mtime), b"\xffnot bincode")
        .unwrap();

    let cache = disk_cache(&cache_dir);
    assert_eq!(cache.get_metadata(&binary).unwrap().types, vec!["Foo"]);
    assert_eq!(cache.loader().calls(), 1);
    cache.wait_for_pending_writes();

    let next_run = disk_cache(&cache_dir);
    assert_eq!(next_run.get_metadata(&binary).unwrap().types, vec!["Foo"]);
    assert_eq!(next_run.loader().calls(), 0);
}

#[derive(Debug, Default)]
struct BrokenStore {
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl CacheStore for BrokenStore {
    fn read(&self, _key: &CacheKey) -> trawl_cache::Result<Option<StoredEntry>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Io(io::Error::other("disk on fire")))
    }

    fn write(&self, _key: &CacheKey, _timestamp: u64, _payload: &[u8]) -> trawl_cache::Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        Err(CacheError::Io(io::Error::other("disk on fire")))
    }

    fn discard(&self, _key: &CacheKey) {}
}

#[test]
fn store_failures_never_fail_the_load() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo", 0);

    let store = Arc::new(BrokenStore::default());
    let cache = MetadataCache::with_store(CountingLoader::default(), store.clone(), scheduler());
    assert_eq!(cache.get_metadata(&binary).unwrap().types, vec!["Foo"]);
    cache.wait_for_pending_writes();

    assert_eq!(store.reads.load(Ordering::SeqCst), 1);
    assert_eq!(store.writes.load(Ordering::SeqCst), 1);
}

#[test]
fn caches_without_a_store_persist_nothing() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo", 0);

    let cache = MetadataCache::new(CountingLoader::default(), scheduler());
    cache.get_metadata(&binary).unwrap();
    cache.wait_for_pending_writes();

    let entries: Vec<_> = std::fs::read_dir(tmp.path()).unwrap().collect();
    assert_eq!(entries.len(), 1);
}

#[test]
fn disk_cache_honors_the_configured_root() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo", 0);

    let config = trawl_cache::CacheConfig {
        cache_root_override: Some(tmp.path().join("root")),
    };
    let cache =
        MetadataCache::with_disk_cache(CountingLoader::default(), &config, scheduler()).unwrap();
    cache.get_metadata(&binary).unwrap();
    cache.wait_for_pending_writes();

    let expected = tmp
        .path()
        .join("root")
        .join("metadata")
        .join(CacheKey::for_binary(&binary).file_name());
    assert!(expected.is_file());
}
