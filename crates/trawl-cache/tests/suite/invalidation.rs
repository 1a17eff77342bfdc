use std::sync::Arc;
use std::time::Duration;

use trawl_cache::{MetadataCache, MetadataError};

use super::support::{scheduler, write_binary, CountingLoader};

#[test]
fn changed_timestamp_triggers_a_fresh_load() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo\n", 0);

    let cache = MetadataCache::new(CountingLoader::default(), scheduler());
    let first = cache.get_metadata(&binary).unwrap();
    assert_eq!(first.types, vec!["Foo"]);

    write_binary(&binary, "Foo\nBar\n", 10);
    let second = cache.get_metadata(&binary).unwrap();
    assert_eq!(second.types, vec!["Foo", "Bar"]);
    assert_eq!(cache.loader().calls(), 2);

    // The superseded generation is gone; the current one is reused.
    let third = cache.get_metadata(&binary).unwrap();
    assert!(Arc::ptr_eq(&second, &third));
    assert_eq!(cache.resident_len(), 1);
}

#[test]
fn older_timestamps_also_invalidate() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "New", 10);

    let cache = MetadataCache::new(CountingLoader::default(), scheduler());
    assert_eq!(cache.get_metadata(&binary).unwrap().types, vec!["New"]);

    write_binary(&binary, "Restored", 0);
    assert_eq!(cache.get_metadata(&binary).unwrap().types, vec!["Restored"]);
    assert_eq!(cache.loader().calls(), 2);
}

#[test]
fn binaries_appearing_after_a_miss_are_loaded() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("Late.dll");

    let cache = MetadataCache::new(CountingLoader::default(), scheduler());
    assert!(matches!(
        cache.get_metadata(&binary),
        Err(MetadataError::NotFound { .. })
    ));

    write_binary(&binary, "Late", 0);
    assert_eq!(cache.get_metadata(&binary).unwrap().types, vec!["Late"]);
    assert_eq!(cache.loader().calls(), 1);
}

#[test]
fn rewrite_during_an_in_flight_load_supersedes_it() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Old\n", 0);

    let cache = Arc::new(MetadataCache::new(
        CountingLoader::with_delay(Duration::from_millis(200)),
        scheduler(),
    ));
    let slow = {
        let cache = cache.clone();
        let binary = binary.clone();
        std::thread::spawn(move || cache.get_metadata(&binary).unwrap())
    };
    while cache.loader().calls() == 0 {
        std::thread::sleep(Duration::from_millis(5));
    }

    write_binary(&binary, "New\n", 10);
    let current = cache.get_metadata(&binary).unwrap();
    assert_eq!(current.types, vec!["New"]);

    let superseded = slow.join().unwrap();
    assert!(!Arc::ptr_eq(&superseded, &current));
    assert_eq!(cache.loader().calls(), 2);

    // The late completion of the first load must not replace the newer generation.
    let later = cache.get_metadata(&binary).unwrap();
    assert!(Arc::ptr_eq(&later, &current));
    assert!(!Arc::ptr_eq(&later, &superseded));
    assert_eq!(cache.loader().calls(), 2);
    assert_eq!(cache.resident_len(), 1);
}
