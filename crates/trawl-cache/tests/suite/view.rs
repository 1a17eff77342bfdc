use std::sync::Arc;

use trawl_cache::MetadataCache;

use super::support::{scheduler, write_binary, CountingLoader};

#[test]
fn view_pins_the_first_result_for_its_lifetime() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo", 0);

    let cache = MetadataCache::new(CountingLoader::default(), scheduler());
    let pinned = {
        let view = cache.view();
        let first = view.get_metadata(&binary).unwrap();

        write_binary(&binary, "Bar", 10);
        let second = view.get_metadata(&binary).unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(second.types, vec!["Foo"]);
        assert_eq!(cache.loader().calls(), 1);
        first
    };

    // Outside the view the change is observed again.
    let fresh = cache.get_metadata(&binary).unwrap();
    assert_eq!(fresh.types, vec!["Bar"]);
    assert!(!Arc::ptr_eq(&pinned, &fresh));
    assert_eq!(cache.loader().calls(), 2);
}

#[test]
fn view_reuses_entries_loaded_outside_it() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo", 0);

    let cache = MetadataCache::new(CountingLoader::default(), scheduler());
    let outside = cache.get_metadata(&binary).unwrap();

    let view = cache.view();
    let inside = view.get_metadata(&binary).unwrap();
    assert!(Arc::ptr_eq(&outside, &inside));
    assert_eq!(cache.loader().calls(), 1);
    assert_eq!(view.pinned_len(), 1);
}

#[test]
fn independent_views_do_not_share_pins() {
    let tmp = tempfile::tempdir().unwrap();
    let binary = tmp.path().join("A.dll");
    write_binary(&binary, "Foo", 0);

    let cache = MetadataCache::new(CountingLoader::default(), scheduler());
    let outer = cache.view();
    assert_eq!(outer.get_metadata(&binary).unwrap().types, vec!["Foo"]);

    write_binary(&binary, "Bar", 10);
    {
        let inner = cache.view();
        assert_eq!(inner.get_metadata(&binary).unwrap().types, vec!["Bar"]);
    }
    assert_eq!(outer.get_metadata(&binary).unwrap().types, vec!["Foo"]);
    assert_eq!(cache.loader().calls(), 2);
}
