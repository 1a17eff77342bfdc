use std::sync::Arc;

use parking_lot::Mutex;
use trawl_scheduler::{CancellationToken, Scheduler, SchedulerConfig};
use trawl_search::{
    DirectoryProject, FsTextProvider, ParallelReferenceFinder, SearchOutcome, SearchProgress,
};

use super::support::{symbol_named, FakeResolver};

#[test]
fn searches_files_on_disk_and_tolerates_deletions() {
    let tmp = tempfile::tempdir().unwrap();
    let src = tmp.path().join("src");
    std::fs::create_dir_all(&src).unwrap();
    std::fs::write(src.join("A.cs"), "Foo.Bar").unwrap();
    std::fs::write(src.join("B.cs"), "Bar.Baz").unwrap();
    std::fs::write(src.join("Deleted.cs"), "Bar").unwrap();
    std::fs::write(src.join("notes.txt"), "Bar").unwrap();

    let project = DirectoryProject::scan(tmp.path(), &["cs"]).unwrap();
    let finder = ParallelReferenceFinder::new(
        Arc::new(FakeResolver::default()),
        Arc::new(FsTextProvider),
        Scheduler::new(SchedulerConfig::with_compute_threads(2)),
    );
    let prepared = finder
        .prepare(&project, vec![symbol_named("Bar").with_search_term("Bar")])
        .unwrap();
    assert_eq!(prepared.work_amount(), 3);

    std::fs::remove_file(src.join("Deleted.cs")).unwrap();

    let found = Mutex::new(Vec::new());
    let progress = SearchProgress::new();
    let outcome = finder.find_references(
        &prepared,
        |file| found.lock().push(file),
        &progress,
        &CancellationToken::new(),
    );

    let SearchOutcome::Completed(stats) = outcome else {
        panic!("search was cancelled");
    };
    assert_eq!(stats.files_unreadable, 1);
    assert_eq!(found.lock().len(), 2);
    assert_eq!(progress.fraction(), 1.0);
}
