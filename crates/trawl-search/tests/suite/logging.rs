use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;
use trawl_scheduler::CancellationToken;
use trawl_search::SearchOutcome;

use super::support::{symbol_named, FakeResolver, Fixture};

/// Records the target of every event it sees.
#[derive(Clone, Default)]
struct TargetRecorder(Arc<Mutex<Vec<String>>>);

impl<S: Subscriber> Layer<S> for TargetRecorder {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        self.0.lock().push(event.metadata().target().to_string());
    }
}

#[test]
fn search_events_use_the_trawl_search_target() {
    let mut fx = Fixture::new(FakeResolver::default(), 1);
    fx.file("/src/Main.cs", "Bar");

    let recorder = TargetRecorder::default();
    let subscriber = tracing_subscriber::registry().with(recorder.clone());
    let outcome = tracing::subscriber::with_default(subscriber, || {
        let prepared = fx.prepare(vec![symbol_named("Bar")]);
        fx.run(&prepared, &CancellationToken::new()).0
    });
    assert!(matches!(outcome, SearchOutcome::Completed(_)));

    let targets = recorder.0.lock().clone();
    assert!(targets.iter().any(|target| target == "trawl.search"), "{targets:?}");
    assert!(
        targets.iter().all(|target| !target.starts_with("trawl_search")),
        "{targets:?}"
    );
}
