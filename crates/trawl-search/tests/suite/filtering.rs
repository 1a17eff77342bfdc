use trawl_scheduler::CancellationToken;
use trawl_search::{SearchError, SearchScope};

use super::support::{symbol_named, FakeResolver, Fixture, Symbol};

#[test]
fn files_without_the_term_are_never_parsed() {
    let mut fx = Fixture::new(FakeResolver::default(), 2);
    fx.file("/src/A.cs", "Foo.Bar");
    fx.file("/src/B.cs", "Foo.Baz");
    fx.file("/src/C.cs", "class C {}");

    let prepared = fx.prepare(vec![symbol_named("Bar").with_search_term("Bar")]);
    let (outcome, found, _) = fx.run(&prepared, &CancellationToken::new());

    assert_eq!(found.len(), 1);
    assert_eq!(fx.resolver.parses(), 1);
    assert_eq!(outcome.stats().files_skipped_by_term, 2);
}

#[test]
fn term_hits_without_a_resolved_match_are_parsed_but_not_reported() {
    let mut fx = Fixture::new(FakeResolver::default(), 1);
    fx.file("/src/A.cs", "// Bar is mentioned here\nBarn.Open();");

    let prepared = fx.prepare(vec![symbol_named("Bar").with_search_term("Bar")]);
    let (outcome, found, progress) = fx.run(&prepared, &CancellationToken::new());

    assert!(found.is_empty());
    assert_eq!(fx.resolver.parses(), 1);
    assert_eq!(outcome.stats().files_with_matches, 0);
    assert_eq!(progress.fraction(), 1.0);
}

#[test]
fn occurrence_scans_resolve_at_each_occurrence() {
    let mut fx = Fixture::new(FakeResolver::default(), 1);
    fx.file(
        "/ui/Main.xaml",
        "<Button Click=\"Bar\" Tag=\"Barn\"/>\n<Label Content=\"Bar\"/>",
    );
    fx.file("/src/A.cs", "Foo.Bar");

    let scope = symbol_named("Bar")
        .with_extensions(["xaml"])
        .scanning_occurrences_of("Bar");
    let prepared = fx.prepare(vec![scope]);
    assert_eq!(prepared.work_amount(), 1);

    let (_, found, _) = fx.run(&prepared, &CancellationToken::new());
    assert_eq!(found.len(), 1);
    let offsets: Vec<u32> = found[0]
        .references()
        .iter()
        .map(|reference| reference.offset().into())
        .collect();
    // `Barn` contains the name but resolves to another symbol.
    assert_eq!(offsets, vec![15, 49]);
    assert!(found[0]
        .references()
        .iter()
        .all(|reference| u32::from(reference.length()) == 3));
}

#[test]
fn empty_terms_are_rejected_before_any_work() {
    let mut fx = Fixture::new(FakeResolver::default(), 1);
    fx.file("/src/A.cs", "Bar");

    let err = fx
        .finder
        .prepare(&fx.project, vec![symbol_named("Bar").with_search_term("")])
        .unwrap_err();
    assert_eq!(err, SearchError::EmptySearchTerm);

    let err = fx
        .finder
        .prepare(
            &fx.project,
            vec![SearchScope::new(|_: &Symbol| true).scanning_occurrences_of("")],
        )
        .unwrap_err();
    assert_eq!(err, SearchError::EmptyOccurrenceName);
    assert_eq!(fx.resolver.parses(), 0);
}
