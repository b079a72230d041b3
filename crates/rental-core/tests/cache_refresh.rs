//! Refresh behaviour of the inventory cache against an in-memory wiki.

mod support;

use std::sync::Arc;
use std::thread;

use rental_core::cache::{InventoryCache, Watermark};
use rental_core::model::Namespace;
use rental_core::InventoryError;

use support::{FakeWiki, ManualClock, NS, at, item_record, record};

fn cache_over(wiki: &Arc<FakeWiki>, clock: &Arc<ManualClock>) -> InventoryCache {
    InventoryCache::with_clock(
        Arc::clone(wiki) as _,
        Namespace::new(NS),
        Arc::clone(clock) as _,
    )
}

fn seeded_wiki() -> Arc<FakeWiki> {
    let wiki = Arc::new(FakeWiki::new());
    wiki.seed("lab:ausstattung:001", item_record("Laptop Dell", "verfügbar", &["Laptop"]));
    wiki.seed("lab:ausstattung:002", item_record("Beamer Epson", "entliehen", &["Beamer"]));
    wiki.seed(
        "lab:ausstattung:042",
        item_record("Kamera Sony", "verfügbar", &["Kamera", "Stativ"]),
    );
    wiki.seed("lab:ausstattung:readme", record(&[("Name", "Übersicht")]));
    wiki.seed("lab:ausstattung:archiv:007", item_record("Alt", "verloren", &["PC"]));
    wiki.seed("lab:sonstiges:001", item_record("Fremd", "verfügbar", &["PC"]));
    wiki
}

#[test]
fn rebuild_then_get_returns_every_listed_item() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);

    let watermark = cache.rebuild_all().expect("rebuild");

    assert_eq!(watermark, Watermark::new(at(0)));
    for uid in [1, 2, 42] {
        assert!(cache.get(uid).is_some(), "uid {uid} missing after rebuild");
    }
    assert_eq!(cache.len(), 3);
    assert_eq!(wiki.fetch_count("lab:ausstattung:readme"), 0);
    assert_eq!(wiki.fetch_count("lab:ausstattung:archiv:007"), 0);
    assert_eq!(wiki.fetch_count("lab:sonstiges:001"), 0);
}

#[test]
fn page_id_suffix_is_the_uid() {
    let wiki = Arc::new(FakeWiki::new());
    wiki.seed("lab:ausstattung:042", item_record("Kamera Sony", "verfügbar", &["Kamera"]));
    wiki.seed("lab:ausstattung:readme", record(&[("Name", "Übersicht")]));
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);

    cache.rebuild_all().expect("non-item pages are skipped, not errors");

    let raw = cache.get(42).expect("uid 42");
    assert_eq!(raw["Name"].to_string(), "Kamera Sony");
    assert_eq!(cache.len(), 1);
}

#[test]
fn pages_vanishing_between_list_and_fetch_are_skipped() {
    let wiki = seeded_wiki();
    wiki.vanish_on_fetch("lab:ausstattung:002");
    wiki.seed("lab:ausstattung:003", record(&[]));
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);

    cache.rebuild_all().expect("rebuild");

    assert!(cache.get(2).is_none());
    assert!(cache.get(3).is_none(), "page without record is not an item");
    assert!(cache.get(1).is_some());
    assert!(cache.get(42).is_some());
}

#[test]
fn failing_page_does_not_fail_rebuild() {
    let wiki = seeded_wiki();
    wiki.fail_page("lab:ausstattung:001");
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);

    cache.rebuild_all().expect("best effort rebuild");

    assert!(cache.get(1).is_none());
    assert_eq!(cache.len(), 2);
}

#[test]
fn refresh_without_watermark_equals_rebuild() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(0)));

    let rebuilt = cache_over(&wiki, &clock);
    let refreshed = cache_over(&wiki, &clock);

    let w1 = rebuilt.rebuild_all().expect("rebuild");
    let w2 = refreshed.refresh_since(None).expect("refresh");

    assert_eq!(w1, w2);
    assert_eq!(*rebuilt.snapshot(), *refreshed.snapshot());
}

#[test]
fn incremental_refresh_refetches_only_changed_items() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);
    let since = cache.rebuild_all().expect("rebuild");

    wiki.edit(
        "lab:ausstattung:002",
        item_record("Beamer Epson", "verfügbar", &["Beamer"]),
        at(5),
    );
    wiki.edit("lab:ausstattung:readme", record(&[("Name", "neu")]), at(6));
    wiki.edit("lab:sonstiges:009", item_record("Fremd", "verfügbar", &["PC"]), at(7));
    clock.set(at(10));

    let watermark = cache.refresh_since(Some(since)).expect("refresh");

    assert_eq!(watermark, Watermark::new(at(10)));
    assert_eq!(cache.watermark(), Some(watermark));
    assert_eq!(wiki.fetch_count("lab:ausstattung:001"), 1);
    assert_eq!(wiki.fetch_count("lab:ausstattung:002"), 2);
    assert_eq!(wiki.fetch_count("lab:ausstattung:readme"), 0);
    assert_eq!(wiki.fetch_count("lab:sonstiges:009"), 0);
    assert_eq!(
        cache.get(2).expect("uid 2")["Status_devicestat"].to_string(),
        "verfügbar"
    );
    assert!(cache.get(9).is_none());
}

#[test]
fn new_pages_appear_and_deleted_pages_disappear() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);
    cache.rebuild_all().expect("rebuild");

    wiki.edit("lab:ausstattung:100", item_record("Tablet", "verfügbar", &["Tablet"]), at(3));
    wiki.delete("lab:ausstattung:002", at(4));
    clock.set(at(5));

    cache.refresh().expect("refresh");

    assert!(cache.get(100).is_some());
    assert!(cache.get(2).is_none());
    assert_eq!(cache.len(), 3);
}

#[test]
fn listing_failure_leaves_cache_and_watermark_untouched() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);
    cache.rebuild_all().expect("rebuild");
    let before = cache.snapshot();

    wiki.edit("lab:ausstattung:001", item_record("neu", "defekt", &["Laptop"]), at(2));
    wiki.set_listing_down(true);
    clock.set(at(5));

    let err = cache.refresh().expect_err("feed down");
    assert!(matches!(err, InventoryError::UpstreamUnavailable(_)));
    assert_eq!(*cache.snapshot(), *before);

    let err = cache.rebuild_all().expect_err("listing down");
    assert!(matches!(err, InventoryError::UpstreamUnavailable(_)));
    assert_eq!(*cache.snapshot(), *before);
}

#[test]
fn watermark_never_moves_backwards() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(30)));
    let cache = cache_over(&wiki, &clock);
    let first = cache.rebuild_all().expect("rebuild");

    clock.set(at(10));
    let second = cache.refresh().expect("refresh");
    assert_eq!(second, first);

    clock.set(at(40));
    let third = cache.refresh().expect("refresh");
    assert_eq!(third, Watermark::new(at(40)));
}

#[test]
fn refresh_with_no_changes_fetches_nothing() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);
    cache.rebuild_all().expect("rebuild");
    let fetches = wiki.total_fetches();

    clock.set(at(1));
    let watermark = cache.refresh().expect("refresh");

    assert_eq!(wiki.total_fetches(), fetches);
    assert_eq!(watermark, Watermark::new(at(1)));
}

#[test]
fn interleaved_refreshes_never_mix_entries() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = Arc::new(cache_over(&wiki, &clock));
    let since = cache.rebuild_all().expect("rebuild");
    let old = cache.get(42).expect("uid 42");

    let new = item_record("Kamera Sony A7", "entliehen", &["Kamera"]);
    wiki.edit("lab:ausstattung:042", new.clone(), at(3));
    wiki.edit(
        "lab:ausstattung:001",
        item_record("Laptop Dell", "defekt", &["Laptop"]),
        at(4),
    );
    clock.set(at(5));

    thread::scope(|scope| {
        for _ in 0..2 {
            let cache = Arc::clone(&cache);
            scope.spawn(move || cache.refresh_since(Some(since)).expect("refresh"));
        }
        let cache = Arc::clone(&cache);
        let (old, new) = (&old, &new);
        scope.spawn(move || {
            for _ in 0..200 {
                let seen = cache.get(42).expect("uid 42 always present");
                assert!(seen == *old || seen == *new, "half-applied entry observed");
            }
        });
    });

    let independent = cache_over(&wiki, &clock);
    independent.rebuild_all().expect("rebuild");
    assert_eq!(cache.snapshot().entries(), independent.snapshot().entries());
    assert_eq!(cache.get(42), Some(new));
}

#[test]
fn fetch_one_reports_missing_pages_and_drops_stale_entries() {
    let wiki = seeded_wiki();
    let clock = Arc::new(ManualClock::new(at(0)));
    let cache = cache_over(&wiki, &clock);
    cache.rebuild_all().expect("rebuild");

    wiki.delete("lab:ausstattung:042", at(1));
    let err = cache.fetch_one(42).expect_err("deleted");
    assert!(matches!(err, InventoryError::NotFound { uid: 42 }));
    assert!(cache.get(42).is_none());

    wiki.fail_page("lab:ausstattung:001");
    let err = cache.fetch_one(1).expect_err("transport failure");
    assert!(matches!(err, InventoryError::UpstreamUnavailable(_)));
    assert!(cache.get(1).is_some(), "transport failure keeps cached entry");
}
