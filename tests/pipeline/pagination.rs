#[path = "../common/mod.rs"]
mod common;

use common::fixtures::page_body;
use common::{search_key, Harness, ScriptedFetcher};
use image_saver::events::Event;
use image_saver::pipeline::paginator::SearchSettings;

#[tokio::test]
async fn test_first_page_appends_and_advances() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(search_key("cats", 1), page_body(Some(3), 0, 20)).images(0..20, 4);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;

    let session = h.ctl.session().unwrap().clone();
    assert_eq!(session.entries().len(), 20);
    assert_eq!(session.current_page(), 2);
    assert_eq!(session.total_pages(), Some(3));
    assert!(!h.ctl.exhausted());
    assert_eq!(session.entries()[5].author.as_deref(), Some("author 5"));
    assert_eq!(session.entries()[5].description.as_deref(), Some("image 5"));

    let events = h.drain();
    assert!(events.contains(&Event::EntriesAppended { session: session.id(), range: 0..20 }));
    assert!(!events.contains(&Event::Exhausted));
}

#[tokio::test]
async fn test_empty_results_signal_no_results() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(search_key("zzz", 1), page_body(Some(0), 0, 0));
    let mut h = Harness::new(fetcher);

    h.ctl.search("zzz");
    h.ctl.settle().await;

    let session = h.ctl.session().unwrap();
    assert!(session.entries().is_empty());
    assert_eq!(session.current_page(), 1);
    assert!(!h.ctl.exhausted());
    assert_eq!(h.drain(), vec![Event::NoResults { term: "zzz".to_string() }]);
}

#[tokio::test]
async fn test_empty_later_page_keeps_entries() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("cats", 1), page_body(Some(3), 0, 20))
        .respond(search_key("cats", 2), page_body(Some(3), 0, 0))
        .images(0..20, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;
    assert!(h.ctl.on_visible(19));
    h.ctl.settle().await;

    assert_eq!(h.ctl.entries().len(), 20);
    assert_eq!(h.ctl.session().unwrap().current_page(), 2);
    assert!(h.drain().contains(&Event::NoResults { term: "cats".to_string() }));
}

#[tokio::test]
async fn test_walks_pages_until_exhausted() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("cats", 1), page_body(Some(3), 0, 20))
        .respond(search_key("cats", 2), page_body(Some(3), 20, 20))
        .respond(search_key("cats", 3), page_body(Some(3), 40, 5))
        .images(0..45, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;
    let mut lengths = vec![h.ctl.entries().len()];
    while h.ctl.on_visible(h.ctl.entries().len() - 1) {
        h.ctl.settle().await;
        lengths.push(h.ctl.entries().len());
    }

    assert_eq!(lengths, vec![20, 40, 45]);
    assert!(h.ctl.exhausted());
    assert_eq!(h.ctl.session().unwrap().current_page(), 4);
    assert!(h.drain().contains(&Event::Exhausted));

    // Past the last page the trigger is a no-op.
    assert!(!h.ctl.on_visible(44));
    assert_eq!(h.fetcher.calls(&search_key("cats", 4)), 0);
    // Entries keep the order the pages delivered them in.
    let authors: Vec<_> = h.ctl.entries().iter().map(|e| e.author.clone().unwrap()).collect();
    let expected: Vec<_> = (0..45).map(|n| format!("author {}", n)).collect();
    assert_eq!(authors, expected);
}

#[tokio::test]
async fn test_only_last_visible_entry_triggers_fetch() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("cats", 1), page_body(Some(3), 0, 20))
        .respond(search_key("cats", 2), page_body(Some(3), 20, 20))
        .images(0..40, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;
    assert!(!h.ctl.on_visible(0));
    assert!(!h.ctl.on_visible(18));
    assert!(!h.ctl.on_visible(25));
    assert_eq!(h.fetcher.calls(&search_key("cats", 2)), 0);
    assert!(h.ctl.on_visible(19));
}

#[tokio::test]
async fn test_single_page_request_in_flight() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("cats", 1), page_body(Some(3), 0, 20))
        .respond(search_key("cats", 2), page_body(Some(3), 20, 20))
        .images(0..40, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;
    assert!(h.ctl.on_visible(19));
    assert!(h.ctl.session().unwrap().in_flight());
    assert!(!h.ctl.on_visible(19));
    assert_eq!(h.ctl.depths().page, 1);
    h.ctl.settle().await;

    assert_eq!(h.fetcher.calls(&search_key("cats", 2)), 1);
    assert_eq!(h.ctl.entries().len(), 40);
    assert_eq!(h.ctl.session().unwrap().current_page(), 3);
}

#[tokio::test]
async fn test_unknown_total_pages_never_exhausts() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(search_key("cats", 1), page_body(None, 0, 3)).images(0..3, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;

    assert_eq!(h.ctl.entries().len(), 3);
    assert_eq!(h.ctl.session().unwrap().total_pages(), None);
    assert!(!h.ctl.exhausted());
}

#[tokio::test]
async fn test_new_search_discards_previous_session() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("dogs", 1), page_body(Some(5), 100, 20))
        .respond(search_key("cats", 1), page_body(Some(2), 0, 7))
        .images(0..7, 2)
        .images(100..120, 2);
    let mut h = Harness::new(fetcher);

    let dogs = h.ctl.search("dogs");
    // Replace the session before the dogs page is applied.
    let cats = h.ctl.search("cats");
    assert_ne!(dogs, cats);
    h.ctl.settle().await;

    let session = h.ctl.session().unwrap();
    assert_eq!(session.term(), "cats");
    assert_eq!(session.entries().len(), 7);
    assert_eq!(session.total_pages(), Some(2));
    assert!(session.entries().iter().all(|e| e.author.as_deref() != Some("author 100")));
    // The stale dogs page never reached the thumbnail stage.
    assert_eq!(h.fetcher.calls(&common::fixtures::thumb_url(100)), 0);

    let appended: Vec<_> = h
        .drain()
        .into_iter()
        .filter(|e| matches!(e, Event::EntriesAppended { .. }))
        .collect();
    assert_eq!(appended, vec![Event::EntriesAppended { session: cats, range: 0..7 }]);
}

#[tokio::test]
async fn test_new_search_resets_selection_and_counters() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("cats", 1), page_body(Some(1), 0, 4))
        .respond(search_key("owls", 1), page_body(Some(2), 10, 2))
        .images(0..4, 2)
        .images(10..12, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;
    h.ctl.set_selected(1, true);
    assert!(h.ctl.exhausted());

    h.ctl.search("owls");
    assert!(h.ctl.entries().is_empty());
    assert!(!h.ctl.exhausted());
    assert_eq!(h.ctl.selected_count(), 0);
    h.ctl.settle().await;
    assert_eq!(h.ctl.entries().len(), 2);
    assert_eq!(h.ctl.selected_count(), 0);
}

#[tokio::test]
async fn test_cancel_drops_in_flight_page() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(search_key("cats", 1), page_body(Some(1), 0, 3)).images(0..3, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.cancel();
    h.ctl.settle().await;

    assert!(h.ctl.session().is_none());
    assert!(h.ctl.entries().is_empty());
    assert!(h.drain().is_empty());
    assert!(!h.ctl.on_visible(0));
}

#[tokio::test]
async fn test_network_error_leaves_counters() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("cats", 1), page_body(Some(3), 0, 20))
        .fail(search_key("cats", 2), "connection reset")
        .images(0..20, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;
    h.drain();
    assert!(h.ctl.on_visible(19));
    h.ctl.settle().await;

    let session = h.ctl.session().unwrap();
    assert_eq!(session.entries().len(), 20);
    assert_eq!(session.current_page(), 2);
    assert!(!session.in_flight());
    assert_eq!(h.drain(), vec![Event::NetworkError { cause: "connection reset".to_string() }]);

    // Not retried automatically, but the caller may retry.
    assert_eq!(h.fetcher.calls(&search_key("cats", 2)), 1);
    assert!(h.ctl.on_visible(19));
}

#[tokio::test]
async fn test_malformed_body_is_parse_error() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(search_key("cats", 1), b"<html>rate limited</html>".to_vec());
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;

    let session = h.ctl.session().unwrap();
    assert_eq!(session.current_page(), 1);
    assert_eq!(session.total_pages(), None);
    let events = h.drain();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], Event::ParseError { .. }));
}

#[tokio::test]
async fn test_records_without_fields_become_empty_entries() {
    let fetcher = ScriptedFetcher::new();
    fetcher.respond(search_key("cats", 1), br#"{"total_pages": 1, "results": [{}, {"urls": {}}]}"#.to_vec());
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;

    let entries = h.ctl.entries();
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert!(entry.description.is_none());
        assert!(entry.author.is_none());
        assert!(entry.thumbnail_url.is_none());
        assert!(entry.thumbnail.is_none());
        assert!(!entry.can_save());
    }
    assert!(h.ctl.exhausted());
}

#[tokio::test]
async fn test_invalid_endpoint_reports_network_error() {
    let (sink, mut events) = image_saver::ChannelSink::new();
    let settings = SearchSettings { endpoint: "::not a url".to_string(), ..common::settings() };
    let mut ctl = image_saver::SearchController::new(
        settings,
        std::sync::Arc::new(ScriptedFetcher::new()),
        std::sync::Arc::new(common::MemoryStore::new()),
        std::sync::Arc::new(sink),
    );

    ctl.search("cats");
    assert!(matches!(events.try_recv(), Ok(Event::NetworkError { .. })));
    assert_eq!(ctl.session().unwrap().current_page(), 1);
    assert!(!ctl.session().unwrap().in_flight());
    assert_eq!(ctl.depths().page, 0);
}

#[tokio::test]
async fn test_out_of_range_visible_index_is_ignored() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("cats", 1), page_body(Some(3), 0, 2))
        .respond(search_key("zzz", 1), page_body(Some(0), 0, 0))
        .images(0..2, 2);
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;
    assert!(!h.ctl.on_visible(usize::MAX));
    assert!(!h.ctl.on_visible(2));

    // An empty session has no last entry to reach.
    h.ctl.search("zzz");
    h.ctl.settle().await;
    assert!(!h.ctl.on_visible(usize::MAX));
    assert_eq!(h.fetcher.calls(&search_key("zzz", 1)), 1);
    assert_eq!(h.fetcher.calls(&search_key("cats", 2)), 0);
}

#[tokio::test]
async fn test_panicking_page_fetch_still_settles() {
    let fetcher = ScriptedFetcher::new();
    fetcher
        .respond(search_key("cats", 1), page_body(Some(3), 0, 20))
        .images(0..20, 2)
        .panic_on(search_key("cats", 2));
    let mut h = Harness::new(fetcher);

    h.ctl.search("cats");
    h.ctl.settle().await;
    h.drain();

    assert!(h.ctl.on_visible(19));
    h.ctl.settle().await;

    assert_eq!(h.ctl.depths().page, 0);
    assert_eq!(h.ctl.entries().len(), 20);
    assert!(!h.ctl.session().unwrap().in_flight());
    let events = h.drain();
    assert!(events.iter().any(|e| matches!(e, Event::NetworkError { .. })));

    // The failed page is requested again on the next trigger.
    assert!(h.ctl.on_visible(19));
    h.ctl.settle().await;
    assert_eq!(h.fetcher.calls(&search_key("cats", 2)), 2);
}
