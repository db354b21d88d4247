//! Polling cycles against scripted sources and a recording messenger.

mod common;

use common::{
    Call, FlakyStore, RecordingMessenger, ScriptedSource, config_with, correlated, record,
};
use relay::models::{Detail, MessageHandle, Record, ScrapeOrder, SourceConfig, StoreEntry};
use relay::pipeline::{self, run_cycle};
use relay::services::SourceRegistry;
use relay::storage::{LocalStore, MemoryStore, RecordStore};

fn registry_with(sources: &[&ScriptedSource]) -> SourceRegistry {
    let mut registry = SourceRegistry::new();
    for source in sources {
        registry.register((*source).clone());
    }
    registry
}

#[tokio::test]
async fn plain_dedup_delivers_each_record_once() {
    let source = ScriptedSource::new("news");
    source.set_records(vec![
        record("1", "2026-02-01T00:00:00Z"),
        record("2", "2026-02-01T01:00:00Z"),
    ]);
    let config = config_with(vec![SourceConfig::new("news")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    let first = run_cycle(&config, &registry, &store, &messenger).await;
    let second = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(first.sent(), 2);
    assert_eq!(second.sent(), 0);
    assert_eq!(second.source("news").unwrap().skipped, 2);
    assert_eq!(messenger.calls().len(), 2);
}

#[tokio::test]
async fn separator_without_edit_is_plain_dedup() {
    let source = ScriptedSource::new("cables");
    let config = config_with(vec![SourceConfig {
        event_prefix_separator: Some('_'),
        ..SourceConfig::new("cables")
    }]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    source.set_records(vec![record("A", "2026-02-01T00:00:00Z")]);
    run_cycle(&config, &registry, &store, &messenger).await;
    source.set_records(vec![record("A_resolved", "2026-02-01T01:00:00Z")]);
    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.sent(), 1);
    assert_eq!(report.edited(), 0);
    let table = store.read("cables").await.unwrap().unwrap();
    assert_eq!(table.len(), 2);
}

#[tokio::test]
async fn first_sighting_stores_handle() {
    let source = ScriptedSource::new("x");
    source.set_records(vec![record("A", "2026-02-01T00:00:00Z").with_status("dispatched")]);
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.sent(), 1);
    let table = store.read("x").await.unwrap().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("A").unwrap().handle(), Some(MessageHandle(1)));
}

#[tokio::test]
async fn status_change_edits_and_replaces_row() {
    let source = ScriptedSource::new("x");
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    source.set_records(vec![record("A", "2026-02-01T00:00:00Z")]);
    run_cycle(&config, &registry, &store, &messenger).await;

    source.set_records(vec![record("A_arrived", "2026-02-01T00:05:00Z")]);
    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.edited(), 1);
    assert_eq!(report.sent(), 0);
    assert_eq!(
        messenger.calls().last(),
        Some(&Call::Edit {
            handle: MessageHandle(1),
            text: "A_arrived: A_arrived".into(),
        })
    );

    let table = store.read("x").await.unwrap().unwrap();
    assert_eq!(table.len(), 1);
    assert!(!table.contains("A"));
    assert_eq!(table.get("A_arrived").unwrap().handle(), Some(MessageHandle(1)));
}

#[tokio::test]
async fn status_chain_keeps_one_row_with_first_handle() {
    let source = ScriptedSource::new("x");
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    for (i, id) in ["P_A", "P_B", "P_C"].into_iter().enumerate() {
        source.set_records(vec![
            record(id, &format!("2026-02-01T00:0{i}:00Z")),
            record(&format!("Q{i}"), "2026-02-01T00:00:00Z"),
        ]);
        run_cycle(&config, &registry, &store, &messenger).await;
    }

    let table = store.read("x").await.unwrap().unwrap();
    let rows: Vec<&String> = table
        .iter()
        .map(|(id, _)| id)
        .filter(|id| id.starts_with("P"))
        .collect();
    assert_eq!(rows, vec!["P_C"]);

    assert_eq!(table.get("P_C").unwrap().handle(), Some(MessageHandle(1)));

    let edits = messenger
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Edit { .. }))
        .count();
    assert_eq!(edits, 2);
}

#[tokio::test]
async fn unchanged_status_is_not_edited_again() {
    let source = ScriptedSource::new("x");
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    source.set_records(vec![record("A_dispatched", "2026-02-01T00:00:00Z")]);
    run_cycle(&config, &registry, &store, &messenger).await;
    source.set_records(vec![record("A_arrived", "2026-02-01T00:05:00Z")]);
    run_cycle(&config, &registry, &store, &messenger).await;
    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.source("x").unwrap().skipped, 1);
    assert_eq!(messenger.calls().len(), 2);
}

#[tokio::test]
async fn same_event_in_one_page_collapses_to_last() {
    let source = ScriptedSource::new("x");
    source.set_records(vec![
        record("A_dispatched", "2026-02-01T00:00:00Z"),
        record("B_dispatched", "2026-02-01T00:01:00Z"),
        record("A_arrived", "2026-02-01T00:02:00Z"),
    ]);
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.source("x").unwrap().fetched, 3);
    assert_eq!(report.source("x").unwrap().considered, 2);
    let texts: Vec<String> = messenger
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Text { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["A_arrived: A_arrived", "B_dispatched: B_dispatched"]);
}

#[tokio::test]
async fn newest_first_source_is_reversed_before_collapse() {
    let source = ScriptedSource::new("x");
    source.set_records(vec![
        record("A_returned", "2026-02-01T00:10:00Z"),
        record("A_arrived", "2026-02-01T00:05:00Z"),
        record("A_dispatched", "2026-02-01T00:00:00Z"),
    ]);
    let config = config_with(vec![SourceConfig {
        scrape_order: ScrapeOrder::NewestFirst,
        ..correlated("x")
    }]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    run_cycle(&config, &registry, &store, &messenger).await;

    let table = store.read("x").await.unwrap().unwrap();
    assert_eq!(table.len(), 1);
    assert!(table.contains("A_returned"));
}

#[tokio::test]
async fn failed_send_leaves_store_unchanged_and_retries() {
    let source = ScriptedSource::new("news");
    source.set_records(vec![record("1", "2026-02-01T00:00:00Z")]);
    let config = config_with(vec![SourceConfig::new("news")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    messenger.fail_next_send();
    let first = run_cycle(&config, &registry, &store, &messenger).await;
    assert_eq!(first.failed(), 1);
    assert_eq!(first.sent(), 0);
    assert!(store.read("news").await.unwrap().is_none());

    let second = run_cycle(&config, &registry, &store, &messenger).await;
    assert_eq!(second.sent(), 1);
    assert!(store.contains("news", "1").await.unwrap());
}

#[tokio::test]
async fn failed_edit_is_not_persisted_and_retries() {
    let source = ScriptedSource::new("x");
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    source.set_records(vec![record("A", "2026-02-01T00:00:00Z")]);
    run_cycle(&config, &registry, &store, &messenger).await;

    source.set_records(vec![record("A_arrived", "2026-02-01T00:05:00Z")]);
    messenger.fail_next_edit();
    let failed = run_cycle(&config, &registry, &store, &messenger).await;
    assert_eq!(failed.failed(), 1);
    let table = store.read("x").await.unwrap().unwrap();
    assert!(table.contains("A"));
    assert!(!table.contains("A_arrived"));

    let retried = run_cycle(&config, &registry, &store, &messenger).await;
    assert_eq!(retried.edited(), 1);
    let table = store.read("x").await.unwrap().unwrap();
    assert_eq!(table.get("A_arrived").unwrap().handle(), Some(MessageHandle(1)));
}

#[tokio::test]
async fn failed_send_does_not_stop_later_records() {
    let source = ScriptedSource::new("news");
    source.set_records(vec![
        record("1", "2026-02-01T00:00:00Z"),
        record("2", "2026-02-01T01:00:00Z"),
    ]);
    let config = config_with(vec![SourceConfig::new("news")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    messenger.fail_next_send();
    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.failed(), 1);
    assert_eq!(report.sent(), 1);
    assert!(!store.contains("news", "1").await.unwrap());
    assert!(store.contains("news", "2").await.unwrap());
}

#[tokio::test]
async fn source_failure_is_isolated() {
    let broken = ScriptedSource::new("broken");
    broken.set_failing(true);
    let healthy = ScriptedSource::new("healthy");
    healthy.set_records(vec![record("1", "2026-02-01T00:00:00Z")]);

    let config = config_with(vec![
        SourceConfig::new("broken"),
        SourceConfig::new("missing"),
        SourceConfig::new("healthy"),
    ]);
    let registry = registry_with(&[&broken, &healthy]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.failed_sources(), vec!["broken", "missing"]);
    assert_eq!(report.source("healthy").unwrap().sent, 1);
    assert!(store.read("broken").await.unwrap().is_none());
}

#[tokio::test]
async fn disabled_sources_are_not_fetched() {
    let source = ScriptedSource::new("news");
    source.set_records(vec![record("1", "2026-02-01T00:00:00Z")]);
    let config = config_with(vec![SourceConfig {
        enabled: false,
        ..SourceConfig::new("news")
    }]);
    let registry = registry_with(&[&source]);
    let messenger = RecordingMessenger::new();

    let report = run_cycle(&config, &registry, &MemoryStore::new(), &messenger).await;
    assert!(report.sources.is_empty());
    assert!(messenger.calls().is_empty());
}

#[tokio::test]
async fn eviction_keeps_most_recent_hundred() {
    let source = ScriptedSource::new("feed");
    let records: Vec<Record> = (0..150)
        .map(|i| {
            let date = format!("2026-02-01T{:02}:{:02}:00Z", i / 60, i % 60);
            record(&format!("n{i:03}"), &date)
        })
        .collect();
    source.set_records(records);
    let config = config_with(vec![SourceConfig::new("feed")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.sent(), 150);
    let table = store.read("feed").await.unwrap().unwrap();
    assert_eq!(table.len(), 100);
    assert!(!table.contains("n049"));
    assert!(table.contains("n050"));
    assert!(table.contains("n149"));
}

#[tokio::test]
async fn detail_enriches_new_records_only() {
    let source = ScriptedSource::new("isp").with_details();
    source.set_records(vec![
        record("1", "2026-02-01T00:00:00Z").with_detail_key("k1"),
        record("2", "2026-02-01T01:00:00Z").with_detail_key("k2"),
    ]);
    source.set_detail(
        "k1",
        Ok(Detail {
            content: Some("full body".into()),
            images: vec!["https://img/a.jpg".into(), "https://img/b.jpg".into()],
            publish_date: None,
        }),
    );
    // No detail scripted for k2: the fetch fails and the record goes out as scraped.

    let config = config_with(vec![SourceConfig::new("isp")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    let report = run_cycle(&config, &registry, &store, &messenger).await;
    assert_eq!(report.sent(), 2);
    assert_eq!(
        messenger.calls(),
        vec![
            Call::Group {
                urls: vec!["https://img/a.jpg".into(), "https://img/b.jpg".into()],
                caption: "1: full body".into(),
            },
            Call::Text {
                text: "2: 2".into(),
                thread_id: None,
            },
        ]
    );

    run_cycle(&config, &registry, &store, &messenger).await;
    assert_eq!(source.detail_calls(), vec!["k1", "k2"]);
}

#[tokio::test]
async fn poster_goes_out_as_photo_in_thread() {
    let source = ScriptedSource::new("news");
    source.set_records(vec![
        record("1", "2026-02-01T00:00:00Z").with_poster("https://img/p.jpg"),
    ]);
    let config = config_with(vec![SourceConfig {
        message_thread_id: Some(42),
        ..SourceConfig::new("news")
    }]);
    let registry = registry_with(&[&source]);
    let messenger = RecordingMessenger::new();

    run_cycle(&config, &registry, &MemoryStore::new(), &messenger).await;

    assert_eq!(
        messenger.calls(),
        vec![Call::Photo {
            url: "https://img/p.jpg".into(),
            caption: "1: 1".into(),
        }]
    );
}

#[tokio::test]
async fn legacy_prefix_rows_are_pruned_on_send() {
    let source = ScriptedSource::new("x");
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    let mut table = relay::models::ServiceTable::new();
    table.insert("A_dispatched", StoreEntry::Legacy("2026-02-01T00:00:00Z".into()));
    store.write("x", table).await.unwrap();

    source.set_records(vec![record("A_arrived", "2026-02-01T00:05:00Z")]);
    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert_eq!(report.sent(), 1);
    let table = store.read("x").await.unwrap().unwrap();
    assert_eq!(table.len(), 1);
    assert_eq!(table.get("A_arrived").unwrap().handle(), Some(MessageHandle(1)));
}

#[tokio::test]
async fn skip_marks_backlog_without_sending() {
    let source = ScriptedSource::new("news");
    source.set_records(vec![
        record("1", "2026-02-01T00:00:00Z"),
        record("2", "2026-02-01T01:00:00Z"),
    ]);
    let config = config_with(vec![SourceConfig::new("news")]);
    let registry = registry_with(&[&source]);
    let store = MemoryStore::new();
    let messenger = RecordingMessenger::new();

    let added = pipeline::skip_source(&config.sources[0], &registry, &store)
        .await
        .unwrap();
    assert_eq!(added, 2);

    let report = run_cycle(&config, &registry, &store, &messenger).await;
    assert_eq!(report.sent(), 0);
    assert!(messenger.calls().is_empty());
}

#[tokio::test]
async fn delivered_state_survives_restart_on_disk() {
    let dir = tempfile::tempdir().unwrap();
    let source = ScriptedSource::new("x");
    source.set_records(vec![record("A", "2026-02-01T00:00:00Z")]);
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let messenger = RecordingMessenger::new();

    run_cycle(&config, &registry, &LocalStore::new(dir.path()), &messenger).await;

    source.set_records(vec![record("A_closed", "2026-02-01T00:30:00Z")]);
    let report = run_cycle(&config, &registry, &LocalStore::new(dir.path()), &messenger).await;

    assert_eq!(report.edited(), 1);
    let table = LocalStore::new(dir.path()).read("x").await.unwrap().unwrap();
    assert_eq!(table.get("A_closed").unwrap().handle(), Some(MessageHandle(1)));
}

#[tokio::test]
async fn store_error_mid_source_stops_only_that_source() {
    let first = ScriptedSource::new("a");
    first.set_records(vec![
        record("1", "2026-02-01T00:00:00Z"),
        record("2", "2026-02-01T01:00:00Z"),
        record("3", "2026-02-01T02:00:00Z"),
    ]);
    let second = ScriptedSource::new("b");
    second.set_records(vec![record("x", "2026-02-01T00:00:00Z")]);

    let config = config_with(vec![SourceConfig::new("a"), SourceConfig::new("b")]);
    let registry = registry_with(&[&first, &second]);
    let store = FlakyStore::failing_save(2);
    let messenger = RecordingMessenger::new();

    let report = run_cycle(&config, &registry, &store, &messenger).await;

    let a = report.source("a").unwrap();
    assert!(a.error.is_some());
    assert_eq!(a.sent, 1);
    assert_eq!(report.source("b").unwrap().sent, 1);

    // Record 2 went out but was not persisted; record 3 was never attempted.
    let texts: Vec<String> = messenger
        .calls()
        .into_iter()
        .filter_map(|c| match c {
            Call::Text { text, .. } => Some(text),
            _ => None,
        })
        .collect();
    assert_eq!(texts, vec!["1: 1", "2: 2", "x: x"]);

    let table = store.inner().read("a").await.unwrap().unwrap();
    assert!(table.contains("1"));
    assert!(!table.contains("2"));
    assert!(!table.contains("3"));
    assert!(store.inner().contains("b", "x").await.unwrap());
}

#[tokio::test]
async fn store_error_after_edit_keeps_previous_row() {
    let source = ScriptedSource::new("x");
    let config = config_with(vec![correlated("x")]);
    let registry = registry_with(&[&source]);
    let store = FlakyStore::failing_save(2);
    let messenger = RecordingMessenger::new();

    source.set_records(vec![record("A", "2026-02-01T00:00:00Z")]);
    run_cycle(&config, &registry, &store, &messenger).await;

    source.set_records(vec![record("A_arrived", "2026-02-01T00:05:00Z")]);
    let report = run_cycle(&config, &registry, &store, &messenger).await;

    assert!(report.source("x").unwrap().error.is_some());
    assert_eq!(report.edited(), 0);
    let table = store.inner().read("x").await.unwrap().unwrap();
    assert_eq!(table.get("A").unwrap().handle(), Some(MessageHandle(1)));
    assert!(!table.contains("A_arrived"));
}
