// tests/backfill.rs
// One-shot backfill: bounded by limit, terminates on a drained backlog,
// follows the same idempotent write contract as the worker.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use tickstream::backfill::run_backfill;
use tickstream::store::ItemStore;
use tickstream::testing::{draft, FailingScorer, MemoryStore, StubScorer};

const MODEL: &str = "lexicon-v1";

async fn seed(store: &MemoryStore, n: usize) {
    let t0 = Utc::now();
    for i in 0..n {
        let d = draft(
            "wire",
            &format!("http://x.com/{i}"),
            &format!("headline {i}"),
            "",
            t0 + ChronoDuration::seconds(i as i64),
        );
        store.insert_item(&d).await.unwrap();
    }
}

#[tokio::test]
async fn stops_at_limit() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 10).await;

    let scorer = StubScorer::new("positive", 0.9);
    let report = run_backfill(store.as_ref(), &scorer, MODEL, 6, 4)
        .await
        .unwrap();

    assert_eq!(report.processed, 6);
    assert_eq!(report.scored, 6);
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 4);
}

#[tokio::test]
async fn terminates_when_backlog_drains() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 3).await;

    let scorer = StubScorer::new("neutral", 0.5);
    let report = run_backfill(store.as_ref(), &scorer, MODEL, 500, 32)
        .await
        .unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.scored, 3);
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 0);

    // immediately running again finds nothing to do
    let report = run_backfill(store.as_ref(), &scorer, MODEL, 500, 32)
        .await
        .unwrap();
    assert_eq!(report.processed, 0);
}

#[tokio::test]
async fn noop_on_empty_store() {
    let store = Arc::new(MemoryStore::new());
    let scorer = StubScorer::new("positive", 0.9);
    let report = run_backfill(store.as_ref(), &scorer, MODEL, 100, 10)
        .await
        .unwrap();
    assert_eq!(report, Default::default());
}

#[tokio::test]
async fn scorer_failure_propagates() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 2).await;

    let err = run_backfill(store.as_ref(), &FailingScorer, MODEL, 100, 10).await;
    assert!(err.is_err());
    // nothing persisted, nothing lost
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 2);
}

#[tokio::test]
async fn already_scored_items_are_skipped_as_duplicates() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 4).await;

    let scorer = StubScorer::new("positive", 0.9);
    run_backfill(store.as_ref(), &scorer, MODEL, 2, 2).await.unwrap();
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 2);

    // a second pass over the rest; previously scored rows never reappear
    let report = run_backfill(store.as_ref(), &scorer, MODEL, 500, 2)
        .await
        .unwrap();
    assert_eq!(report.processed, 2);
    assert_eq!(report.duplicates, 0);
    assert_eq!(store.sentiments().len(), 4);
}
