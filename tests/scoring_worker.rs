// tests/scoring_worker.rs
// Backlog-driven scoring: accounting, ordering, failure isolation,
// (item, model) uniqueness, and the score/label sign invariant.

use std::sync::Arc;

use chrono::{Duration as ChronoDuration, Utc};

use tickstream::scoring::lexicon::LexiconScorer;
use tickstream::scoring::{persist_results, RawScore, ScoreTick, Scorer, ScoringWorker};
use tickstream::store::{InsertOutcome, ItemStore, Label};
use tickstream::testing::{draft, FailingScorer, MemoryStore, StubScorer};

const MODEL: &str = "lexicon-v1";

/// Seed `n` items with strictly increasing ingestion times; returns their ids
/// oldest-first.
async fn seed(store: &MemoryStore, n: usize) -> Vec<String> {
    let t0 = Utc::now();
    let mut ids = Vec::new();
    for i in 0..n {
        let d = draft(
            "wire",
            &format!("http://x.com/{i}"),
            &format!("headline {i}"),
            "",
            t0 + ChronoDuration::seconds(i as i64),
        );
        ids.push(d.id.clone());
        store.insert_item(&d).await.unwrap();
    }
    ids
}

fn worker(store: &Arc<MemoryStore>, scorer: Arc<dyn Scorer>, batch: usize) -> ScoringWorker {
    ScoringWorker::new(Arc::clone(store) as Arc<dyn ItemStore>, scorer, MODEL, batch)
}

#[tokio::test]
async fn backlog_decreases_by_scored_count() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 5).await;
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 5);

    let w = worker(&store, Arc::new(StubScorer::new("positive", 0.9)), 3);
    match w.tick().await.unwrap() {
        ScoreTick::Scored { scored, .. } => assert_eq!(scored, 3),
        other => panic!("expected Scored, got {other:?}"),
    }
    // K = 5 inserted, J = 3 scored
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 2);
}

#[tokio::test]
async fn oldest_items_are_scored_first() {
    let store = Arc::new(MemoryStore::new());
    let ids = seed(&store, 4).await;

    let w = worker(&store, Arc::new(StubScorer::new("neutral", 0.5)), 2);
    w.tick().await.unwrap();

    assert!(store.sentiment_for(&ids[0], MODEL).is_some());
    assert!(store.sentiment_for(&ids[1], MODEL).is_some());
    assert!(store.sentiment_for(&ids[2], MODEL).is_none());
    assert!(store.sentiment_for(&ids[3], MODEL).is_none());
}

#[tokio::test]
async fn empty_backlog_goes_idle() {
    let store = Arc::new(MemoryStore::new());
    let w = worker(&store, Arc::new(StubScorer::new("positive", 0.9)), 8);
    assert_eq!(w.tick().await.unwrap(), ScoreTick::Idle);
}

#[tokio::test]
async fn failed_batch_leaves_backlog_untouched() {
    let store = Arc::new(MemoryStore::new());
    seed(&store, 3).await;

    let w = worker(&store, Arc::new(FailingScorer), 8);
    assert_eq!(
        w.tick().await.unwrap(),
        ScoreTick::BatchFailed { size: 3 }
    );
    // still unscored: the backlog is the retry queue
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 3);

    // a healthy scorer on the next cycle drains the identical backlog
    let w = worker(&store, Arc::new(StubScorer::new("negative", 0.8)), 8);
    match w.tick().await.unwrap() {
        ScoreTick::Scored { scored, .. } => assert_eq!(scored, 3),
        other => panic!("expected Scored, got {other:?}"),
    }
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 0);
}

#[tokio::test]
async fn per_row_insert_failure_does_not_abort_batch() {
    let store = Arc::new(MemoryStore::new());
    let ids = seed(&store, 3).await;
    store.fail_sentiment_for(&ids[1]);

    let w = worker(&store, Arc::new(StubScorer::new("positive", 0.7)), 8);
    match w.tick().await.unwrap() {
        ScoreTick::Scored {
            scored,
            duplicates,
            failed,
        } => {
            assert_eq!(scored, 2);
            assert_eq!(duplicates, 0);
            assert_eq!(failed, 1);
        }
        other => panic!("expected Scored, got {other:?}"),
    }
    // the failed row is still in the backlog
    assert_eq!(store.unscored_count(MODEL).await.unwrap(), 1);
    assert!(store.sentiment_for(&ids[1], MODEL).is_none());
}

#[tokio::test]
async fn double_scoring_never_produces_two_rows() {
    let store = Arc::new(MemoryStore::new());
    let ids = seed(&store, 2).await;

    // two racing workers hand the same raw results to the store
    let raw: Vec<RawScore> = ids
        .iter()
        .map(|id| RawScore {
            id: id.clone(),
            label: "positive".into(),
            confidence: 0.9,
        })
        .collect();
    let (scored, duplicates, failed) = persist_results(store.as_ref(), MODEL, &raw).await;
    assert_eq!((scored, duplicates, failed), (2, 0, 0));

    let (scored, duplicates, failed) = persist_results(store.as_ref(), MODEL, &raw).await;
    assert_eq!((scored, duplicates, failed), (0, 2, 0));

    assert_eq!(store.sentiments().len(), 2);
    // direct double-insert is also a no-op
    let again = store
        .insert_sentiment(&store.sentiment_for(&ids[0], MODEL).unwrap())
        .await
        .unwrap();
    assert_eq!(again, InsertOutcome::Duplicate);
}

#[tokio::test]
async fn produced_scores_satisfy_sign_and_range_invariants() {
    let store = Arc::new(MemoryStore::new());
    let t0 = Utc::now();
    for (i, title) in [
        "AAPL beats estimates, shares surge",
        "quarterly report scheduled for Tuesday",
        "shares crash after fraud probe",
        "no profits this quarter",
    ]
    .iter()
    .enumerate()
    {
        let d = draft(
            "wire",
            &format!("http://x.com/mix/{i}"),
            title,
            "",
            t0 + ChronoDuration::seconds(i as i64),
        );
        store.insert_item(&d).await.unwrap();
    }

    let w = worker(&store, Arc::new(LexiconScorer::new()), 10);
    w.tick().await.unwrap();

    let results = store.sentiments();
    assert_eq!(results.len(), 4);
    for r in results {
        assert!((-1.0..=1.0).contains(&r.score), "score out of range: {r:?}");
        assert!((0.0..=1.0).contains(&r.confidence), "confidence out of range: {r:?}");
        match r.label {
            Label::Positive => assert!(r.score > 0.0, "{r:?}"),
            Label::Negative => assert!(r.score < 0.0, "{r:?}"),
            Label::Neutral => assert_eq!(r.score, 0.0, "{r:?}"),
        }
    }
}
