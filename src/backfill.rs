// src/backfill.rs
//! Bounded one-shot variant of the scoring loop: same batching and write
//! contract, finite iteration instead of indefinite polling. Used to catch up
//! after an outage or to reprocess after a model upgrade (the backlog query
//! is per model, so a new model identifier re-opens the whole backlog).

use anyhow::Result;

use crate::scoring::{persist_results, Scorer};
use crate::store::ItemStore;

#[derive(Debug, Default, PartialEq, Eq)]
pub struct BackfillReport {
    pub processed: usize,
    pub scored: usize,
    pub duplicates: usize,
    pub failed: usize,
}

/// Repeatedly pull up to `batch` unscored items until `limit` items have been
/// processed or the backlog drains. A scorer batch failure propagates — the
/// job is one-shot, so the caller reruns it rather than the job retrying
/// forever.
pub async fn run_backfill(
    store: &dyn ItemStore,
    scorer: &dyn Scorer,
    model: &str,
    limit: usize,
    batch: usize,
) -> Result<BackfillReport> {
    let mut report = BackfillReport::default();

    while report.processed < limit {
        let take = batch.min(limit - report.processed);
        let items = store.fetch_unscored(model, take).await?;
        if items.is_empty() {
            break;
        }

        let raw = scorer.score_batch(&items).await?;
        let (scored, duplicates, failed) = persist_results(store, model, &raw).await;

        report.processed += items.len();
        report.scored += scored;
        report.duplicates += duplicates;
        report.failed += failed;
        tracing::info!(processed = report.processed, "backfill progress");
    }

    Ok(report)
}
