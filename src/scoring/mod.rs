// src/scoring/mod.rs
//! Backlog-driven batch scoring: poll the store for items missing a sentiment
//! result, score them in batches through the pluggable scorer, write results
//! idempotently. Horizontal scaling is racing instances over the same backlog
//! query; the (item, model) uniqueness constraint makes double-processing a
//! harmless no-op.

pub mod lexicon;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use metrics::{counter, describe_counter, describe_gauge, gauge};
use once_cell::sync::OnceCell;

use crate::store::{InsertOutcome, ItemStore, Label, SentimentResult, UnscoredItem};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("sent_scored_total", "Sentiment rows written.");
        describe_counter!("sent_failed_total", "Scoring failures (batch and per-row).");
        describe_gauge!("sent_backlog", "Unscored item backlog (rows).");
    });
}

/// Raw scorer output for one item: the model's label verbatim plus its
/// confidence in that label.
#[derive(Debug, Clone, PartialEq)]
pub struct RawScore {
    pub id: String,
    pub label: String,
    pub confidence: f64,
}

/// The scorer capability boundary. One result per input item, same order.
/// Stateless per call from the pipeline's perspective.
#[async_trait]
pub trait Scorer: Send + Sync {
    async fn score_batch(&self, items: &[UnscoredItem]) -> Result<Vec<RawScore>>;
}

/// Map a raw score to the stored result. Known labels carry their sign and
/// confidence; an unrecognized label becomes (neutral, 0.0) rather than an
/// error.
pub fn to_result(raw: &RawScore, model: &str) -> SentimentResult {
    let (label, confidence) = match raw.label.to_ascii_lowercase().as_str() {
        "positive" => (Label::Positive, raw.confidence.clamp(0.0, 1.0)),
        "neutral" => (Label::Neutral, raw.confidence.clamp(0.0, 1.0)),
        "negative" => (Label::Negative, raw.confidence.clamp(0.0, 1.0)),
        _ => (Label::Neutral, 0.0),
    };
    SentimentResult {
        item_id: raw.id.clone(),
        model: model.to_string(),
        label,
        score: label.sign() * confidence,
        confidence,
    }
}

/// Insert a batch of results. A per-row failure is counted and skipped; it
/// never aborts the rest of the batch. Shared by the worker and the backfill
/// job so both follow the same write contract.
pub async fn persist_results(
    store: &dyn ItemStore,
    model: &str,
    raw: &[RawScore],
) -> (usize, usize, usize) {
    let mut scored = 0usize;
    let mut duplicates = 0usize;
    let mut failed = 0usize;
    for r in raw {
        let result = to_result(r, model);
        match store.insert_sentiment(&result).await {
            Ok(InsertOutcome::Inserted) => scored += 1,
            Ok(InsertOutcome::Duplicate) => duplicates += 1,
            Err(e) => {
                tracing::warn!(item = %r.id, error = ?e, "sentiment insert failed");
                counter!("sent_failed_total").increment(1);
                failed += 1;
            }
        }
    }
    counter!("sent_scored_total").increment(scored as u64);
    (scored, duplicates, failed)
}

/// Outcome of one worker tick. `Idle` and `BatchFailed` both mean "sleep
/// before the next tick"; a failed batch stays unscored, so the retry queue
/// is the backlog itself.
#[derive(Debug, PartialEq, Eq)]
pub enum ScoreTick {
    Idle,
    BatchFailed {
        size: usize,
    },
    Scored {
        scored: usize,
        duplicates: usize,
        failed: usize,
    },
}

pub struct ScoringWorker {
    store: Arc<dyn ItemStore>,
    scorer: Arc<dyn Scorer>,
    model: String,
    batch_size: usize,
}

impl ScoringWorker {
    pub fn new(
        store: Arc<dyn ItemStore>,
        scorer: Arc<dyn Scorer>,
        model: &str,
        batch_size: usize,
    ) -> Self {
        Self {
            store,
            scorer,
            model: model.to_string(),
            batch_size,
        }
    }

    /// One scoring pass: refresh the backlog gauge, fetch the oldest unscored
    /// batch, score it, persist. Store/transport errors propagate and are
    /// fatal to the process; a scorer failure is contained.
    pub async fn tick(&self) -> Result<ScoreTick> {
        ensure_metrics_described();

        let backlog = self.store.unscored_count(&self.model).await?;
        gauge!("sent_backlog").set(backlog as f64);
        if backlog == 0 {
            return Ok(ScoreTick::Idle);
        }

        let items = self.store.fetch_unscored(&self.model, self.batch_size).await?;
        if items.is_empty() {
            // backlog drained between the count and the fetch
            return Ok(ScoreTick::Idle);
        }

        let raw = match self.scorer.score_batch(&items).await {
            Ok(raw) => raw,
            Err(e) => {
                // Whole batch counts failed; the items stay unscored and the
                // identical backlog is retried next cycle.
                tracing::warn!(size = items.len(), error = ?e, "scorer batch failed");
                counter!("sent_failed_total").increment(items.len() as u64);
                return Ok(ScoreTick::BatchFailed { size: items.len() });
            }
        };

        let (scored, duplicates, failed) =
            persist_results(self.store.as_ref(), &self.model, &raw).await;
        Ok(ScoreTick::Scored {
            scored,
            duplicates,
            failed,
        })
    }

    /// Indefinite polling loop around `tick`.
    pub async fn run(&self, idle_sleep: Duration) -> Result<()> {
        tracing::info!(model = %self.model, batch = self.batch_size, "scoring worker up");
        loop {
            match self.tick().await? {
                ScoreTick::Idle | ScoreTick::BatchFailed { .. } => {
                    tokio::time::sleep(idle_sleep).await;
                }
                ScoreTick::Scored {
                    scored,
                    duplicates,
                    failed,
                } => {
                    tracing::debug!(scored, duplicates, failed, "batch scored");
                }
            }
        }
    }
}
