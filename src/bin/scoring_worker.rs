//! Scoring worker process: polls the store for unscored items, scores them in
//! batches through the configured scorer, and writes results idempotently.

use std::sync::Arc;

use anyhow::Result;

use tickstream::config::PipelineConfig;
use tickstream::metrics::Metrics;
use tickstream::scoring::lexicon::LexiconScorer;
use tickstream::scoring::ScoringWorker;
use tickstream::store::PgItemStore;

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tickstream::init_tracing();

    let cfg = PipelineConfig::from_env()?;
    let metrics = Metrics::init()?;
    let metrics_addr = cfg.metrics_addr_or(9102);
    tokio::spawn(async move {
        if let Err(e) = metrics.serve(metrics_addr).await {
            tracing::error!(error = ?e, "metrics server failed");
        }
    });

    let store = PgItemStore::connect(&cfg.database_url).await?;
    store.migrate().await?;

    let worker = ScoringWorker::new(
        Arc::new(store),
        Arc::new(LexiconScorer::new()),
        &cfg.model,
        cfg.score_batch,
    );
    worker.run(cfg.idle_sleep).await
}
