//! One-shot backfill: score up to `--limit` unscored items in `--batch`-sized
//! chunks, then exit. Same write contract as the scoring worker.

use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use tickstream::backfill::run_backfill;
use tickstream::config::PipelineConfig;
use tickstream::scoring::lexicon::LexiconScorer;
use tickstream::store::PgItemStore;

#[derive(Parser, Debug)]
#[command(about = "Score the unscored-item backlog once, bounded, then exit")]
struct Args {
    /// Maximum number of items to process.
    #[arg(long, default_value_t = 500)]
    limit: usize,

    /// Items per scoring batch.
    #[arg(long, default_value_t = 32)]
    batch: usize,
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tickstream::init_tracing();
    let args = Args::parse();

    let cfg = PipelineConfig::from_env()?;
    let store = Arc::new(PgItemStore::connect(&cfg.database_url).await?);
    store.migrate().await?;

    let scorer = LexiconScorer::new();
    let report = run_backfill(store.as_ref(), &scorer, &cfg.model, args.limit, args.batch).await?;

    tracing::info!(
        processed = report.processed,
        scored = report.scored,
        duplicates = report.duplicates,
        failed = report.failed,
        "backfill complete"
    );
    Ok(())
}
