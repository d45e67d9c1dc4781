// src/lib.rs
// Public library surface for the pipeline binaries and integration tests.

pub mod backfill;
pub mod config;
pub mod consumer;
pub mod ingest;
pub mod ledger;
pub mod metrics;
pub mod normalize;
pub mod scoring;
pub mod store;
pub mod stream;

// In-memory trait doubles for tests.
pub mod testing;

// ---- Re-exports for stable public API ----
pub use crate::config::PipelineConfig;
pub use crate::consumer::IngestionConsumer;
pub use crate::scoring::ScoringWorker;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Tracing init shared by the pipeline binaries. `RUST_LOG` wins; defaults to
/// `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}
