// src/ingest/scheduler.rs
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;

use crate::ingest::types::SourceProvider;
use crate::ledger::DedupLedger;
use crate::stream::DurableStream;

#[derive(Clone, Copy, Debug)]
pub struct PollerCfg {
    pub interval: Duration,
}

/// Spawn the repeating poll loop. Each tick runs one cycle over every source;
/// a transport error ends the task with `Err` (the supervisor restarts the
/// process), while per-source fetch errors are already contained inside the
/// cycle.
pub fn spawn_poller(
    providers: Vec<Box<dyn SourceProvider>>,
    ledger: Arc<dyn DedupLedger>,
    stream: Arc<dyn DurableStream>,
    cfg: PollerCfg,
) -> JoinHandle<anyhow::Result<()>> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        loop {
            ticker.tick().await;
            let outcomes =
                crate::ingest::run_cycle(&providers, ledger.as_ref(), stream.as_ref()).await?;

            let published: usize = outcomes.iter().map(|o| o.published).sum();
            let duplicates: usize = outcomes.iter().map(|o| o.duplicates).sum();
            let errors = outcomes.iter().filter(|o| o.fetch_error.is_some()).count();
            tracing::info!(
                target: "ingest",
                published,
                duplicates,
                errors,
                "poll tick"
            );
        }
    })
}
