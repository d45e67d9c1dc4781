//! Source poller process: fetches the configured feeds, dedups by content id
//! against the shared ledger, and publishes accepted drafts to the stream.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;

use tickstream::config::{self, PipelineConfig};
use tickstream::ingest::scheduler::{spawn_poller, PollerCfg};
use tickstream::ledger::RedisLedger;
use tickstream::metrics::Metrics;
use tickstream::stream::{self, RedisStream};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tickstream::init_tracing();

    let cfg = PipelineConfig::from_env()?;
    let metrics = Metrics::init()?;
    let metrics_addr = cfg.metrics_addr_or(9100);
    tokio::spawn(async move {
        if let Err(e) = metrics.serve(metrics_addr).await {
            tracing::error!(error = ?e, "metrics server failed");
        }
    });

    let sources = config::load_sources_default()?;
    if sources.is_empty() {
        tracing::warn!("no sources configured, nothing to poll");
        return Ok(());
    }

    let client = reqwest::Client::builder()
        .timeout(Duration::from_secs(15))
        .build()?;
    let providers = sources.providers(&client);

    let conn = stream::connect(&cfg.redis_url).await?;
    let ledger = Arc::new(RedisLedger::new(conn.clone(), &cfg.ledger_key));
    let publisher = Arc::new(RedisStream::new(
        conn,
        &cfg.stream_key,
        &cfg.consumer_group,
        cfg.stream_maxlen,
    ));

    tracing::info!(
        sources = providers.len(),
        interval_secs = cfg.poll_interval.as_secs(),
        stream = %cfg.stream_key,
        "poller up"
    );

    spawn_poller(
        providers,
        ledger,
        publisher,
        PollerCfg {
            interval: cfg.poll_interval,
        },
    )
    .await?
}
