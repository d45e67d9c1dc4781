//! Ingestion consumer process: one competing member of the consumer group,
//! draining the stream into the item store with idempotent inserts.

use std::sync::Arc;

use anyhow::Result;

use tickstream::config::PipelineConfig;
use tickstream::consumer::IngestionConsumer;
use tickstream::metrics::Metrics;
use tickstream::store::PgItemStore;
use tickstream::stream::{self, RedisStream};

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    tickstream::init_tracing();

    let cfg = PipelineConfig::from_env()?;
    let metrics = Metrics::init()?;
    let metrics_addr = cfg.metrics_addr_or(9101);
    tokio::spawn(async move {
        if let Err(e) = metrics.serve(metrics_addr).await {
            tracing::error!(error = ?e, "metrics server failed");
        }
    });

    let store = PgItemStore::connect(&cfg.database_url).await?;
    store.migrate().await?;

    let conn = stream::connect(&cfg.redis_url).await?;
    let reader = Arc::new(RedisStream::new(
        conn,
        &cfg.stream_key,
        &cfg.consumer_group,
        cfg.stream_maxlen,
    ));

    let consumer = IngestionConsumer::new(reader, Arc::new(store));
    tracing::info!(
        stream = %cfg.stream_key,
        group = %cfg.consumer_group,
        consumer = consumer.name(),
        "consuming"
    );
    consumer.run().await
}
