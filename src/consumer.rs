// src/consumer.rs
//! Ingestion consumer: a competing member of one consumer group that drains
//! the durable stream into the item store. Acknowledges a message only once
//! the write decision is known; both a fresh row and a duplicate are
//! successful outcomes. An unexpected error leaves the message unacknowledged
//! so the transport redelivers it — safe, because the insert is idempotent.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use metrics::{counter, describe_counter};
use once_cell::sync::OnceCell;

use crate::store::{InsertOutcome, ItemStore};
use crate::stream::{DurableStream, StreamMessage};

fn ensure_metrics_described() {
    static ONCE: OnceCell<()> = OnceCell::new();
    ONCE.get_or_init(|| {
        describe_counter!("consume_ingested_total", "Item rows inserted.");
        describe_counter!("consume_duplicate_total", "Items skipped on conflict.");
        describe_counter!(
            "consume_failed_total",
            "Messages left unacknowledged after an unexpected error."
        );
    });
}

/// What one read batch produced. Failures stay on the stream for redelivery.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub read: usize,
    pub ingested: usize,
    pub duplicates: usize,
    pub failed: usize,
}

pub struct IngestionConsumer {
    stream: Arc<dyn DurableStream>,
    store: Arc<dyn ItemStore>,
    name: String,
    batch: usize,
    block: Duration,
}

impl IngestionConsumer {
    pub fn new(stream: Arc<dyn DurableStream>, store: Arc<dyn ItemStore>) -> Self {
        let suffix = uuid::Uuid::new_v4().simple().to_string();
        Self {
            stream,
            store,
            name: format!("c-{}", &suffix[..6]),
            batch: 50,
            block: Duration::from_secs(5),
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Ensure the group exists, then consume until the process is killed.
    pub async fn run(&self) -> Result<()> {
        self.stream.ensure_group().await?;
        tracing::info!(consumer = %self.name, "consuming");
        loop {
            let report = self.tick().await?;
            if report.read > 0 {
                tracing::debug!(
                    ingested = report.ingested,
                    duplicates = report.duplicates,
                    failed = report.failed,
                    "batch done"
                );
            }
        }
    }

    /// One block-read plus per-message processing. Transport errors propagate
    /// (fatal to the process); per-message errors are contained and counted.
    pub async fn tick(&self) -> Result<BatchReport> {
        ensure_metrics_described();

        let messages = self
            .stream
            .read_group(&self.name, self.batch, self.block)
            .await?;

        let mut report = BatchReport {
            read: messages.len(),
            ..BatchReport::default()
        };
        for msg in &messages {
            match self.process(msg).await {
                Ok(InsertOutcome::Inserted) => {
                    counter!("consume_ingested_total").increment(1);
                    report.ingested += 1;
                    self.stream.ack(&msg.id).await?;
                }
                Ok(InsertOutcome::Duplicate) => {
                    counter!("consume_duplicate_total").increment(1);
                    report.duplicates += 1;
                    self.stream.ack(&msg.id).await?;
                }
                Err(e) => {
                    // No ack: the message stays pending and is redelivered on
                    // group recovery.
                    tracing::warn!(message = %msg.id, error = ?e, "ingest failed, left pending");
                    counter!("consume_failed_total").increment(1);
                    report.failed += 1;
                }
            }
        }
        Ok(report)
    }

    async fn process(&self, msg: &StreamMessage) -> Result<InsertOutcome> {
        let draft = msg.decode()?;
        self.store.insert_item(&draft).await
    }
}
