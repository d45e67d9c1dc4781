// src/stream.rs
//! Durable stream transport: an append-only, bounded, multi-consumer log with
//! consumer-group semantics. The pipeline publishes item drafts as JSON under
//! a single `payload` field; delivery is at-least-once, and the store's
//! idempotent insert absorbs redelivery.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::streams::{StreamMaxlen, StreamReadOptions, StreamReadReply};
use redis::AsyncCommands;

use crate::ingest::types::ItemDraft;

/// Name of the single field carrying the serialized draft.
const PAYLOAD_FIELD: &str = "payload";

/// Shared Redis connection for the stream and ledger clients. Constructed
/// once per process and passed into the components that need it.
pub async fn connect(redis_url: &str) -> Result<ConnectionManager> {
    let client = redis::Client::open(redis_url).context("parsing redis url")?;
    client
        .get_connection_manager()
        .await
        .context("connecting to redis")
}

/// One delivered message: broker-assigned id plus the raw payload. The
/// payload stays undecoded here so a malformed message fails at the consumer
/// (which then leaves it unacknowledged) instead of poisoning the whole read.
#[derive(Debug, Clone)]
pub struct StreamMessage {
    pub id: String,
    pub payload: String,
}

impl StreamMessage {
    pub fn decode(&self) -> Result<ItemDraft> {
        serde_json::from_str(&self.payload).context("deserializing item draft payload")
    }
}

#[async_trait]
pub trait DurableStream: Send + Sync {
    /// Append a draft; oldest messages may be trimmed once the approximate
    /// length cap is exceeded. Returns the broker-assigned message id.
    async fn publish(&self, draft: &ItemDraft) -> Result<String>;

    /// Create the consumer group if it does not exist. Idempotent: an
    /// already-exists response is not an error. Any other transport error
    /// propagates and is fatal to the calling process.
    async fn ensure_group(&self) -> Result<()>;

    /// Deliver up to `count` messages not yet delivered to any consumer in
    /// the group, blocking up to `block` if none are immediately available.
    async fn read_group(
        &self,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>>;

    /// Mark a delivery complete. Issued only after the write decision is
    /// final; an unacked message is redelivered on group recovery.
    async fn ack(&self, message_id: &str) -> Result<()>;
}

/// Redis Streams implementation (XADD/XGROUP/XREADGROUP/XACK).
pub struct RedisStream {
    conn: ConnectionManager,
    key: String,
    group: String,
    maxlen: usize,
}

impl RedisStream {
    pub fn new(conn: ConnectionManager, key: &str, group: &str, maxlen: usize) -> Self {
        Self {
            conn,
            key: key.to_string(),
            group: group.to_string(),
            maxlen,
        }
    }
}

#[async_trait]
impl DurableStream for RedisStream {
    async fn publish(&self, draft: &ItemDraft) -> Result<String> {
        let payload = serde_json::to_string(draft).context("serializing item draft")?;
        let mut conn = self.conn.clone();
        let id: String = conn
            .xadd_maxlen(
                &self.key,
                StreamMaxlen::Approx(self.maxlen),
                "*",
                &[(PAYLOAD_FIELD, payload.as_str())],
            )
            .await
            .with_context(|| format!("XADD to {}", self.key))?;
        Ok(id)
    }

    async fn ensure_group(&self) -> Result<()> {
        let mut conn = self.conn.clone();
        let created: redis::RedisResult<()> = conn
            .xgroup_create_mkstream(&self.key, &self.group, "$")
            .await;
        match created {
            Ok(()) => Ok(()),
            // Racing group creation is expected with competing consumers.
            Err(e) if e.code() == Some("BUSYGROUP") => Ok(()),
            Err(e) => Err(e).with_context(|| {
                format!("creating consumer group {} on {}", self.group, self.key)
            }),
        }
    }

    async fn read_group(
        &self,
        consumer: &str,
        count: usize,
        block: Duration,
    ) -> Result<Vec<StreamMessage>> {
        let opts = StreamReadOptions::default()
            .group(&self.group, consumer)
            .count(count)
            .block(block.as_millis() as usize);
        let mut conn = self.conn.clone();
        let reply: StreamReadReply = conn
            .xread_options(&[&self.key], &[">"], &opts)
            .await
            .with_context(|| format!("XREADGROUP on {}", self.key))?;

        let mut out = Vec::new();
        for key in reply.keys {
            for entry in key.ids {
                let payload = entry
                    .map
                    .get(PAYLOAD_FIELD)
                    .map(|v| redis::from_redis_value::<String>(v))
                    .transpose()
                    .context("reading payload field")?
                    .unwrap_or_default();
                out.push(StreamMessage {
                    id: entry.id,
                    payload,
                });
            }
        }
        Ok(out)
    }

    async fn ack(&self, message_id: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        let _: i64 = conn
            .xack(&self.key, &self.group, &[message_id])
            .await
            .with_context(|| format!("XACK {} on {}", message_id, self.key))?;
        Ok(())
    }
}
