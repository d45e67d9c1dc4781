// src/ledger.rs
//! Dedup ledger: a monotonic set of content ids that have ever been accepted
//! for publication. Add-if-absent only; entries are never removed. The ledger
//! suppresses republication — the store's uniqueness constraint, not the
//! ledger, is the source of truth for persistence.

use anyhow::{Context, Result};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;

#[async_trait]
pub trait DedupLedger: Send + Sync {
    /// Atomically test-and-set a content id. Returns true if the id was newly
    /// added (the caller should publish), false if it was already present.
    async fn try_claim(&self, content_id: &str) -> Result<bool>;
}

/// Redis SET-backed ledger shared by all pollers.
pub struct RedisLedger {
    conn: ConnectionManager,
    key: String,
}

impl RedisLedger {
    pub fn new(conn: ConnectionManager, key: &str) -> Self {
        Self {
            conn,
            key: key.to_string(),
        }
    }
}

#[async_trait]
impl DedupLedger for RedisLedger {
    async fn try_claim(&self, content_id: &str) -> Result<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = conn
            .sadd(&self.key, content_id)
            .await
            .context("SADD on dedup ledger")?;
        Ok(added == 1)
    }
}
