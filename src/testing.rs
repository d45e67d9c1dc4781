// src/testing.rs
//! Test doubles for the pipeline's trait boundaries:
//! - `MemoryLedger` (DedupLedger) — HashSet-backed add-if-absent
//! - `MemoryStream` (DurableStream) — Vec-backed log with group cursor,
//!   pending/acked tracking, and a redelivery helper
//! - `MemoryStore` (ItemStore) — stateful in-memory items + sentiments,
//!   with per-id sentiment insert failure injection
//! - `StubScorer` / `FailingScorer` (Scorer)
//!
//! Used by integration tests to exercise the pipeline without Redis or
//! Postgres.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::time::Duration;

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::ingest::types::ItemDraft;
use crate::ledger::DedupLedger;
use crate::scoring::{RawScore, Scorer};
use crate::store::{InsertOutcome, ItemStore, SentimentResult, UnscoredItem};
use crate::stream::{DurableStream, StreamMessage};

// ---------------------------------------------------------------------------
// MemoryLedger
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryLedger {
    seen: Mutex<HashSet<String>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.seen.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DedupLedger for MemoryLedger {
    async fn try_claim(&self, content_id: &str) -> Result<bool> {
        Ok(self.seen.lock().unwrap().insert(content_id.to_string()))
    }
}

// ---------------------------------------------------------------------------
// MemoryStream
// ---------------------------------------------------------------------------

#[derive(Default)]
struct StreamInner {
    entries: Vec<StreamMessage>,
    next_id: u64,
    cursor: usize,
    pending: HashSet<String>,
    acked: HashSet<String>,
    group_created: bool,
}

/// In-memory bounded log with single-group consumer semantics. `read_group`
/// returns immediately (the block duration is ignored); redelivery after a
/// simulated consumer crash is triggered explicitly via
/// `redeliver_pending()`.
pub struct MemoryStream {
    inner: Mutex<StreamInner>,
    maxlen: usize,
}

impl MemoryStream {
    pub fn new(maxlen: usize) -> Self {
        Self {
            inner: Mutex::new(StreamInner::default()),
            maxlen,
        }
    }

    /// Publish a raw payload directly, bypassing draft serialization. Lets
    /// tests inject malformed messages.
    pub fn publish_raw(&self, payload: &str) -> String {
        let mut inner = self.inner.lock().unwrap();
        push_entry(&mut inner, self.maxlen, payload.to_string())
    }

    pub fn published_len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn pending_len(&self) -> usize {
        self.inner.lock().unwrap().pending.len()
    }

    pub fn acked_len(&self) -> usize {
        self.inner.lock().unwrap().acked.len()
    }

    /// Make delivered-but-unacked messages readable again, as a group
    /// recovery would.
    pub fn redeliver_pending(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.pending.is_empty() {
            return;
        }
        let first_pending = inner
            .entries
            .iter()
            .position(|e| inner.pending.contains(&e.id));
        if let Some(pos) = first_pending {
            inner.cursor = pos;
            inner.pending.clear();
        }
    }
}

fn push_entry(inner: &mut StreamInner, maxlen: usize, payload: String) -> String {
    inner.next_id += 1;
    let id = format!("{}-0", inner.next_id);
    inner.entries.push(StreamMessage {
        id: id.clone(),
        payload,
    });
    if inner.entries.len() > maxlen {
        let excess = inner.entries.len() - maxlen;
        inner.entries.drain(..excess);
        inner.cursor = inner.cursor.saturating_sub(excess);
    }
    id
}

#[async_trait]
impl DurableStream for MemoryStream {
    async fn publish(&self, draft: &ItemDraft) -> Result<String> {
        let payload = serde_json::to_string(draft)?;
        let mut inner = self.inner.lock().unwrap();
        Ok(push_entry(&mut inner, self.maxlen, payload))
    }

    async fn ensure_group(&self) -> Result<()> {
        self.inner.lock().unwrap().group_created = true;
        Ok(())
    }

    async fn read_group(
        &self,
        _consumer: &str,
        count: usize,
        _block: Duration,
    ) -> Result<Vec<StreamMessage>> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.group_created {
            bail!("consumer group not created");
        }
        let start = inner.cursor;
        let end = (start + count).min(inner.entries.len());
        let batch: Vec<StreamMessage> = inner.entries[start..end]
            .iter()
            .filter(|e| !inner.acked.contains(&e.id))
            .cloned()
            .collect();
        inner.cursor = end;
        for msg in &batch {
            inner.pending.insert(msg.id.clone());
        }
        Ok(batch)
    }

    async fn ack(&self, message_id: &str) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if !inner.pending.remove(message_id) {
            bail!("ack for message not pending: {message_id}");
        }
        inner.acked.insert(message_id.to_string());
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryStore {
    items: Mutex<Vec<ItemDraft>>,
    sentiments: Mutex<Vec<SentimentResult>>,
    fail_sentiment_ids: Mutex<HashSet<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `insert_sentiment` fail for a specific item id.
    pub fn fail_sentiment_for(&self, item_id: &str) {
        self.fail_sentiment_ids
            .lock()
            .unwrap()
            .insert(item_id.to_string());
    }

    pub fn items_len(&self) -> usize {
        self.items.lock().unwrap().len()
    }

    pub fn sentiments(&self) -> Vec<SentimentResult> {
        self.sentiments.lock().unwrap().clone()
    }

    pub fn sentiment_for(&self, item_id: &str, model: &str) -> Option<SentimentResult> {
        self.sentiments
            .lock()
            .unwrap()
            .iter()
            .find(|s| s.item_id == item_id && s.model == model)
            .cloned()
    }
}

#[async_trait]
impl ItemStore for MemoryStore {
    async fn insert_item(&self, draft: &ItemDraft) -> Result<InsertOutcome> {
        let mut items = self.items.lock().unwrap();
        if items.iter().any(|i| i.id == draft.id) {
            return Ok(InsertOutcome::Duplicate);
        }
        items.push(draft.clone());
        Ok(InsertOutcome::Inserted)
    }

    async fn unscored_count(&self, model: &str) -> Result<u64> {
        let items = self.items.lock().unwrap();
        let sentiments = self.sentiments.lock().unwrap();
        let count = items
            .iter()
            .filter(|i| {
                !sentiments
                    .iter()
                    .any(|s| s.item_id == i.id && s.model == model)
            })
            .count();
        Ok(count as u64)
    }

    async fn fetch_unscored(&self, model: &str, limit: usize) -> Result<Vec<UnscoredItem>> {
        let items = self.items.lock().unwrap();
        let sentiments = self.sentiments.lock().unwrap();
        let mut unscored: Vec<&ItemDraft> = items
            .iter()
            .filter(|i| {
                !sentiments
                    .iter()
                    .any(|s| s.item_id == i.id && s.model == model)
            })
            .collect();
        unscored.sort_by_key(|i| i.ingested_at);
        Ok(unscored
            .into_iter()
            .take(limit)
            .map(|i| UnscoredItem {
                id: i.id.clone(),
                title: i.title.clone(),
                body: i.body.clone(),
            })
            .collect())
    }

    async fn insert_sentiment(&self, result: &SentimentResult) -> Result<InsertOutcome> {
        if self
            .fail_sentiment_ids
            .lock()
            .unwrap()
            .contains(&result.item_id)
        {
            return Err(anyhow!("injected insert failure for {}", result.item_id));
        }
        let mut sentiments = self.sentiments.lock().unwrap();
        if sentiments
            .iter()
            .any(|s| s.item_id == result.item_id && s.model == result.model)
        {
            return Ok(InsertOutcome::Duplicate);
        }
        sentiments.push(result.clone());
        Ok(InsertOutcome::Inserted)
    }
}

// ---------------------------------------------------------------------------
// Scorers
// ---------------------------------------------------------------------------

/// Returns the same (label, confidence) for every item, ids preserved in
/// order.
pub struct StubScorer {
    pub label: String,
    pub confidence: f64,
}

impl StubScorer {
    pub fn new(label: &str, confidence: f64) -> Self {
        Self {
            label: label.to_string(),
            confidence,
        }
    }
}

#[async_trait]
impl Scorer for StubScorer {
    async fn score_batch(&self, items: &[UnscoredItem]) -> Result<Vec<RawScore>> {
        Ok(items
            .iter()
            .map(|i| RawScore {
                id: i.id.clone(),
                label: self.label.clone(),
                confidence: self.confidence,
            })
            .collect())
    }
}

/// Fails every batch call, as an unavailable scorer would.
pub struct FailingScorer;

#[async_trait]
impl Scorer for FailingScorer {
    async fn score_batch(&self, _items: &[UnscoredItem]) -> Result<Vec<RawScore>> {
        bail!("scorer unavailable")
    }
}

/// Convenience: a draft with a fixed ingestion time, derived the same way the
/// poller derives it.
pub fn draft(source: &str, url: &str, title: &str, body: &str, at: chrono::DateTime<chrono::Utc>) -> ItemDraft {
    ItemDraft::from_entry(
        source,
        &crate::ingest::types::FeedEntry {
            url: url.to_string(),
            title: title.to_string(),
            body: body.to_string(),
        },
        at,
    )
}
