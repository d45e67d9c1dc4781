// src/ingest/types.rs
use anyhow::Result;
use chrono::{DateTime, Utc};

use crate::normalize::{content_id, extract_tickers};

/// One entry as fetched from a feed, before dedup and id derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedEntry {
    pub url: String,
    pub title: String,
    pub body: String, // may be empty
}

/// The wire payload published to the durable stream: a fully derived,
/// immutable item draft. Serialized as JSON under the message's single
/// `payload` field.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ItemDraft {
    pub id: String,
    pub source: String, // e.g. "reddit:stocks" or a feed URL
    pub url: String,
    pub title: String,
    pub body: String,
    pub tickers: Vec<String>,
    pub ingested_at: DateTime<Utc>,
}

impl ItemDraft {
    /// Derive a draft from a fetched entry. Tickers come from title+body;
    /// the id is content-addressed from the URL.
    pub fn from_entry(source: &str, entry: &FeedEntry, ingested_at: DateTime<Utc>) -> Self {
        Self {
            id: content_id(&entry.url),
            source: source.to_string(),
            url: entry.url.clone(),
            title: entry.title.clone(),
            body: entry.body.clone(),
            tickers: extract_tickers(&format!("{} {}", entry.title, entry.body)),
            ingested_at,
        }
    }
}

#[async_trait::async_trait]
pub trait SourceProvider: Send + Sync {
    async fn fetch_latest(&self) -> Result<Vec<FeedEntry>>;
    /// Source tag stamped onto every item this provider yields.
    fn name(&self) -> &str;
}
