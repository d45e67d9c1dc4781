// tests/ingest_publish.rs
// Poll cycle: dedup discipline and per-source failure isolation.

use anyhow::{bail, Result};
use async_trait::async_trait;

use tickstream::ingest::run_cycle;
use tickstream::ingest::types::{FeedEntry, SourceProvider};
use tickstream::testing::{MemoryLedger, MemoryStream};

struct StaticProvider {
    name: String,
    entries: Vec<FeedEntry>,
}

impl StaticProvider {
    fn new(name: &str, entries: Vec<FeedEntry>) -> Box<dyn SourceProvider> {
        Box::new(Self {
            name: name.to_string(),
            entries,
        })
    }
}

#[async_trait]
impl SourceProvider for StaticProvider {
    async fn fetch_latest(&self) -> Result<Vec<FeedEntry>> {
        Ok(self.entries.clone())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

struct BrokenProvider;

#[async_trait]
impl SourceProvider for BrokenProvider {
    async fn fetch_latest(&self) -> Result<Vec<FeedEntry>> {
        bail!("connection refused")
    }

    fn name(&self) -> &str {
        "broken"
    }
}

fn entry(url: &str, title: &str) -> FeedEntry {
    FeedEntry {
        url: url.to_string(),
        title: title.to_string(),
        body: String::new(),
    }
}

#[tokio::test]
async fn same_url_is_published_exactly_once() {
    let ledger = MemoryLedger::new();
    let stream = MemoryStream::new(10_000);
    let providers = vec![StaticProvider::new(
        "wire",
        vec![
            entry("http://x.com/a", "AAPL surges"),
            // same story republished with different case/whitespace
            entry("  HTTP://X.com/a ", "AAPL surges again"),
        ],
    )];

    let outcomes = run_cycle(&providers, &ledger, &stream).await.unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].published, 1);
    assert_eq!(outcomes[0].duplicates, 1);
    assert_eq!(ledger.len(), 1);
    assert_eq!(stream.published_len(), 1);

    // a later cycle sees the same feed content: nothing new
    let outcomes = run_cycle(&providers, &ledger, &stream).await.unwrap();
    assert_eq!(outcomes[0].published, 0);
    assert_eq!(outcomes[0].duplicates, 2);
    assert_eq!(ledger.len(), 1);
    assert_eq!(stream.published_len(), 1);
}

#[tokio::test]
async fn fetch_failure_skips_that_source_only() {
    let ledger = MemoryLedger::new();
    let stream = MemoryStream::new(10_000);
    let providers = vec![
        Box::new(BrokenProvider) as Box<dyn SourceProvider>,
        StaticProvider::new("wire", vec![entry("http://x.com/b", "TSLA slumps")]),
    ];

    let outcomes = run_cycle(&providers, &ledger, &stream).await.unwrap();
    assert_eq!(outcomes.len(), 2);
    assert!(outcomes[0].fetch_error.is_some());
    assert_eq!(outcomes[1].published, 1);
    assert_eq!(stream.published_len(), 1);
}

#[tokio::test]
async fn bounded_stream_trims_oldest() {
    let ledger = MemoryLedger::new();
    let stream = MemoryStream::new(3);
    let entries: Vec<FeedEntry> = (0..5)
        .map(|i| entry(&format!("http://x.com/{i}"), "headline"))
        .collect();
    let providers = vec![StaticProvider::new("wire", entries)];

    let outcomes = run_cycle(&providers, &ledger, &stream).await.unwrap();
    assert_eq!(outcomes[0].published, 5);
    // the ledger remembers everything; the stream keeps only the cap
    assert_eq!(ledger.len(), 5);
    assert_eq!(stream.published_len(), 3);
}
