// src/ingest/providers/reddit.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use metrics::{counter, histogram};
use quick_xml::de::from_str;
use serde::Deserialize;

use crate::ingest::types::{FeedEntry, SourceProvider};
use crate::normalize::clean_text;

const USER_AGENT: &str = concat!("tickstream/", env!("CARGO_PKG_VERSION"));

// Reddit serves Atom at /new/.rss, not RSS 2.0.
#[derive(Debug, Deserialize)]
struct Feed {
    #[serde(rename = "entry", default)]
    entry: Vec<Entry>,
}

#[derive(Debug, Deserialize)]
struct Entry {
    title: Option<String>,
    link: Option<Link>,
    content: Option<AtomContent>,
}

#[derive(Debug, Deserialize)]
struct Link {
    #[serde(rename = "@href")]
    href: Option<String>,
}

// <content type="html">…</content> — the attribute forces a struct.
#[derive(Debug, Deserialize)]
struct AtomContent {
    #[serde(rename = "$text")]
    value: Option<String>,
}

enum Content {
    Remote { client: reqwest::Client, sub: String },
    Fixture(String),
}

/// Polls a subreddit's "new" feed. Source tag is `reddit:<sub>`.
pub struct RedditProvider {
    name: String,
    content: Content,
}

impl RedditProvider {
    pub fn new(client: reqwest::Client, subreddit: &str) -> Self {
        Self {
            name: format!("reddit:{subreddit}"),
            content: Content::Remote {
                client,
                sub: subreddit.to_string(),
            },
        }
    }

    /// Parse canned Atom XML instead of fetching. Test constructor.
    pub fn from_fixture(subreddit: &str, xml: &str) -> Self {
        Self {
            name: format!("reddit:{subreddit}"),
            content: Content::Fixture(xml.to_string()),
        }
    }

    async fn feed_xml(&self) -> Result<String> {
        match &self.content {
            Content::Remote { client, sub } => {
                let url = format!("https://www.reddit.com/r/{sub}/new/.rss");
                let resp = client
                    .get(&url)
                    .header(reqwest::header::USER_AGENT, USER_AGENT)
                    .send()
                    .await
                    .with_context(|| format!("fetching {url}"))?;
                resp.error_for_status_ref()
                    .with_context(|| format!("{url} returned error status"))?;
                Ok(resp.text().await.context("reading reddit feed body")?)
            }
            Content::Fixture(xml) => Ok(xml.clone()),
        }
    }
}

#[async_trait]
impl SourceProvider for RedditProvider {
    async fn fetch_latest(&self) -> Result<Vec<FeedEntry>> {
        let xml = self.feed_xml().await?;

        let t0 = std::time::Instant::now();
        let feed: Feed = from_str(&xml).context("parsing reddit atom xml")?;

        let mut out = Vec::with_capacity(feed.entry.len());
        for e in feed.entry {
            let url = e
                .link
                .and_then(|l| l.href)
                .unwrap_or_default()
                .trim()
                .to_string();
            if url.is_empty() {
                continue;
            }
            let body = e.content.and_then(|c| c.value).unwrap_or_default();
            out.push(FeedEntry {
                url,
                title: clean_text(&e.title.unwrap_or_default()),
                body: clean_text(&body),
            });
        }

        histogram!("ingest_parse_ms").record(t0.elapsed().as_secs_f64() * 1_000.0);
        counter!("ingest_fetched_total").increment(out.len() as u64);

        Ok(out)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
