// src/store.rs
//! Item store: relational persistence for ingested items and their sentiment
//! results. All writes are insert-or-ignore, which is what makes at-least-once
//! delivery and racing scoring workers safe.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;

use crate::ingest::types::ItemDraft;

/// Outcome of an idempotent insert. A duplicate is a normal outcome, counted
/// separately from failures — never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Inserted,
    Duplicate,
}

/// Sentiment label for a scored item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Label {
    Positive,
    Neutral,
    Negative,
}

impl Label {
    pub fn as_str(self) -> &'static str {
        match self {
            Label::Positive => "positive",
            Label::Neutral => "neutral",
            Label::Negative => "negative",
        }
    }

    /// Polarity sign applied to the scorer's confidence to form the signed
    /// score.
    pub fn sign(self) -> f64 {
        match self {
            Label::Positive => 1.0,
            Label::Neutral => 0.0,
            Label::Negative => -1.0,
        }
    }
}

/// At most one row per (item, model). `score` is signed: polarity from the
/// label, magnitude from the scorer's confidence.
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentResult {
    pub item_id: String,
    pub model: String,
    pub label: Label,
    pub score: f64,
    pub confidence: f64,
}

/// Projection handed to the scorer: the fields it needs, nothing else.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct UnscoredItem {
    pub id: String,
    pub title: String,
    pub body: String,
}

#[async_trait]
pub trait ItemStore: Send + Sync {
    /// Insert an item keyed by its content id. A conflicting id is skipped,
    /// not an error.
    async fn insert_item(&self, draft: &ItemDraft) -> Result<InsertOutcome>;

    /// Count of items with no sentiment result for `model` — the scoring
    /// backlog.
    async fn unscored_count(&self, model: &str) -> Result<u64>;

    /// Up to `limit` oldest unscored items for `model`, ordered by ingestion
    /// time ascending.
    async fn fetch_unscored(&self, model: &str, limit: usize) -> Result<Vec<UnscoredItem>>;

    /// Insert a sentiment result; a second write for the same (item, model)
    /// is a no-op.
    async fn insert_sentiment(&self, result: &SentimentResult) -> Result<InsertOutcome>;
}

/// Postgres-backed store.
pub struct PgItemStore {
    pool: PgPool,
}

impl PgItemStore {
    pub async fn connect(database_url: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .context("connecting to postgres")?;
        Ok(Self { pool })
    }

    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Run the embedded SQL migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("running migrations")?;
        Ok(())
    }
}

#[async_trait]
impl ItemStore for PgItemStore {
    async fn insert_item(&self, draft: &ItemDraft) -> Result<InsertOutcome> {
        let res = sqlx::query(
            r#"
            INSERT INTO items (id, source, url, title, body, tickers, ingested_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(&draft.id)
        .bind(&draft.source)
        .bind(&draft.url)
        .bind(&draft.title)
        .bind(&draft.body)
        .bind(&draft.tickers)
        .bind(draft.ingested_at)
        .execute(&self.pool)
        .await
        .context("inserting item")?;

        Ok(if res.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        })
    }

    async fn unscored_count(&self, model: &str) -> Result<u64> {
        let count: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM items i
            LEFT JOIN sentiments s ON s.item_id = i.id AND s.model = $1
            WHERE s.item_id IS NULL
            "#,
        )
        .bind(model)
        .fetch_one(&self.pool)
        .await
        .context("counting unscored items")?;
        Ok(count.max(0) as u64)
    }

    async fn fetch_unscored(&self, model: &str, limit: usize) -> Result<Vec<UnscoredItem>> {
        let rows = sqlx::query_as::<_, UnscoredItem>(
            r#"
            SELECT i.id, i.title, i.body
            FROM items i
            LEFT JOIN sentiments s ON s.item_id = i.id AND s.model = $1
            WHERE s.item_id IS NULL
            ORDER BY i.ingested_at ASC
            LIMIT $2
            "#,
        )
        .bind(model)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .context("fetching unscored items")?;
        Ok(rows)
    }

    async fn insert_sentiment(&self, result: &SentimentResult) -> Result<InsertOutcome> {
        let res = sqlx::query(
            r#"
            INSERT INTO sentiments (item_id, model, label, score, confidence)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (item_id, model) DO NOTHING
            "#,
        )
        .bind(&result.item_id)
        .bind(&result.model)
        .bind(result.label.as_str())
        .bind(result.score)
        .bind(result.confidence)
        .execute(&self.pool)
        .await
        .context("inserting sentiment")?;

        Ok(if res.rows_affected() == 1 {
            InsertOutcome::Inserted
        } else {
            InsertOutcome::Duplicate
        })
    }
}
