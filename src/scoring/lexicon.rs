// src/scoring/lexicon.rs
//! Built-in lexicon scorer: word-weight scoring with a short negation window,
//! mapped onto the scorer capability. Keeps the pipeline runnable without an
//! external model service; heavier models plug in through the same trait.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::scoring::{RawScore, Scorer};
use crate::store::UnscoredItem;

static LEXICON: Lazy<HashMap<String, i32>> = Lazy::new(|| {
    let raw = include_str!("lexicon.json");
    serde_json::from_str::<HashMap<String, i32>>(raw).expect("valid sentiment lexicon")
});

#[derive(Debug, Clone, Default)]
pub struct LexiconScorer;

impl LexiconScorer {
    pub fn new() -> Self {
        Self
    }

    #[inline]
    fn word_weight(&self, w: &str) -> i32 {
        *LEXICON.get(w).unwrap_or(&0)
    }

    /// Sum lexicon weights over the tokens. A negator within the previous
    /// 1..=3 tokens inverts a word's sign.
    fn weigh(&self, text: &str) -> (i32, usize) {
        let tokens: Vec<String> = tokenize(text).collect();
        let mut total: i32 = 0;
        let mut hits: usize = 0;

        for i in 0..tokens.len() {
            let base = self.word_weight(tokens[i].as_str());
            if base == 0 {
                continue;
            }
            let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
            total += if negated { -base } else { base };
            hits += 1;
        }

        (total, hits)
    }

    /// Classify text into (raw label, confidence). Confidence grows with the
    /// weight magnitude and saturates below 1.0.
    pub fn classify(&self, text: &str) -> (&'static str, f64) {
        let (total, hits) = self.weigh(text);
        if total == 0 {
            // no signal at all is weaker evidence than cancelled-out signal
            return ("neutral", if hits == 0 { 0.5 } else { 0.6 });
        }
        let magnitude = f64::from(total.unsigned_abs());
        let confidence = magnitude / (magnitude + 3.0);
        if total > 0 {
            ("positive", confidence)
        } else {
            ("negative", confidence)
        }
    }
}

/// Title and body concatenated the way the model should read them.
fn prep(item: &UnscoredItem) -> String {
    let title = item.title.trim();
    let body = item.body.trim();
    if body.is_empty() {
        title.to_string()
    } else {
        format!("{title}. {body}")
    }
}

fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_ascii_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not" | "no" | "never" | "isn't" | "wasn't" | "aren't" | "won't" | "can't" | "cannot"
            | "without"
    )
}

#[async_trait]
impl Scorer for LexiconScorer {
    async fn score_batch(&self, items: &[UnscoredItem]) -> Result<Vec<RawScore>> {
        Ok(items
            .iter()
            .map(|item| {
                let (label, confidence) = self.classify(&prep(item));
                RawScore {
                    id: item.id.clone(),
                    label: label.to_string(),
                    confidence,
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_words_classify_positive() {
        let s = LexiconScorer::new();
        let (label, conf) = s.classify("AAPL beats estimates, shares surge");
        assert_eq!(label, "positive");
        assert!(conf > 0.5);
    }

    #[test]
    fn negation_flips_sign() {
        let s = LexiconScorer::new();
        let (label, _) = s.classify("profits");
        assert_eq!(label, "positive");
        let (label, _) = s.classify("no profits this quarter");
        assert_eq!(label, "negative");
    }

    #[test]
    fn unsignaled_text_is_weak_neutral() {
        let s = LexiconScorer::new();
        let (label, conf) = s.classify("company schedules annual meeting");
        assert_eq!(label, "neutral");
        assert!((conf - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn batch_preserves_order_and_ids() {
        let s = LexiconScorer::new();
        let items = vec![
            UnscoredItem {
                id: "one".into(),
                title: "shares crash".into(),
                body: String::new(),
            },
            UnscoredItem {
                id: "two".into(),
                title: "record rally".into(),
                body: String::new(),
            },
        ];
        let out = s.score_batch(&items).await.unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].id, "one");
        assert_eq!(out[0].label, "negative");
        assert_eq!(out[1].id, "two");
        assert_eq!(out[1].label, "positive");
    }
}
