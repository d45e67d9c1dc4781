// src/normalize.rs
//! Pure normalization helpers shared by every poller: ticker extraction,
//! URL normalization, and content-id derivation. No I/O, no state.

use once_cell::sync::Lazy;
use regex::Regex;
use sha2::{Digest, Sha256};
use std::collections::BTreeSet;

/// Candidate ticker token: a `$`-prefixed symbol in any case, or a bare
/// 1-5 letter all-caps run. Adjacency to other letters/digits is checked
/// outside the regex.
static TICKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\$[A-Za-z]{1,5}|[A-Z]{1,5}").unwrap());

/// Common acronyms that collide with valid symbols.
const TICKER_BLACKLIST: [&str; 7] = ["USA", "CEO", "EPS", "IPO", "GDP", "ETF", "SEC"];

/// Extract ticker symbols from free text. Cashtags match case-insensitively
/// and bare tokens only when written in caps; candidates adjacent to other
/// letters or digits are rejected, as are blacklisted acronyms. Output is
/// uppercased, sorted, and deduplicated.
pub fn extract_tickers(text: &str) -> Vec<String> {
    let bytes = text.as_bytes();

    let mut out: BTreeSet<String> = BTreeSet::new();
    for m in TICKER_RE.find_iter(text) {
        let clean_before = m.start() == 0 || !bytes[m.start() - 1].is_ascii_alphanumeric();
        let clean_after = m.end() == bytes.len() || !bytes[m.end()].is_ascii_alphanumeric();
        if !clean_before || !clean_after {
            continue;
        }
        let sym = m.as_str().trim_start_matches('$').to_uppercase();
        if sym.is_empty() || TICKER_BLACKLIST.contains(&sym.as_str()) {
            continue;
        }
        out.insert(sym);
    }
    out.into_iter().collect()
}

/// Normalize a URL for dedup purposes: trim whitespace, lowercase.
/// Empty input normalizes to the empty string, not an error.
pub fn normalize_url(url: &str) -> String {
    url.trim().to_lowercase()
}

/// Length of the hex prefix kept from the content hash. Doubles as the
/// item primary key width in the store schema.
pub const CONTENT_ID_LEN: usize = 32;

/// Derive the content id for a URL: SHA-256 of the normalized URL,
/// hex-encoded, truncated. Same normalized URL always yields the same id,
/// which is what makes the store-level insert idempotent even when the
/// ledger check race-loses.
pub fn content_id(url: &str) -> String {
    let digest = Sha256::digest(normalize_url(url).as_bytes());
    let mut out = String::with_capacity(CONTENT_ID_LEN);
    for b in digest.iter().take(CONTENT_ID_LEN / 2) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{b:02x}");
    }
    out
}

/// Clean feed-provided text: decode HTML entities, strip tags, collapse
/// whitespace, trim.
pub fn clean_text(s: &str) -> String {
    let mut out = html_escape::decode_html_entities(s).to_string();

    static RE_TAGS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)</?[^>]+>").unwrap());
    out = RE_TAGS.replace_all(&out, "").to_string();

    static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
    out = RE_WS.replace_all(&out, " ").to_string();

    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tickers_blacklist_and_case() {
        let got = extract_tickers("$AAPL beats on EPS, says CEO");
        assert_eq!(got, vec!["AAPL".to_string()]);
    }

    #[test]
    fn cashtags_match_any_case() {
        assert_eq!(extract_tickers("$tsla to the moon"), vec!["TSLA".to_string()]);
    }

    #[test]
    fn tickers_reject_adjacent_alnum() {
        assert!(extract_tickers("ABCDEF").is_empty());
        assert!(extract_tickers("X123ABC").is_empty());
        assert_eq!(extract_tickers("buy MSFT now"), vec!["MSFT".to_string()]);
    }

    #[test]
    fn tickers_sorted_and_deduped() {
        let got = extract_tickers("TSLA and $AAPL and tsla again");
        assert_eq!(got, vec!["AAPL".to_string(), "TSLA".to_string()]);
    }

    #[test]
    fn url_normalization_is_trim_plus_lowercase() {
        assert_eq!(normalize_url("  HTTP://X.com/A  "), "http://x.com/a");
        assert_eq!(normalize_url(""), "");
    }

    #[test]
    fn content_id_is_stable_and_truncated() {
        let a = content_id("http://x.com/a");
        let b = content_id("  HTTP://x.com/A ");
        assert_eq!(a, b);
        assert_eq!(a.len(), CONTENT_ID_LEN);
        assert_eq!(a, "acc79c8b808070ccd327257cca0e019e");
    }

    #[test]
    fn clean_text_strips_markup() {
        let s = "  <p>Fed holds&nbsp;rates</p>\n  steady ";
        assert_eq!(clean_text(s), "Fed holds rates steady");
    }
}
