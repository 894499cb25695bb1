// Copyright (c) 2024-present, fjall-rs
// This source code is licensed under both the Apache 2.0 and MIT License
// (found in the LICENSE-* files in the repository)

//! Keyword queries over archived containers.
//!
//! Ingestion and querying share one tokenizer, so a token that survived
//! into a bloom filter is always findable again. The router prefers the
//! template-routed FAST path and falls back to the bloom-screened packet
//! scan; both verify hits on the rendered line before emitting them.

mod router;

pub use router::{query_cold, query_hot, query_hot_lite_full};

use regex::Regex;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, LazyLock,
};

static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::expect_used)]
    let pattern = Regex::new("[a-z0-9_./:-]{2,}").expect("pattern is valid");

    pattern
});

/// Splits text into normalized keyword tokens.
///
/// Case-folded, two characters minimum, drawn from the punctuation
/// class `[a-z0-9_./:-]`. Both archive ingestion and queries use this,
/// so bloom probes never miss on normalization differences.
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();

    TOKEN_RE
        .find_iter(&lowered)
        .map(|m| m.as_str().to_owned())
        .collect()
}

/// Tokenizes and deduplicates, preserving first-seen order.
#[must_use]
pub fn tokenize_unique(text: &str) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();

    tokenize(text)
        .into_iter()
        .filter(|token| seen.insert(token.clone()))
        .collect()
}

/// Cooperative cancellation flag for long-running queries.
///
/// The engine checks the token at packet boundaries only; a cancelled
/// query returns its partial hits flagged as such, never an error.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Creates a token in the non-cancelled state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Requests cancellation.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    /// Returns `true` once cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Which path produced the hits of a query.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum QueryMode {
    /// Template-routed selective recall
    Fast,

    /// Bloom-screened packet scan
    Pfq1,

    /// Full decode + scan (containers without a query index)
    Scan,
}

impl std::fmt::Display for QueryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Self::Fast => "FAST",
                Self::Pfq1 => "PFQ1",
                Self::Scan => "SCAN",
            }
        )
    }
}

/// Result of one keyword query.
#[derive(Debug)]
pub struct QueryOutcome {
    /// Matching lines, in archive order per path
    pub hits: Vec<String>,

    /// Which path produced the hits
    pub mode: QueryMode,

    /// `true` if the query was cancelled and `hits` is partial
    pub cancelled: bool,

    /// Candidate event IDs the FAST path considered
    pub candidates: Vec<u32>,
}

/// Returns `true` if every token occurs in the case-folded line.
#[must_use]
pub fn line_matches_all(line: &str, tokens: &[String]) -> bool {
    let lowered = line.to_lowercase();
    tokens.iter().all(|token| lowered.contains(token.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_log::test;

    #[test]
    fn tokenizer_normalizes() {
        assert_eq!(
            vec!["exception", "in", "receiveblock", "blk_-123", "10.0.0.1:50010"],
            tokenize("Exception in receiveBlock (blk_-123) @ 10.0.0.1:50010"),
        );
    }

    #[test]
    fn tokenizer_drops_short_tokens() {
        assert_eq!(vec!["ab"], tokenize("a ab ! b"));
    }

    #[test]
    fn tokenizer_unique_preserves_order() {
        assert_eq!(
            vec!["block", "terminating"],
            tokenize_unique("block terminating BLOCK"),
        );
    }

    #[test]
    fn substring_verification_case_insensitive() {
        let tokens = tokenize("exception");
        assert!(line_matches_all("java.io.IOException: oh no", &tokens));
        assert!(!line_matches_all("all fine here", &tokens));
    }

    #[test]
    fn cancellation_token_flips_once() {
        let token = CancellationToken::new();
        let clone = token.clone();

        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
