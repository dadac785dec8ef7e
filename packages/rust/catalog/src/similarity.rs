//! Similarity scoring for fuzzy duplicate detection.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

use reelsmith_shared::{CandidateRecord, DedupStrategy};

/// A deterministic, symmetric text similarity with scores in `[0, 1]`.
pub trait TextSimilarity: Send + Sync {
    fn score(&self, a: &str, b: &str) -> f64;

    /// Human-readable name for tracing.
    fn name(&self) -> &str;
}

/// Jaccard index of the lower-cased word-token sets.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokenJaccard;

impl TokenJaccard {
    fn tokens(text: &str) -> HashSet<String> {
        static WORD_RE: LazyLock<Regex> =
            LazyLock::new(|| Regex::new(r"\w+").expect("valid regex"));

        WORD_RE
            .find_iter(&text.to_lowercase())
            .map(|m| m.as_str().to_string())
            .collect()
    }
}

impl TextSimilarity for TokenJaccard {
    fn score(&self, a: &str, b: &str) -> f64 {
        let left = Self::tokens(a);
        let right = Self::tokens(b);
        if left.is_empty() || right.is_empty() {
            return 0.0;
        }

        let intersection = left.intersection(&right).count();
        let union = left.union(&right).count();
        intersection as f64 / union as f64
    }

    fn name(&self) -> &str {
        "token_jaccard"
    }
}

/// Scores a pair of records according to a [`DedupStrategy`].
pub struct RecordScorer {
    strategy: DedupStrategy,
    text: Box<dyn TextSimilarity>,
}

impl std::fmt::Debug for RecordScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordScorer")
            .field("strategy", &self.strategy)
            .field("text", &self.text.name())
            .finish()
    }
}

impl RecordScorer {
    pub fn new(strategy: DedupStrategy) -> Self {
        Self::with_similarity(strategy, Box::new(TokenJaccard))
    }

    /// Use a different text similarity for the title component.
    pub fn with_similarity(strategy: DedupStrategy, text: Box<dyn TextSimilarity>) -> Self {
        Self { strategy, text }
    }

    pub fn strategy(&self) -> DedupStrategy {
        self.strategy
    }

    pub fn score(&self, a: &CandidateRecord, b: &CandidateRecord) -> f64 {
        let title = self.text.score(&a.title, &b.title);
        match self.strategy {
            DedupStrategy::Title => title,
            DedupStrategy::Metadata => {
                title * 0.6
                    + duration_similarity(a.duration_seconds, b.duration_seconds) * 0.3
                    + channel_similarity(&a.channel_title, &b.channel_title) * 0.1
            }
        }
    }
}

/// `1 - |Δ|/max`, lifted to 0.9 when the gap is at most 30s; 0.5 if either is unknown.
fn duration_similarity(a: u64, b: u64) -> f64 {
    if a == 0 || b == 0 {
        return 0.5;
    }
    let diff = a.abs_diff(b);
    let similarity = 1.0 - diff as f64 / a.max(b) as f64;
    if diff <= 30 { similarity.max(0.9) } else { similarity }
}

fn channel_similarity(a: &str, b: &str) -> f64 {
    if a.to_lowercase() == b.to_lowercase() { 1.0 } else { 0.0 }
}
