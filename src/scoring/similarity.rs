/*!
 * Lexical and semantic similarity scoring.
 *
 * Scores are convex combinations of cheap lexical signals (token-set
 * Jaccard, token-frequency cosine, length ratio) and, when an embedding
 * provider is configured, a semantic cosine signal. A score is always in
 * [0, 1]; the lexical signals alone stay language-sensitive, which is why
 * cross-language matching leans on the embedding signal and on title
 * equivalence rather than raw text overlap.
 */

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Result;
use log::warn;

use crate::providers::{EmbedRole, EmbeddingProvider};

/// Minimum character length for a token to count toward Jaccard overlap
const MIN_TOKEN_LEN: usize = 3;

/// Signal weights without an embedding provider
const LEXICAL_WEIGHTS: Weights = Weights {
    jaccard: 0.5,
    cosine: 0.3,
    length: 0.2,
    embedding: 0.0,
};

/// Signal weights with an embedding provider configured
const EMBEDDING_WEIGHTS: Weights = Weights {
    jaccard: 0.35,
    cosine: 0.2,
    length: 0.1,
    embedding: 0.35,
};

#[derive(Debug, Clone, Copy)]
struct Weights {
    jaccard: f64,
    cosine: f64,
    length: f64,
    embedding: f64,
}

/// Combines lexical signals (and optionally embeddings) into one score
pub struct SimilarityScorer {
    provider: Option<Arc<dyn EmbeddingProvider>>,
    calls: AtomicU64,
}

impl SimilarityScorer {
    /// Purely lexical scorer
    pub fn new() -> Self {
        Self {
            provider: None,
            calls: AtomicU64::new(0),
        }
    }

    /// Scorer that blends in a semantic embedding signal
    pub fn with_provider(provider: Arc<dyn EmbeddingProvider>) -> Self {
        Self {
            provider: Some(provider),
            calls: AtomicU64::new(0),
        }
    }

    /// Number of scoring calls made so far
    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    /// Lexical-only score in [0, 1]. Cheap enough for the inner loop of
    /// paragraph alignment.
    pub fn score(&self, a: &str, b: &str) -> f64 {
        self.calls.fetch_add(1, Ordering::Relaxed);

        let a = a.trim();
        let b = b.trim();
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let jaccard = jaccard_similarity(a, b);
        let cosine = cosine_similarity(a, b);
        let length = length_ratio(a, b);

        let w = LEXICAL_WEIGHTS;
        clamp01(w.jaccard * jaccard + w.cosine * cosine + w.length * length)
    }

    /// Full score, adding the embedding signal when a provider is
    /// configured. Falls back to the lexical score if the provider fails.
    pub async fn score_semantic(&self, a: &str, b: &str) -> f64 {
        let Some(provider) = &self.provider else {
            return self.score(a, b);
        };

        self.calls.fetch_add(1, Ordering::Relaxed);

        let a = a.trim();
        let b = b.trim();
        if a.is_empty() && b.is_empty() {
            return 1.0;
        }
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }

        let embedding = match self.embedding_signal(provider.as_ref(), a, b).await {
            Ok(value) => value,
            Err(e) => {
                warn!("Embedding provider failed, using lexical score only: {}", e);
                // Undo the double count from the lexical call below
                self.calls.fetch_sub(1, Ordering::Relaxed);
                return self.score(a, b);
            }
        };

        let jaccard = jaccard_similarity(a, b);
        let cosine = cosine_similarity(a, b);
        let length = length_ratio(a, b);

        let w = EMBEDDING_WEIGHTS;
        clamp01(
            w.jaccard * jaccard
                + w.cosine * cosine
                + w.length * length
                + w.embedding * embedding,
        )
    }

    async fn embedding_signal(
        &self,
        provider: &dyn EmbeddingProvider,
        a: &str,
        b: &str,
    ) -> Result<f64> {
        let va = provider.embed(a, EmbedRole::Query).await?;
        let vb = provider.embed(b, EmbedRole::Document).await?;
        Ok(clamp01(vector_cosine(&va, &vb)))
    }
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Lowercased alphanumeric tokens of a string
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| t.to_string())
        .collect()
}

/// Jaccard overlap of the token sets, ignoring very short tokens
fn jaccard_similarity(a: &str, b: &str) -> f64 {
    let set_a: HashSet<String> = tokenize(a)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect();
    let set_b: HashSet<String> = tokenize(b)
        .into_iter()
        .filter(|t| t.chars().count() >= MIN_TOKEN_LEN)
        .collect();

    if set_a.is_empty() && set_b.is_empty() {
        // Both texts are all short tokens; fall back to raw equality
        return if a == b { 1.0 } else { 0.0 };
    }
    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count() as f64;
    let union = set_a.union(&set_b).count() as f64;
    intersection / union
}

/// Cosine of the token-frequency vectors
fn cosine_similarity(a: &str, b: &str) -> f64 {
    let freq_a = frequencies(a);
    let freq_b = frequencies(b);

    if freq_a.is_empty() && freq_b.is_empty() {
        return if a == b { 1.0 } else { 0.0 };
    }
    if freq_a.is_empty() || freq_b.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0;
    for (token, count_a) in &freq_a {
        if let Some(count_b) = freq_b.get(token) {
            dot += (*count_a as f64) * (*count_b as f64);
        }
    }

    let norm_a: f64 = freq_a.values().map(|c| (*c as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b: f64 = freq_b.values().map(|c| (*c as f64).powi(2)).sum::<f64>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn frequencies(text: &str) -> HashMap<String, u32> {
    let mut freq = HashMap::new();
    for token in tokenize(text) {
        *freq.entry(token).or_insert(0) += 1;
    }
    freq
}

/// Ratio of the shorter character length to the longer
fn length_ratio(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count() as f64;
    let len_b = b.chars().count() as f64;
    if len_a == 0.0 && len_b == 0.0 {
        return 1.0;
    }
    len_a.min(len_b) / len_a.max(len_b)
}

fn vector_cosine(a: &[f32], b: &[f32]) -> f64 {
    if a.is_empty() || b.is_empty() || a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0f64;
    let mut norm_a = 0.0f64;
    let mut norm_b = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += (*x as f64) * (*y as f64);
        norm_a += (*x as f64).powi(2);
        norm_b += (*y as f64).powi(2);
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}
