/*!
 * Mock embedding providers for cross-language tests.
 *
 * The correlated provider maps tokens of either language onto shared
 * concept tokens before hashing, so a Spanish sentence and its English
 * counterpart embed to (nearly) the same vector. This stands in for a
 * real multilingual embedding model without network access.
 */

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use textgraft::errors::ProviderError;
use textgraft::providers::{EmbedRole, EmbeddingProvider};

const DIMENSIONS: usize = 32;

/// Spanish token -> English concept table for the test vocabulary
const CONCEPTS: &[(&str, &str)] = &[
    ("dios", "god"),
    ("concédeme", "grant"),
    ("concedeme", "grant"),
    ("que", "that"),
    ("pueda", "may"),
    ("servir", "serve"),
    ("tu", "thy"),
    ("causa", "cause"),
    ("oraciones", "prayers"),
    ("amor", "love"),
    ("firme", "steadfast"),
    ("niños", "children"),
    ("palabras", "words"),
    ("ocultas", "hidden"),
];

pub struct CorrelatedProvider;

impl CorrelatedProvider {
    pub fn new() -> Self {
        Self
    }

    fn concepts(text: &str) -> Vec<String> {
        text.to_lowercase()
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|token| {
                CONCEPTS
                    .iter()
                    .find(|(es, _)| *es == token)
                    .map(|(_, en)| en.to_string())
                    .unwrap_or_else(|| token.to_string())
            })
            .filter(|t| t.chars().count() >= 3)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for CorrelatedProvider {
    fn name(&self) -> &str {
        "correlated-mock"
    }

    async fn embed(&self, text: &str, _role: EmbedRole) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; DIMENSIONS];

        for concept in Self::concepts(text) {
            let digest = Sha256::digest(concept.as_bytes());
            vector[digest[0] as usize % DIMENSIONS] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm == 0.0 {
            vector[0] = 1.0;
        } else {
            for v in &mut vector {
                *v /= norm;
            }
        }

        Ok(vector)
    }
}
