/*!
 * Deterministic in-process embedding provider for tests.
 */

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use crate::errors::ProviderError;

use super::{EmbedRole, EmbeddingProvider};

const MOCK_DIMENSIONS: usize = 32;

/// Hashes token content into a fixed-size vector. Texts sharing tokens
/// produce correlated vectors, so similarity ordering is meaningful
/// without any network dependency.
pub struct MockProvider {
    fail: bool,
}

impl MockProvider {
    pub fn new() -> Self {
        Self { fail: false }
    }

    /// Provider whose every call fails, for degradation tests
    pub fn failing() -> Self {
        Self { fail: true }
    }
}

impl Default for MockProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingProvider for MockProvider {
    fn name(&self) -> &str {
        "mock"
    }

    async fn embed(&self, text: &str, _role: EmbedRole) -> Result<Vec<f32>, ProviderError> {
        if self.fail {
            return Err(ProviderError::ConnectionError(
                "mock provider configured to fail".to_string(),
            ));
        }

        let mut vector = vec![0.0f32; MOCK_DIMENSIONS];
        for token in text.to_lowercase().split_whitespace() {
            let digest = Sha256::digest(token.as_bytes());
            let index = (digest[0] as usize) % MOCK_DIMENSIONS;
            vector[index] += 1.0;
        }

        let norm: f32 = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for value in &mut vector {
                *value /= norm;
            }
        } else {
            vector[0] = 1.0;
        }

        Ok(vector)
    }
}
