/*!
 * Embedding providers.
 *
 * The semantic similarity signal is optional and comes from an external
 * embedding service behind the [`EmbeddingProvider`] trait. The pipeline
 * degrades to lexical scoring when no provider is configured or a
 * provider call fails, so provider errors are never fatal to a job.
 */

pub mod mock;
pub mod ollama;

use async_trait::async_trait;

use crate::errors::ProviderError;

pub use mock::MockProvider;
pub use ollama::OllamaProvider;

/// How the text being embedded will be used. Retrieval-tuned models
/// expect different prefixes for the indexed side and the query side.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmbedRole {
    /// Reference text stored for lookup
    Document,
    /// Translated text being matched against references
    Query,
}

/// Interface to an embedding backend
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Provider name for logs and error messages
    fn name(&self) -> &str;

    /// Embed a single text into a vector
    async fn embed(&self, text: &str, role: EmbedRole) -> Result<Vec<f32>, ProviderError>;
}
