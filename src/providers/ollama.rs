/*!
 * Ollama embedding provider.
 *
 * Talks to a local Ollama instance over its embeddings endpoint.
 * Retrieval-tuned models such as nomic-embed-text expect role prefixes
 * on the input text, which this provider adds per [`EmbedRole`].
 */

use std::time::Duration;

use async_trait::async_trait;
use log::debug;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::app_config::EmbeddingConfig;
use crate::errors::ProviderError;

use super::{EmbedRole, EmbeddingProvider};

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    prompt: String,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    embedding: Vec<f32>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: String,
}

pub struct OllamaProvider {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

impl OllamaProvider {
    pub fn new(config: &EmbeddingConfig) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| ProviderError::ConnectionError(e.to_string()))?;

        // Apply the default scheme before trimming slashes, so a bare
        // "http://" cannot collapse into a hostname
        let raw = config.endpoint.trim();
        let endpoint = if raw.starts_with("http://") || raw.starts_with("https://") {
            raw.to_string()
        } else {
            format!("http://{}", raw)
        };

        let url = Url::parse(&endpoint).map_err(|e| {
            ProviderError::ConnectionError(format!("invalid endpoint '{}': {}", endpoint, e))
        })?;
        if url.host_str().map_or(true, |h| h.is_empty()) {
            return Err(ProviderError::ConnectionError(format!(
                "invalid endpoint '{}': missing host",
                endpoint
            )));
        }

        Ok(Self {
            client,
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: config.model.clone(),
        })
    }

    fn prefixed(&self, text: &str, role: EmbedRole) -> String {
        // nomic-embed-text prefix convention; other models ignore it
        match role {
            EmbedRole::Document => format!("search_document: {}", text),
            EmbedRole::Query => format!("search_query: {}", text),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn embed(&self, text: &str, role: EmbedRole) -> Result<Vec<f32>, ProviderError> {
        let url = format!("{}/api/embeddings", self.endpoint);
        let request = EmbeddingRequest {
            model: &self.model,
            prompt: self.prefixed(text, role),
        };

        debug!("Requesting embedding from {} (model {})", url, self.model);

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    ProviderError::ConnectionError(e.to_string())
                } else {
                    ProviderError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = match response.json::<ErrorResponse>().await {
                Ok(body) => body.error,
                Err(_) => status.to_string(),
            };
            return Err(ProviderError::ApiError {
                status_code: status.as_u16(),
                message,
            });
        }

        let body: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))?;

        if body.embedding.is_empty() {
            return Err(ProviderError::ParseError(
                "provider returned an empty embedding".to_string(),
            ));
        }

        Ok(body.embedding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app_config::EmbeddingConfig;

    fn config() -> EmbeddingConfig {
        EmbeddingConfig {
            provider_type: "ollama".to_string(),
            model: "nomic-embed-text".to_string(),
            endpoint: "http://localhost:11434".to_string(),
            timeout_secs: 30,
        }
    }

    #[test]
    fn test_prefixed_shouldApplyRolePrefixes() {
        let provider = OllamaProvider::new(&config()).unwrap();
        assert_eq!(
            provider.prefixed("hello", EmbedRole::Query),
            "search_query: hello"
        );
        assert_eq!(
            provider.prefixed("hello", EmbedRole::Document),
            "search_document: hello"
        );
    }

    #[test]
    fn test_new_shouldTrimTrailingSlash() {
        let mut cfg = config();
        cfg.endpoint = "http://localhost:11434/".to_string();
        let provider = OllamaProvider::new(&cfg).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_new_shouldDefaultToHttpScheme() {
        let mut cfg = config();
        cfg.endpoint = "localhost:11434".to_string();
        let provider = OllamaProvider::new(&cfg).unwrap();
        assert_eq!(provider.endpoint, "http://localhost:11434");
    }

    #[test]
    fn test_new_shouldRejectUnparseableEndpoint() {
        let mut cfg = config();
        cfg.endpoint = "http://".to_string();
        assert!(OllamaProvider::new(&cfg).is_err());
    }

    #[test]
    fn test_new_schemeOnlyEndpoints_shouldNeverGainAHost() {
        // "http://" must not normalize into a URL whose host is "http"
        for endpoint in ["http://", "https://", "http:///", "   "] {
            let mut cfg = config();
            cfg.endpoint = endpoint.to_string();
            assert!(
                OllamaProvider::new(&cfg).is_err(),
                "endpoint '{}' was accepted",
                endpoint
            );
        }
    }
}
