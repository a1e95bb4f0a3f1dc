//! Remote embedder using OpenAI-compatible APIs
//!
//! Calls `POST {api_url}/v1/embeddings` with a bearer key read from the
//! environment variable named in the config. Failures are reported once;
//! the caller decides whether to retry.

use async_trait::async_trait;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::EmbeddingConfig;
use crate::embedding::Embedder;
use crate::error::{MemexError, Result};

pub const DEFAULT_API_URL: &str = "https://api.openai.com";
pub const DEFAULT_REMOTE_MODEL: &str = "text-embedding-3-small";

#[derive(Debug)]
pub struct RemoteEmbedder {
    client: Client,
    endpoint: Url,
    model: String,
    dimension: usize,
    api_key: Option<SecretString>,
}

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
}

/// Resolve the embeddings endpoint from a base URL. Accepts a bare host,
/// a versioned base (`.../v1`) or the full `.../embeddings` URL.
fn embeddings_endpoint(base_url: &str) -> Result<Url> {
    let normalized = base_url.trim_end_matches('/');
    let full = if normalized.ends_with("/embeddings") {
        normalized.to_string()
    } else if has_version_suffix(normalized) {
        format!("{normalized}/embeddings")
    } else {
        format!("{normalized}/v1/embeddings")
    };

    Url::parse(&full)
        .map_err(|e| MemexError::Config(format!("Invalid embedding api_url '{base_url}': {e}")))
}

fn has_version_suffix(base_url: &str) -> bool {
    let Some(last_segment) = base_url.rsplit('/').next() else {
        return false;
    };
    let Some(rest) = last_segment.strip_prefix('v') else {
        return false;
    };
    !rest.is_empty() && rest.chars().all(|c| c.is_ascii_digit())
}

impl RemoteEmbedder {
    pub fn new(
        api_url: &str,
        model: impl Into<String>,
        dimension: usize,
        api_key: Option<SecretString>,
    ) -> Result<Self> {
        let endpoint = embeddings_endpoint(api_url)?;
        let client = Client::builder()
            .build()
            .map_err(|e| MemexError::Embedding(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model: model.into(),
            dimension,
            api_key,
        })
    }

    /// Build from config, reading the key from `config.api_key_env`.
    ///
    /// A missing key is allowed for self-hosted endpoints without auth.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.is_empty())
            .map(SecretString::new);
        if api_key.is_none() {
            tracing::warn!(
                "Embedding API key env var '{}' not set, sending unauthenticated requests",
                config.api_key_env
            );
        }

        let api_url = config.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let model = config.model.as_deref().unwrap_or(DEFAULT_REMOTE_MODEL);
        let embedder = Self::new(api_url, model, config.dimension, api_key)?;

        tracing::info!(
            "RemoteEmbedder initialized with model: {}, endpoint: {}",
            embedder.model,
            embedder.endpoint
        );
        Ok(embedder)
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Embedder for RemoteEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: &self.model,
            input: vec![text],
        };

        let mut builder = self.client.post(self.endpoint.clone()).json(&request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key.expose_secret());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| MemexError::Embedding(format!("Embedding request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(MemexError::Embedding(format!(
                "Embedding API returned {status}: {snippet}"
            )));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| MemexError::Embedding(format!("Invalid embedding response: {e}")))?;

        parsed
            .data
            .into_iter()
            .next()
            .map(|d| d.embedding)
            .ok_or_else(|| MemexError::Embedding("Empty embedding response".to_string()))
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_from_host_base_uses_v1_embeddings() {
        assert_eq!(
            embeddings_endpoint("https://api.openai.com").unwrap().as_str(),
            "https://api.openai.com/v1/embeddings"
        );
    }

    #[test]
    fn test_endpoint_from_versioned_base() {
        assert_eq!(
            embeddings_endpoint("http://localhost:8080/v1/").unwrap().as_str(),
            "http://localhost:8080/v1/embeddings"
        );
        assert_eq!(
            embeddings_endpoint("https://example.com/api/v4").unwrap().as_str(),
            "https://example.com/api/v4/embeddings"
        );
    }

    #[test]
    fn test_endpoint_keeps_explicit_embeddings_url() {
        assert_eq!(
            embeddings_endpoint("https://example.com/v1/embeddings")
                .unwrap()
                .as_str(),
            "https://example.com/v1/embeddings"
        );
    }

    #[test]
    fn test_invalid_url_is_config_error() {
        assert!(matches!(
            embeddings_endpoint("not a url"),
            Err(MemexError::Config(_))
        ));
    }
}
