//! Embedding adapters
//!
//! The memory manager only sees the [`Embedder`] trait. Which adapter sits
//! behind it is decided by `[embedding] provider` in the config.

pub mod hash;
#[cfg(feature = "local-embeddings")]
pub mod local;
pub mod remote;

use std::sync::Arc;

use async_trait::async_trait;

use crate::config::{EmbeddingConfig, EmbeddingProvider};
use crate::error::{MemexError, Result};

pub use hash::HashEmbedder;
#[cfg(feature = "local-embeddings")]
pub use local::FastEmbedder;
pub use remote::RemoteEmbedder;

/// Text to fixed-length vector.
///
/// Every vector an embedder returns must have exactly `dimension()` entries.
#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    fn dimension(&self) -> usize;

    fn model_name(&self) -> &str;
}

/// Build the embedder selected by `config`.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if config.dimension == 0 {
        return Err(MemexError::Config(
            "embedding dimension must be greater than zero".to_string(),
        ));
    }

    let embedder: Arc<dyn Embedder> = match config.provider {
        EmbeddingProvider::Hash => Arc::new(HashEmbedder::new(config.dimension)),
        EmbeddingProvider::OpenAi => Arc::new(RemoteEmbedder::from_config(config)?),
        #[cfg(feature = "local-embeddings")]
        EmbeddingProvider::FastEmbed => Arc::new(FastEmbedder::from_config(config)?),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProvider::FastEmbed => {
            return Err(MemexError::Config(
                "provider \"fastembed\" requires building with the `local-embeddings` feature"
                    .to_string(),
            ));
        }
    };

    tracing::info!(
        "Embedding adapter ready: {} ({} dimensions)",
        embedder.model_name(),
        embedder.dimension()
    );
    Ok(embedder)
}
