//! Memory Manager
//!
//! Owns the vector store behind a `tokio::sync::RwLock` together with the
//! chunker, redactor, embedder and optimizer. Ingestion lives in
//! `ingestion.rs` and retrieval in `retrieval.rs`; both are methods on
//! [`MemoryManager`].
//!
//! Embedding always happens outside the lock. Writers hold the lock across
//! the snapshot rewrite, so a reported success is already durable.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::RwLock;

use crate::config::Config;
use crate::embedding::Embedder;
use crate::error::{MemexError, Result};
use crate::memory::chunker::Chunker;
use crate::memory::optimizer::ContextOptimizer;
use crate::memory::redactor::Redactor;
use crate::storage::{ChunkFilter, StoreSettings, VectorStore};

/// Store statistics plus the embedding model that fills it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryStats {
    pub total_chunks: usize,
    pub embedding_model: String,
    pub embedding_dim: usize,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

pub struct MemoryManager {
    pub(crate) store: Arc<RwLock<VectorStore>>,
    pub(crate) embedder: Arc<dyn Embedder>,
    pub(crate) chunker: Chunker,
    pub(crate) redactor: Redactor,
    pub(crate) optimizer: ContextOptimizer,
    embed_timeout: Duration,
}

impl std::fmt::Debug for MemoryManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryManager")
            .field("embedding_model", &self.embedder.model_name())
            .field("chunker", &self.chunker)
            .field("optimizer", &self.optimizer)
            .field("embed_timeout", &self.embed_timeout)
            .finish_non_exhaustive()
    }
}

impl MemoryManager {
    /// Assemble a manager around an opened store.
    ///
    /// Chunking parameters are taken from the store's settings. The
    /// embedder must produce vectors of the store's dimension.
    pub fn new(
        store: VectorStore,
        embedder: Arc<dyn Embedder>,
        optimizer: ContextOptimizer,
        embed_timeout: Duration,
    ) -> Result<Self> {
        let settings = store.settings();
        if embedder.dimension() != settings.embedding_dim {
            return Err(MemexError::Config(format!(
                "embedder '{}' produces {} dimensions but the store holds {}",
                embedder.model_name(),
                embedder.dimension(),
                settings.embedding_dim
            )));
        }
        let chunker = Chunker::new(settings.chunk_size, settings.chunk_overlap)?;

        Ok(Self {
            store: Arc::new(RwLock::new(store)),
            embedder,
            chunker,
            redactor: Redactor::new(),
            optimizer,
            embed_timeout,
        })
    }

    /// Open the configured snapshot and wire it to `embedder`.
    pub fn from_config(config: &Config, embedder: Arc<dyn Embedder>) -> Result<Self> {
        // Reject bad chunking settings before touching the snapshot
        Chunker::new(config.chunking.chunk_size, config.chunking.chunk_overlap)?;
        let optimizer = ContextOptimizer::new(config.retrieval.chars_per_token)?;

        let settings = StoreSettings {
            embedding_dim: embedder.dimension(),
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
        };
        let path = config.snapshot_path();
        tracing::info!("Opening memory store at: {}", path.display());
        let store = VectorStore::open(&path, settings)?;

        Self::new(
            store,
            embedder,
            optimizer,
            Duration::from_secs(config.embedding.timeout_secs),
        )
    }

    pub fn chunker(&self) -> &Chunker {
        &self.chunker
    }

    pub fn optimizer(&self) -> &ContextOptimizer {
        &self.optimizer
    }

    pub fn embedder(&self) -> &Arc<dyn Embedder> {
        &self.embedder
    }

    pub async fn stats(&self) -> MemoryStats {
        let stats = self.store.read().await.stats();
        MemoryStats {
            total_chunks: stats.total_chunks,
            embedding_model: self.embedder.model_name().to_string(),
            embedding_dim: stats.embedding_dim,
            chunk_size: stats.chunk_size,
            chunk_overlap: stats.chunk_overlap,
        }
    }

    /// Delete chunks owned by `session_id` and/or `user_id`. With neither
    /// given, the whole store is cleared. Returns the number removed.
    pub async fn clear(&self, session_id: Option<&str>, user_id: Option<&str>) -> Result<usize> {
        let mut filter = ChunkFilter::new();
        if let Some(session_id) = session_id {
            require_non_empty("session_id", session_id)?;
            filter = filter.with_session_id(session_id);
        }
        if let Some(user_id) = user_id {
            require_non_empty("user_id", user_id)?;
            filter = filter.with_user_id(user_id);
        }

        let cleared = self.store.write().await.delete_where(&filter)?;
        tracing::info!(
            "Cleared {} chunks (session: {}, user: {})",
            cleared,
            session_id.unwrap_or("*"),
            user_id.unwrap_or("*")
        );
        Ok(cleared)
    }

    /// Save the store. Called once at shutdown.
    pub async fn flush(&self) -> Result<()> {
        let store = self.store.read().await;
        store.flush()?;
        tracing::info!("Flushed {} chunks to {}", store.len(), store.path().display());
        Ok(())
    }

    /// Embed `text` within the configured timeout and check the result
    /// against the store dimension.
    pub(crate) async fn embed_bounded(&self, text: &str) -> Result<Vec<f32>> {
        let vector = tokio::time::timeout(self.embed_timeout, self.embedder.embed(text))
            .await
            .map_err(|_| MemexError::EmbeddingTimeout(self.embed_timeout))??;

        let expected = self.embedder.dimension();
        if vector.len() != expected {
            return Err(MemexError::Embedding(format!(
                "embedder returned {} dimensions, expected {}",
                vector.len(),
                expected
            )));
        }
        if vector.iter().any(|v| !v.is_finite()) {
            return Err(MemexError::Embedding(
                "embedder returned non-finite values".to_string(),
            ));
        }
        Ok(vector)
    }
}

pub(crate) fn require_non_empty(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(MemexError::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}
