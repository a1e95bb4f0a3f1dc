//! Test utilities for memex - fixtures and scripted embedders
//!
//! Shared by the unit tests in this crate and the integration tests under
//! `tests/`:
//! - Chunk, request and manager fixtures backed by temporary directories
//! - Embedders with scripted behaviour (fixed output, failures, delays)

use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::embedding::Embedder;
use crate::error::{MemexError, Result};
use crate::memory::{
    Chunk, ContextOptimizer, IngestRequest, MemoryManager, Metadata, RetrievalQuery,
};
use crate::storage::{StoreSettings, VectorStore};

/// Dimension used by test embedders
pub const TEST_DIMENSION: usize = 64;

/// Embedding timeout used by test managers
pub const TEST_EMBED_TIMEOUT: Duration = Duration::from_millis(200);

/// A single-window chunk owned by session "s1" and user "u1".
pub fn chunk_fixture(text: &str, vector: Vec<f32>) -> Chunk {
    Chunk {
        id: Uuid::new_v4(),
        text: text.to_string(),
        vector,
        source_type: "test".to_string(),
        source_name: "fixture".to_string(),
        session_id: "s1".to_string(),
        user_id: "u1".to_string(),
        timestamp: Utc::now(),
        chunk_index: 0,
        total_chunks: 1,
        metadata: Metadata::new(),
    }
}

/// An ingestion of `content` for session "s1" and user "u1".
pub fn ingest_request(content: &str) -> IngestRequest {
    IngestRequest {
        content: content.to_string(),
        source_type: "conversation".to_string(),
        source_name: "chat".to_string(),
        session_id: "s1".to_string(),
        user_id: "u1".to_string(),
        metadata: Metadata::new(),
    }
}

/// A query for session "s1" and user "u1" with default limits.
pub fn retrieval_query(text: &str) -> RetrievalQuery {
    RetrievalQuery {
        text: text.to_string(),
        session_id: "s1".to_string(),
        user_id: "u1".to_string(),
        top_k: 5,
        max_tokens: 4000,
        filter: Metadata::new(),
    }
}

/// Manager over `dir/memory.json` with default chunking.
pub fn test_manager(dir: &Path, embedder: Arc<dyn Embedder>) -> MemoryManager {
    test_manager_with_chunking(dir, embedder, 512, 50)
}

pub fn test_manager_with_chunking(
    dir: &Path,
    embedder: Arc<dyn Embedder>,
    chunk_size: usize,
    chunk_overlap: usize,
) -> MemoryManager {
    let settings = StoreSettings {
        embedding_dim: embedder.dimension(),
        chunk_size,
        chunk_overlap,
    };
    let store = VectorStore::open(dir.join("memory.json"), settings)
        .expect("Failed to open test store");
    MemoryManager::new(
        store,
        embedder,
        ContextOptimizer::default(),
        TEST_EMBED_TIMEOUT,
    )
    .expect("Failed to build test manager")
}

/// Returns the same vector for every input.
#[derive(Debug, Clone)]
pub struct FixedEmbedder {
    dimension: usize,
    vector: Vec<f32>,
}

impl FixedEmbedder {
    /// `dimension` is what the embedder reports; `vector` is returned as is,
    /// so the two may disagree on purpose.
    pub fn new(dimension: usize, vector: Vec<f32>) -> Self {
        Self { dimension, vector }
    }
}

#[async_trait]
impl Embedder for FixedEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Ok(self.vector.clone())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "fixed"
    }
}

/// Succeeds for the first `successes` calls, then fails every call.
#[derive(Debug)]
pub struct FailingEmbedder {
    dimension: usize,
    successes: usize,
    calls: AtomicUsize,
}

impl FailingEmbedder {
    pub fn new(dimension: usize, successes: usize) -> Self {
        Self {
            dimension,
            successes,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Embedder for FailingEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.successes {
            let mut vector = vec![0.0; self.dimension];
            vector[call % self.dimension] = 1.0;
            Ok(vector)
        } else {
            Err(MemexError::Embedding("scripted failure".to_string()))
        }
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "failing"
    }
}

/// Sleeps for `delay` before answering with a unit vector.
#[derive(Debug, Clone)]
pub struct SlowEmbedder {
    dimension: usize,
    delay: Duration,
}

impl SlowEmbedder {
    pub fn new(dimension: usize, delay: Duration) -> Self {
        Self { dimension, delay }
    }
}

#[async_trait]
impl Embedder for SlowEmbedder {
    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        tokio::time::sleep(self.delay).await;
        let mut vector = vec![0.0; self.dimension];
        vector[0] = 1.0;
        Ok(vector)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_name(&self) -> &str {
        "slow"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn failing_embedder_counts_calls() {
        let embedder = FailingEmbedder::new(4, 2);
        assert!(embedder.embed("a").await.is_ok());
        assert!(embedder.embed("b").await.is_ok());
        assert!(embedder.embed("c").await.is_err());
        assert_eq!(embedder.calls(), 3);
    }

    #[tokio::test]
    async fn fixed_embedder_ignores_input() {
        let embedder = FixedEmbedder::new(2, vec![0.6, 0.8]);
        assert_eq!(embedder.embed("x").await.unwrap(), embedder.embed("y").await.unwrap());
    }
}
