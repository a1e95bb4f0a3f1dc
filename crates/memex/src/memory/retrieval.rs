//! Retrieval pipeline
//!
//! 1. Embed the query text (outside the store lock)
//! 2. Linear cosine scan restricted to the caller's session and user
//! 3. Greedy token-budget trim in rank order

use std::time::Instant;

use crate::error::{MemexError, Result};
use crate::memory::manager::{MemoryManager, require_non_empty};
use crate::memory::types::{Chunk, Metadata};
use crate::storage::ChunkFilter;

/// A retrieval request. Results never cross `session_id`/`user_id`.
#[derive(Debug, Clone)]
pub struct RetrievalQuery {
    pub text: String,
    pub session_id: String,
    pub user_id: String,
    /// Maximum number of candidates to rank, at least 1
    pub top_k: usize,
    /// Token budget for the accepted chunks
    pub max_tokens: usize,
    /// Additional exact-match conditions
    pub filter: Metadata,
}

/// A retrieved chunk with its relevance in [0, 1]
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub chunk: Chunk,
    /// `(cosine + 1) / 2`
    pub relevance_score: f32,
}

impl RetrievedChunk {
    pub fn from_similarity(chunk: Chunk, similarity: f32) -> Self {
        Self {
            chunk,
            relevance_score: ((similarity + 1.0) / 2.0).clamp(0.0, 1.0),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RetrievalResult {
    /// Accepted chunks, most relevant first
    pub chunks: Vec<RetrievedChunk>,
    /// Estimated tokens across `chunks`, never above the request budget
    pub total_tokens: usize,
    /// Wall-clock time of the retrieval, in milliseconds to two decimals
    pub query_time_ms: f64,
}

impl RetrievalQuery {
    fn validate(&self) -> Result<()> {
        if self.text.trim().is_empty() {
            return Err(MemexError::Validation("query must not be empty".to_string()));
        }
        require_non_empty("session_id", &self.session_id)?;
        require_non_empty("user_id", &self.user_id)?;
        if self.top_k == 0 {
            return Err(MemexError::Validation("top_k must be at least 1".to_string()));
        }
        Ok(())
    }
}

impl MemoryManager {
    /// Find the chunks most similar to `query.text` that fit the budget.
    ///
    /// Read-only: repeating a query against an unchanged store returns the
    /// same chunks in the same order.
    pub async fn retrieve(&self, query: RetrievalQuery) -> Result<RetrievalResult> {
        let started = Instant::now();
        query.validate()?;

        let preview: String = query.text.chars().take(50).collect();
        tracing::debug!(
            "Retrieving for session {} (top_k: {}, max_tokens: {}): {:?}",
            query.session_id,
            query.top_k,
            query.max_tokens,
            preview
        );

        let vector = self.embed_bounded(&query.text).await?;

        // Owner conditions are applied last so they always win
        let filter = ChunkFilter::new()
            .with_fields(query.filter)
            .with_session_id(query.session_id)
            .with_user_id(query.user_id);

        let scored = self.store.read().await.query(&vector, query.top_k, &filter)?;
        let ranked: Vec<RetrievedChunk> = scored
            .into_iter()
            .map(|s| RetrievedChunk::from_similarity(s.chunk, s.similarity))
            .collect();

        let optimized = self.optimizer.optimize(ranked, query.max_tokens);
        let query_time_ms = (started.elapsed().as_secs_f64() * 100_000.0).round() / 100.0;

        tracing::debug!(
            "Retrieved {} chunks ({} tokens) in {:.2}ms",
            optimized.chunks.len(),
            optimized.total_tokens,
            query_time_ms
        );

        Ok(RetrievalResult {
            chunks: optimized.chunks,
            total_tokens: optimized.total_tokens,
            query_time_ms,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::embedding::HashEmbedder;
    use crate::testing::{TEST_DIMENSION, ingest_request, retrieval_query, test_manager};

    #[test]
    fn test_relevance_maps_cosine_range() {
        let chunk = crate::testing::chunk_fixture("x", vec![1.0]);
        assert_eq!(RetrievedChunk::from_similarity(chunk.clone(), 1.0).relevance_score, 1.0);
        assert_eq!(RetrievedChunk::from_similarity(chunk.clone(), 0.0).relevance_score, 0.5);
        assert_eq!(RetrievedChunk::from_similarity(chunk, -1.0).relevance_score, 0.0);
    }

    #[tokio::test]
    async fn test_validation() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), Arc::new(HashEmbedder::new(TEST_DIMENSION)));

        let err = manager.retrieve(retrieval_query("  ")).await.unwrap_err();
        assert!(matches!(err, MemexError::Validation(_)));

        let mut query = retrieval_query("fox");
        query.top_k = 0;
        let err = manager.retrieve(query).await.unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[tokio::test]
    async fn test_empty_store_returns_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), Arc::new(HashEmbedder::new(TEST_DIMENSION)));

        let result = manager.retrieve(retrieval_query("anything")).await.unwrap();
        assert!(result.chunks.is_empty());
        assert_eq!(result.total_tokens, 0);
    }

    #[tokio::test]
    async fn test_metadata_filter_narrows_results() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), Arc::new(HashEmbedder::new(TEST_DIMENSION)));

        let mut rust = ingest_request("notes about ownership and borrowing");
        rust.metadata.insert("lang".to_string(), "rust".into());
        manager.ingest(rust).await.unwrap();

        let mut go = ingest_request("notes about goroutines and channels");
        go.metadata.insert("lang".to_string(), "go".into());
        manager.ingest(go).await.unwrap();

        let mut query = retrieval_query("notes");
        query.filter.insert("lang".to_string(), "go".into());
        let result = manager.retrieve(query).await.unwrap();

        assert_eq!(result.chunks.len(), 1);
        assert!(result.chunks[0].chunk.text.contains("goroutines"));
    }

    #[tokio::test]
    async fn test_filter_cannot_escape_session() {
        let dir = tempfile::tempdir().unwrap();
        let manager = test_manager(dir.path(), Arc::new(HashEmbedder::new(TEST_DIMENSION)));

        let mut other = ingest_request("secret plans of another session");
        other.session_id = "other-session".to_string();
        manager.ingest(other).await.unwrap();

        let mut query = retrieval_query("secret plans");
        query
            .filter
            .insert("session_id".to_string(), "other-session".into());
        let result = manager.retrieve(query).await.unwrap();
        assert!(result.chunks.is_empty());
    }
}
