//! Ingestion pipeline
//!
//! validate -> chunk -> redact -> embed -> assemble -> store, all or nothing.

use std::borrow::Cow;

use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{MemexError, Result};
use crate::memory::manager::{MemoryManager, require_non_empty};
use crate::memory::types::{Chunk, Metadata, RESERVED_METADATA_KEYS};

/// A text to remember, with its provenance
#[derive(Debug, Clone)]
pub struct IngestRequest {
    pub content: String,
    pub source_type: String,
    pub source_name: String,
    pub session_id: String,
    pub user_id: String,
    pub metadata: Metadata,
}

/// Outcome of a successful ingestion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestReport {
    pub chunk_ids: Vec<Uuid>,
    pub chunks_stored: usize,
    /// Chunks discarded because redaction could not vouch for them
    pub chunks_dropped: usize,
}

impl IngestRequest {
    fn validate(&self) -> Result<()> {
        if self.content.trim().is_empty() {
            return Err(MemexError::Validation("content must not be empty".to_string()));
        }
        require_non_empty("source_type", &self.source_type)?;
        require_non_empty("source_name", &self.source_name)?;
        require_non_empty("session_id", &self.session_id)?;
        require_non_empty("user_id", &self.user_id)?;

        if let Some(key) = self
            .metadata
            .keys()
            .find(|key| RESERVED_METADATA_KEYS.contains(&key.as_str()))
        {
            return Err(MemexError::Validation(format!(
                "metadata key '{key}' is reserved"
            )));
        }
        Ok(())
    }
}

impl MemoryManager {
    /// Chunk, redact, embed and store `request.content`.
    ///
    /// Either every surviving chunk is persisted or none is: an embedding
    /// failure, a timeout or a failed snapshot write leaves the store as it
    /// was.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport> {
        request.validate()?;
        let content = request.content.as_str();

        // Whole-text pass catches secrets that straddle window boundaries.
        // Malformed text is scrubbed run by run instead; the windows that
        // still carry a malformed character are dropped below.
        let scrubbed = match self.redactor.redact(content) {
            Ok(text) => text,
            Err(e) => {
                tracing::debug!("Whole-text redaction rejected input ({e}), scrubbing segments");
                Cow::Owned(self.redactor.redact_segments(content))
            }
        };

        let mut texts = Vec::new();
        let mut chunks_dropped = 0;
        for (index, window) in self.chunker.split(&scrubbed).enumerate() {
            match self.redactor.redact(window) {
                Ok(text) => texts.push(text.into_owned()),
                Err(e) => {
                    chunks_dropped += 1;
                    tracing::warn!(
                        "Dropped chunk {} of {}:{}: {}",
                        index,
                        request.source_type,
                        request.source_name,
                        e
                    );
                }
            }
        }

        if texts.is_empty() {
            return Err(MemexError::Validation(
                "content empty after redaction".to_string(),
            ));
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for text in &texts {
            vectors.push(self.embed_bounded(text).await?);
        }

        let timestamp = Utc::now();
        let total_chunks = texts.len();
        let chunks: Vec<Chunk> = texts
            .into_iter()
            .zip(vectors)
            .enumerate()
            .map(|(chunk_index, (text, vector))| Chunk {
                id: Uuid::new_v4(),
                text,
                vector,
                source_type: request.source_type.clone(),
                source_name: request.source_name.clone(),
                session_id: request.session_id.clone(),
                user_id: request.user_id.clone(),
                timestamp,
                chunk_index,
                total_chunks,
                metadata: request.metadata.clone(),
            })
            .collect();

        let chunk_ids = self.store.write().await.store_batch(chunks)?;

        tracing::info!(
            "Ingested {} chunks from {}:{} (session: {}, dropped: {})",
            chunk_ids.len(),
            request.source_type,
            request.source_name,
            request.session_id,
            chunks_dropped
        );

        Ok(IngestReport {
            chunks_stored: chunk_ids.len(),
            chunk_ids,
            chunks_dropped,
        })
    }
}
