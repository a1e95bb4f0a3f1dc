//! Memory types and operations
//!
//! Chunking, redaction and budget trimming are plain synchronous building
//! blocks; the [`MemoryManager`] strings them together around the store and
//! the embedder.

pub mod chunker;
pub mod ingestion;
pub mod manager;
pub mod optimizer;
pub mod redactor;
pub mod retrieval;
pub mod types;

pub use chunker::{ChunkWindows, Chunker};
pub use ingestion::{IngestReport, IngestRequest};
pub use manager::{MemoryManager, MemoryStats};
pub use optimizer::{ContextOptimizer, OptimizedContext};
pub use redactor::{REDACTED_PLACEHOLDER, RedactionError, Redactor};
pub use retrieval::{RetrievalQuery, RetrievalResult, RetrievedChunk};
pub use types::{Chunk, Metadata, MetadataValue, RESERVED_METADATA_KEYS};
