//! Memex - Semantic memory store for LLM applications
//!
//! Ingests text, splits it into overlapping chunks, redacts secrets, embeds
//! each chunk and keeps everything in a durable vector store. Retrieval ranks
//! chunks by cosine similarity within one session and user and trims the
//! result to a token budget.

pub mod api;
pub mod config;
pub mod embedding;
pub mod error;
pub mod memory;
pub mod storage;
pub mod testing;

pub use error::{MemexError, Result};
