//! Error types for Memex

use std::time::Duration;

use thiserror::Error;

/// Main error type for Memex operations
#[derive(Error, Debug)]
pub enum MemexError {
    /// Rejected input (empty content, bad `top_k`, invalid chunking settings, ...)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Missing or mismatched shared-secret key
    #[error("Authentication error: {0}")]
    Auth(String),

    /// Embedding adapter failed or returned an unusable vector
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Embedding adapter did not answer within the configured bound
    #[error("Embedding timed out after {0:?}")]
    EmbeddingTimeout(Duration),

    /// The whole HTTP request exceeded `server.request_timeout_secs`
    #[error("Request timed out after {0:?}")]
    RequestTimeout(Duration),

    /// Durable snapshot could not be read or written
    #[error("Storage error: {0}")]
    Storage(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl MemexError {
    /// Stable, machine-readable name of the error kind, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            MemexError::Validation(_) => "validation_error",
            MemexError::Auth(_) => "auth_error",
            MemexError::Embedding(_) => "embedding_error",
            MemexError::EmbeddingTimeout(_) => "embedding_timeout",
            MemexError::RequestTimeout(_) => "request_timeout",
            MemexError::Storage(_) => "storage_error",
            MemexError::Config(_) => "config_error",
            MemexError::Io(_) => "io_error",
            MemexError::Serialization(_) => "serialization_error",
            MemexError::Internal(_) => "internal_error",
        }
    }
}

/// Result type alias for Memex operations
pub type Result<T> = std::result::Result<T, MemexError>;
