//! Memory types for the Memex system
//!
//! Defines the stored chunk record and the closed set of metadata values
//! that may be attached to it.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Metadata keys that name built-in chunk fields. Callers may filter on them
/// but may not supply them as free-form metadata.
pub const RESERVED_METADATA_KEYS: &[&str] = &[
    "id",
    "text",
    "source_type",
    "source_name",
    "session_id",
    "user_id",
    "timestamp",
    "chunk_index",
    "total_chunks",
];

/// A metadata value. Nested or null values are not representable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataValue {
    Bool(bool),
    Number(f64),
    String(String),
}

impl fmt::Display for MetadataValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataValue::Bool(b) => write!(f, "{b}"),
            MetadataValue::Number(n) => write!(f, "{n}"),
            MetadataValue::String(s) => f.write_str(s),
        }
    }
}

impl From<&str> for MetadataValue {
    fn from(value: &str) -> Self {
        MetadataValue::String(value.to_string())
    }
}

impl From<String> for MetadataValue {
    fn from(value: String) -> Self {
        MetadataValue::String(value)
    }
}

impl From<f64> for MetadataValue {
    fn from(value: f64) -> Self {
        MetadataValue::Number(value)
    }
}

impl From<i64> for MetadataValue {
    fn from(value: i64) -> Self {
        MetadataValue::Number(value as f64)
    }
}

impl From<bool> for MetadataValue {
    fn from(value: bool) -> Self {
        MetadataValue::Bool(value)
    }
}

/// Free-form chunk metadata, ordered by key so snapshots are stable.
pub type Metadata = BTreeMap<String, MetadataValue>;

/// The atomic stored unit: one redacted window of an ingested text plus its
/// embedding and provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique identifier, generated when the record is assembled
    pub id: Uuid,
    /// Post-redaction text
    pub text: String,
    /// Embedding vector; every chunk in a store shares its dimension
    pub vector: Vec<f32>,
    /// Kind of source (conversation, file, ...)
    pub source_type: String,
    /// Identifier of the source within its kind
    pub source_name: String,
    pub session_id: String,
    pub user_id: String,
    /// When the parent ingestion happened
    pub timestamp: DateTime<Utc>,
    /// Position within the parent ingestion
    pub chunk_index: usize,
    /// Number of chunks the parent ingestion produced
    pub total_chunks: usize,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    /// Look up a field by name for filtering: built-in fields first, then
    /// free-form metadata.
    pub fn field(&self, key: &str) -> Option<MetadataValue> {
        match key {
            "id" => Some(MetadataValue::String(self.id.to_string())),
            "source_type" => Some(MetadataValue::String(self.source_type.clone())),
            "source_name" => Some(MetadataValue::String(self.source_name.clone())),
            "session_id" => Some(MetadataValue::String(self.session_id.clone())),
            "user_id" => Some(MetadataValue::String(self.user_id.clone())),
            "timestamp" => Some(MetadataValue::String(self.timestamp.to_rfc3339())),
            "chunk_index" => Some(MetadataValue::Number(self.chunk_index as f64)),
            "total_chunks" => Some(MetadataValue::Number(self.total_chunks as f64)),
            _ => self.metadata.get(key).cloned(),
        }
    }
}
