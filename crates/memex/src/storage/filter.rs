//! Filter types for chunk search and deletion
//!
//! Filters narrow a linear scan by owner (session/user) and by exact-match
//! field values. All conditions are combined with AND logic.

use crate::memory::types::{Chunk, Metadata, MetadataValue};

/// Filter criteria for chunk operations.
///
/// `None` owner fields and an empty `fields` map apply no restriction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChunkFilter {
    /// Only chunks owned by this session
    pub session_id: Option<String>,
    /// Only chunks owned by this user
    pub user_id: Option<String>,
    /// Exact-match conditions on built-in fields or free-form metadata
    pub fields: Metadata,
}

impl ChunkFilter {
    /// Create a new empty filter (no filtering applied)
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session_id(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    pub fn with_user_id(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Require `key` to equal `value`
    pub fn with_field(mut self, key: impl Into<String>, value: impl Into<MetadataValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    /// Add every entry of `fields` as an exact-match condition
    pub fn with_fields(mut self, fields: Metadata) -> Self {
        self.fields.extend(fields);
        self
    }

    /// Check whether a chunk satisfies every condition
    pub fn matches(&self, chunk: &Chunk) -> bool {
        if let Some(ref session_id) = self.session_id {
            if chunk.session_id != *session_id {
                return false;
            }
        }

        if let Some(ref user_id) = self.user_id {
            if chunk.user_id != *user_id {
                return false;
            }
        }

        self.fields
            .iter()
            .all(|(key, expected)| chunk.field(key).as_ref() == Some(expected))
    }

    /// Check if this filter is empty (no conditions set)
    pub fn is_empty(&self) -> bool {
        self.session_id.is_none() && self.user_id.is_none() && self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk_fixture;

    fn owned_chunk(session_id: &str, user_id: &str) -> Chunk {
        let mut chunk = chunk_fixture("content", vec![1.0, 0.0]);
        chunk.session_id = session_id.to_string();
        chunk.user_id = user_id.to_string();
        chunk
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let filter = ChunkFilter::new();
        assert!(filter.is_empty());
        assert!(filter.matches(&owned_chunk("s1", "u1")));
    }

    #[test]
    fn test_owner_filters() {
        let chunk = owned_chunk("s1", "u1");

        assert!(ChunkFilter::new().with_session_id("s1").matches(&chunk));
        assert!(!ChunkFilter::new().with_session_id("s2").matches(&chunk));
        assert!(ChunkFilter::new().with_user_id("u1").matches(&chunk));
        assert!(!ChunkFilter::new().with_user_id("u2").matches(&chunk));

        let both = ChunkFilter::new().with_session_id("s1").with_user_id("u2");
        assert!(!both.matches(&chunk));
    }

    #[test]
    fn test_metadata_field_filter() {
        let mut chunk = owned_chunk("s1", "u1");
        chunk.metadata.insert("lang".to_string(), "rust".into());
        chunk.metadata.insert("stars".to_string(), 5_i64.into());

        assert!(ChunkFilter::new().with_field("lang", "rust").matches(&chunk));
        assert!(!ChunkFilter::new().with_field("lang", "go").matches(&chunk));
        assert!(ChunkFilter::new().with_field("stars", 5.0).matches(&chunk));
        // No coercion between value kinds
        assert!(!ChunkFilter::new().with_field("stars", "5").matches(&chunk));
        assert!(!ChunkFilter::new().with_field("missing", true).matches(&chunk));
    }

    #[test]
    fn test_builtin_field_filter() {
        let chunk = owned_chunk("s1", "u1");
        assert!(
            ChunkFilter::new()
                .with_field("source_type", "test")
                .matches(&chunk)
        );
        assert!(
            !ChunkFilter::new()
                .with_field("session_id", "other")
                .matches(&chunk)
        );
    }

    #[test]
    fn test_fields_cannot_widen_owner_scope() {
        let chunk = owned_chunk("s1", "u1");
        let filter = ChunkFilter::new()
            .with_field("session_id", "s1")
            .with_session_id("s2");
        assert!(!filter.matches(&chunk));
    }
}
