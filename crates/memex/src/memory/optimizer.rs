//! Context Optimizer
//!
//! Trims a ranked result list to a token budget and formats the survivors
//! for inclusion in a prompt.

use chrono::SecondsFormat;

use crate::error::{MemexError, Result};
use crate::memory::retrieval::RetrievedChunk;

/// Default characters-per-token ratio for the token estimate
pub const DEFAULT_CHARS_PER_TOKEN: f64 = 4.0;

/// Result of fitting a ranked list into a token budget
#[derive(Debug, Clone, Default)]
pub struct OptimizedContext {
    /// Accepted chunks, in their original rank order
    pub chunks: Vec<RetrievedChunk>,
    /// Sum of the token estimates of `chunks`
    pub total_tokens: usize,
}

/// Greedy, order-preserving token budget enforcement.
#[derive(Debug, Clone, Copy)]
pub struct ContextOptimizer {
    chars_per_token: f64,
}

impl Default for ContextOptimizer {
    fn default() -> Self {
        Self {
            chars_per_token: DEFAULT_CHARS_PER_TOKEN,
        }
    }
}

impl ContextOptimizer {
    pub fn new(chars_per_token: f64) -> Result<Self> {
        if !chars_per_token.is_finite() || chars_per_token <= 0.0 {
            return Err(MemexError::Validation(format!(
                "chars_per_token must be a positive number, got {chars_per_token}"
            )));
        }
        Ok(Self { chars_per_token })
    }

    /// Estimate token count as characters divided by the configured ratio,
    /// rounded down.
    #[inline]
    pub fn estimate_tokens(&self, text: &str) -> usize {
        (text.chars().count() as f64 / self.chars_per_token) as usize
    }

    /// Walk `ranked` in order and keep chunks while the running total stays
    /// within `max_tokens`. Stops at the first chunk that does not fit.
    pub fn optimize(&self, ranked: Vec<RetrievedChunk>, max_tokens: usize) -> OptimizedContext {
        let candidates = ranked.len();
        let mut total_tokens = 0;
        let mut chunks = Vec::with_capacity(candidates);

        for retrieved in ranked {
            let tokens = self.estimate_tokens(&retrieved.chunk.text);
            if total_tokens + tokens > max_tokens {
                break;
            }
            total_tokens += tokens;
            chunks.push(retrieved);
        }

        tracing::debug!(
            "Optimized {} chunks to {} ({}/{} tokens)",
            candidates,
            chunks.len(),
            total_tokens,
            max_tokens
        );

        OptimizedContext {
            chunks,
            total_tokens,
        }
    }

    /// Concatenate chunk texts with source attribution, grouped by source
    /// type in order of first appearance.
    ///
    /// # Example Output
    /// ```text
    /// ## CONVERSATION CONTEXT
    ///
    /// ### [1] chat-42 (relevance: 0.91, 2024-01-15T10:30:00Z)
    /// User prefers dark mode.
    /// ```
    pub fn format_for_prompt(&self, chunks: &[RetrievedChunk]) -> String {
        if chunks.is_empty() {
            return String::new();
        }

        let mut groups: Vec<(&str, Vec<&RetrievedChunk>)> = Vec::new();
        for retrieved in chunks {
            let source_type = retrieved.chunk.source_type.as_str();
            match groups.iter_mut().find(|(name, _)| *name == source_type) {
                Some((_, members)) => members.push(retrieved),
                None => groups.push((source_type, vec![retrieved])),
            }
        }

        let sections: Vec<String> = groups
            .into_iter()
            .map(|(source_type, members)| {
                let mut section = format!("## {} CONTEXT\n", source_type.to_uppercase());
                for (i, retrieved) in members.iter().enumerate() {
                    let chunk = &retrieved.chunk;
                    section.push_str(&format!(
                        "\n### [{}] {} (relevance: {:.2}, {})\n{}\n",
                        i + 1,
                        chunk.source_name,
                        retrieved.relevance_score,
                        chunk.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
                        chunk.text
                    ));
                }
                section
            })
            .collect();

        sections.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::chunk_fixture;

    fn retrieved(text: &str, source_type: &str, score: f32) -> RetrievedChunk {
        let mut chunk = chunk_fixture(text, vec![1.0, 0.0]);
        chunk.source_type = source_type.to_string();
        RetrievedChunk {
            chunk,
            relevance_score: score,
        }
    }

    #[test]
    fn test_rejects_non_positive_ratio() {
        assert!(ContextOptimizer::new(0.0).is_err());
        assert!(ContextOptimizer::new(-1.0).is_err());
        assert!(ContextOptimizer::new(f64::NAN).is_err());
        assert!(ContextOptimizer::new(3.5).is_ok());
    }

    #[test]
    fn test_estimate_tokens_counts_chars() {
        let optimizer = ContextOptimizer::default();
        assert_eq!(optimizer.estimate_tokens(""), 0);
        assert_eq!(optimizer.estimate_tokens("abc"), 0);
        assert_eq!(optimizer.estimate_tokens("abcd"), 1);
        assert_eq!(optimizer.estimate_tokens(&"x".repeat(400)), 100);
        // Multi-byte characters count once each
        assert_eq!(optimizer.estimate_tokens("éééé"), 1);
    }

    #[test]
    fn test_optimize_respects_budget_and_order() {
        let optimizer = ContextOptimizer::default();
        let ranked = vec![
            retrieved(&"a".repeat(40), "file", 0.9),
            retrieved(&"b".repeat(40), "file", 0.8),
            retrieved(&"c".repeat(40), "file", 0.7),
        ];

        let result = optimizer.optimize(ranked, 25);
        assert_eq!(result.chunks.len(), 2);
        assert_eq!(result.total_tokens, 20);
        assert!(result.chunks[0].chunk.text.starts_with('a'));
        assert!(result.chunks[1].chunk.text.starts_with('b'));
    }

    #[test]
    fn test_optimize_stops_at_first_overflow() {
        let optimizer = ContextOptimizer::default();
        let ranked = vec![
            retrieved(&"a".repeat(40), "file", 0.9),
            retrieved(&"b".repeat(400), "file", 0.8),
            retrieved(&"c".repeat(4), "file", 0.7),
        ];

        let result = optimizer.optimize(ranked, 50);
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.total_tokens, 10);
    }

    #[test]
    fn test_optimize_zero_budget() {
        let optimizer = ContextOptimizer::default();
        let result = optimizer.optimize(vec![retrieved("long enough text", "file", 0.5)], 0);
        assert!(result.chunks.is_empty());
        assert_eq!(result.total_tokens, 0);
    }

    #[test]
    fn test_format_groups_by_source_type() {
        let optimizer = ContextOptimizer::default();
        let chunks = vec![
            retrieved("first conversation", "conversation", 0.91),
            retrieved("a file", "file", 0.8),
            retrieved("second conversation", "conversation", 0.5),
        ];

        let formatted = optimizer.format_for_prompt(&chunks);

        assert!(formatted.starts_with("## CONVERSATION CONTEXT\n"));
        assert!(formatted.contains("## FILE CONTEXT"));
        assert!(formatted.contains("### [1] fixture (relevance: 0.91, "));
        assert!(formatted.contains("### [2] fixture (relevance: 0.50, "));
        assert!(formatted.contains("first conversation"));
        let conv = formatted.find("second conversation").unwrap();
        let file = formatted.find("## FILE CONTEXT").unwrap();
        assert!(conv < file);
    }

    #[test]
    fn test_format_empty() {
        assert_eq!(ContextOptimizer::default().format_for_prompt(&[]), "");
    }
}
