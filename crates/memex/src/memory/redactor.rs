//! Secret redaction
//!
//! Replaces secret-looking spans (API keys, bearer tokens, credential
//! assignments) with a constant placeholder before text is embedded or
//! stored. Input the matchers cannot vouch for is rejected so the caller can
//! drop it instead of storing it unredacted.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

/// Replacement for every redacted span
pub const REDACTED_PLACEHOLDER: &str = "[REDACTED]";

/// Heuristic secret matchers, applied in order.
static SECRET_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // Credential assignments: `api_key = "..."`, `token: ...`. No leading
        // word boundary, so prefixed names like `DB_PASSWORD=` match too.
        r#"(?i)(?:api[_-]?key|access[_-]?token|auth[_-]?token|token)["']?\s*[:=]\s*["']?[A-Za-z0-9_\-.]{20,}"#,
        r#"(?i)(?:password|passwd|pwd|client[_-]?secret|secret)["']?\s*[:=]\s*["']?[^\s"']{8,}"#,
        // Authorization headers
        r"(?i)\bbearer\s+[A-Za-z0-9._~+/=\-]{16,}",
        // Provider key shapes
        r"\b(?:sk|pk|rk)-[A-Za-z0-9_\-]{20,}",
        r"\bAKIA[0-9A-Z]{16}\b",
        r"\b(?:ghp|gho|ghs|ghu|ghr)_[A-Za-z0-9]{20,}",
        r"\bgithub_pat_[A-Za-z0-9_]{20,}",
        r"\bxox[abprs]-[A-Za-z0-9\-]{10,}",
    ]
    .iter()
    .map(|pattern| Regex::new(pattern).expect("redaction patterns are valid regexes"))
    .collect()
});

/// Why a text could not be redacted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RedactionError {
    /// The text was decoded lossily upstream; secrets may hide in the
    /// replaced bytes
    #[error("input contains U+FFFD replacement characters")]
    ReplacementCharacter,

    #[error("input contains NUL bytes")]
    NulByte,
}

/// Stateless secret scrubber over the fixed pattern set.
#[derive(Debug, Clone, Copy, Default)]
pub struct Redactor;

impl Redactor {
    pub fn new() -> Self {
        Self
    }

    /// Redact every secret-looking span in `text`.
    ///
    /// Borrows the input unchanged when nothing matched.
    pub fn redact<'a>(&self, text: &'a str) -> Result<Cow<'a, str>, RedactionError> {
        if text.contains('\u{FFFD}') {
            return Err(RedactionError::ReplacementCharacter);
        }
        if text.contains('\0') {
            return Err(RedactionError::NulByte);
        }
        Ok(scrub(text))
    }

    /// Redact the runs of `text` between malformed characters, leaving the
    /// malformed characters themselves in place.
    ///
    /// Used where [`Redactor::redact`] rejects the whole text but the clean
    /// runs still have to be scrubbed; whatever still carries a malformed
    /// character is expected to be dropped afterwards.
    pub fn redact_segments(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        for piece in text.split_inclusive(is_malformed) {
            let segment = piece.strip_suffix(is_malformed).unwrap_or(piece);
            out.push_str(&scrub(segment));
            out.push_str(&piece[segment.len()..]);
        }
        out
    }
}

fn is_malformed(c: char) -> bool {
    c == '\u{FFFD}' || c == '\0'
}

fn scrub(text: &str) -> Cow<'_, str> {
    let mut current = Cow::Borrowed(text);
    for pattern in SECRET_PATTERNS.iter() {
        if pattern.is_match(&current) {
            current = Cow::Owned(
                pattern
                    .replace_all(&current, REDACTED_PLACEHOLDER)
                    .into_owned(),
            );
        }
    }
    current
}
