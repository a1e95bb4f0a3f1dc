//! Overlapping character-window chunker
//!
//! Splits text into windows of `chunk_size` characters where each window
//! starts `chunk_size - overlap` characters after the previous one. Sizes are
//! counted in Unicode scalar values, so windows never split a character.

use std::sync::Arc;

use crate::error::{MemexError, Result};

/// Default window size in characters
pub const DEFAULT_CHUNK_SIZE: usize = 512;

/// Default overlap between consecutive windows in characters
pub const DEFAULT_CHUNK_OVERLAP: usize = 50;

/// Validated chunking parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunker {
    chunk_size: usize,
    overlap: usize,
}

impl Default for Chunker {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            overlap: DEFAULT_CHUNK_OVERLAP,
        }
    }
}

impl Chunker {
    /// Create a chunker. Fails when `overlap >= chunk_size`, which also rules
    /// out a zero `chunk_size`.
    pub fn new(chunk_size: usize, overlap: usize) -> Result<Self> {
        if overlap >= chunk_size {
            return Err(MemexError::Validation(format!(
                "chunk overlap ({overlap}) must be smaller than chunk size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            overlap,
        })
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into overlapping windows.
    ///
    /// The returned iterator is cheap to clone; a clone restarts from the
    /// position the original was at.
    pub fn split<'a>(&self, text: &'a str) -> ChunkWindows<'a> {
        let mut offsets: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        offsets.push(text.len());

        ChunkWindows {
            text,
            offsets: offsets.into(),
            next_start: Some(0),
            chunk_size: self.chunk_size,
            step: self.chunk_size - self.overlap,
        }
    }
}

/// Iterator over the windows of one text.
#[derive(Debug, Clone)]
pub struct ChunkWindows<'a> {
    text: &'a str,
    /// Byte offset of every char boundary, including the end of the text
    offsets: Arc<[usize]>,
    /// Char index of the next window, `None` once the end was emitted
    next_start: Option<usize>,
    chunk_size: usize,
    step: usize,
}

impl<'a> Iterator for ChunkWindows<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.next_start?;
        let char_len = self.offsets.len() - 1;
        let end = (start + self.chunk_size).min(char_len);

        self.next_start = if end == char_len {
            None
        } else {
            Some(start + self.step)
        };

        Some(&self.text[self.offsets[start]..self.offsets[end]])
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let Some(start) = self.next_start else {
            return (0, Some(0));
        };
        let char_len = self.offsets.len() - 1;
        let remaining = if start + self.chunk_size >= char_len {
            1
        } else {
            1 + (char_len - start - self.chunk_size).div_ceil(self.step)
        };
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ChunkWindows<'_> {}
