//! Text chunking with configurable size and overlap.
//!
//! Sizes are measured in characters (Unicode scalar values), so a fragment
//! never splits a multi-byte character.

use qakb_core::{AppError, AppResult};

/// Validated chunking parameters.
///
/// `size > 0` and `overlap < size` hold for every value of this type, so each
/// window advances by at least one character.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkPolicy {
    size: usize,
    overlap: usize,
}

impl ChunkPolicy {
    pub fn new(size: usize, overlap: usize) -> AppResult<Self> {
        if size == 0 {
            return Err(AppError::Config(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        if overlap >= size {
            return Err(AppError::Config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                overlap, size
            )));
        }
        Ok(Self { size, overlap })
    }

    /// Sequential, non-overlapping windows of `size` characters.
    pub fn fixed(size: usize) -> AppResult<Self> {
        Self::new(size, 0)
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Split `text` into fragments according to this policy.
    pub fn chunk(&self, text: &str) -> Vec<String> {
        chunk_text(text, self.size, self.overlap)
    }
}

/// Chunk text into windows of `size` characters advancing by `size - overlap`.
///
/// The last window may be shorter than `size`. Empty input yields no
/// fragments. Degenerate parameters are clamped so the step is always at
/// least one character.
pub fn chunk_text(text: &str, size: usize, overlap: usize) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    let size = size.max(1);
    let step = size.saturating_sub(overlap).max(1);

    // Byte offset of every character start, plus the end of the text.
    let mut bounds: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
    bounds.push(text.len());
    let char_count = bounds.len() - 1;

    let mut fragments = Vec::with_capacity(char_count.div_ceil(step));
    let mut start = 0;

    loop {
        let end = (start + size).min(char_count);
        fragments.push(text[bounds[start]..bounds[end]].to_string());

        if end == char_count {
            break;
        }
        start += step;
    }

    tracing::trace!(
        "Chunked {} chars into {} fragments (size: {}, overlap: {})",
        char_count,
        fragments.len(),
        size,
        overlap
    );

    fragments
}
