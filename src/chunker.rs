//! Deterministic overlapping text splitter.
//!
//! Splitting is character-based with a fixed overlap: every chunk except the
//! first begins with the last `overlap` characters of its predecessor, so
//! concatenating chunk 0 with each later chunk minus its first `overlap`
//! characters reconstructs the input exactly. Chunk boundaries prefer
//! paragraph, then sentence, then word breaks, falling back to a hard cut.

use serde::{Deserialize, Serialize};

use crate::errors::ApiError;

/// A text chunk with source information.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextChunk {
    /// The text content.
    pub text: String,
    /// Source identifier (filename, document id, etc.).
    pub source: String,
    /// Character offset in the original document.
    pub start_offset: usize,
    /// Chunk index within the source.
    pub chunk_index: usize,
}

#[derive(Debug, Clone)]
pub struct Chunker {
    max_size: usize,
    overlap: usize,
}

impl Chunker {
    pub fn new(max_size: usize, overlap: usize) -> Result<Self, ApiError> {
        if max_size == 0 {
            return Err(ApiError::BadRequest(
                "chunk size must be positive".to_string(),
            ));
        }
        if overlap >= max_size {
            return Err(ApiError::BadRequest(format!(
                "chunk overlap ({}) must be smaller than chunk size ({})",
                overlap, max_size
            )));
        }
        Ok(Chunker { max_size, overlap })
    }

    pub fn overlap(&self) -> usize {
        self.overlap
    }

    /// Splits `text` into ordered, overlapping chunks. Empty input yields an
    /// empty vec.
    pub fn split(&self, text: &str, source: &str) -> Vec<TextChunk> {
        let chars: Vec<char> = text.chars().collect();
        let total = chars.len();
        let mut chunks = Vec::new();
        if total == 0 {
            return chunks;
        }

        let mut start = 0usize;
        let mut chunk_index = 0usize;
        loop {
            let hard_end = (start + self.max_size).min(total);
            // A natural break is only taken when it leaves more than
            // `overlap` characters of progress; otherwise the window would
            // stop advancing.
            let end = if hard_end < total {
                natural_cut(&chars[start..hard_end], self.overlap)
                    .map(|cut| start + cut)
                    .unwrap_or(hard_end)
            } else {
                hard_end
            };

            chunks.push(TextChunk {
                text: chars[start..end].iter().collect(),
                source: source.to_string(),
                start_offset: start,
                chunk_index,
            });

            if end >= total {
                break;
            }
            start = end - self.overlap;
            chunk_index += 1;
        }

        chunks
    }
}

/// Finds the largest cut position in `window` that lands on a natural
/// language break, preferring paragraph over sentence over word breaks.
/// Returns `None` when no break leaves more than `min_cut` characters.
fn natural_cut(window: &[char], min_cut: usize) -> Option<usize> {
    let len = window.len();

    for i in (0..len.saturating_sub(1)).rev() {
        if window[i] == '\n' && window[i + 1] == '\n' {
            let cut = i + 2;
            if cut > min_cut {
                return Some(cut);
            }
            break;
        }
    }

    for i in (0..len.saturating_sub(1)).rev() {
        if matches!(window[i], '.' | '!' | '?') && window[i + 1].is_whitespace() {
            // The cut includes the trailing whitespace so no character is
            // dropped between chunks.
            let cut = i + 2;
            if cut > min_cut {
                return Some(cut);
            }
            break;
        }
    }

    for i in (0..len).rev() {
        if window[i].is_whitespace() {
            let cut = i + 1;
            if cut > min_cut {
                return Some(cut);
            }
            break;
        }
    }

    None
}
