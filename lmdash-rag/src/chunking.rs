//! Text chunking strategies.
//!
//! This module provides the [`Chunker`] trait and two implementations:
//!
//! - [`FixedSizeChunker`]: splits by character count with configurable overlap
//! - [`ParagraphChunker`]: merges blank-line separated paragraphs up to the size limit
//!
//! Sizes and offsets are measured in characters (Unicode scalar values), so a
//! segment boundary never falls inside a multi-byte character.

use crate::error::{RagError, Result};
use crate::segment::Segment;

/// Separator between paragraphs, and between documents joined into one corpus.
pub const PARAGRAPH_SEPARATOR: &str = "\n\n";

/// A strategy for splitting text into segments.
///
/// Implementations are pure: the same input always yields the same ordered
/// segments, and an empty text yields no segments.
pub trait Chunker: Send + Sync {
    /// Split `text` into segments tagged with `corpus_name`.
    fn chunk(&self, corpus_name: &str, text: &str) -> Vec<Segment>;

    /// Maximum number of characters per segment.
    fn chunk_size(&self) -> usize;

    /// Number of characters shared by consecutive segments.
    fn chunk_overlap(&self) -> usize;
}

fn validate(chunk_size: usize, chunk_overlap: usize) -> Result<()> {
    if chunk_size == 0 {
        return Err(RagError::InvalidArgument("chunk_size must be greater than zero".into()));
    }
    if chunk_overlap >= chunk_size {
        return Err(RagError::InvalidArgument(format!(
            "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
        )));
    }
    Ok(())
}

/// Byte offset of every character boundary in `text`, including `text.len()`.
fn char_boundaries(text: &str) -> Vec<usize> {
    text.char_indices().map(|(i, _)| i).chain(std::iter::once(text.len())).collect()
}

/// Character ranges `[start, end)` covering `char_count` characters.
fn fixed_ranges(char_count: usize, chunk_size: usize, chunk_overlap: usize) -> Vec<(usize, usize)> {
    let mut ranges = Vec::new();
    if char_count == 0 {
        return ranges;
    }

    let step = chunk_size - chunk_overlap;
    let mut start = 0;
    loop {
        let end = (start + chunk_size).min(char_count);
        ranges.push((start, end));
        if end == char_count {
            break;
        }
        start += step;
    }
    ranges
}

/// Splits text into fixed-size segments by character count with configurable overlap.
///
/// Consecutive segments start `chunk_size - chunk_overlap` characters apart.
/// The last segment ends at the end of the text.
///
/// # Example
///
/// ```rust
/// use lmdash_rag::{Chunker, FixedSizeChunker};
///
/// let chunker = FixedSizeChunker::new(4, 1).unwrap();
/// let segments = chunker.chunk("notes", "abcdefg");
/// let texts: Vec<_> = segments.iter().map(|s| s.text.as_str()).collect();
/// assert_eq!(texts, ["abcd", "defg"]);
/// ```
#[derive(Debug, Clone)]
pub struct FixedSizeChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl FixedSizeChunker {
    /// Create a new `FixedSizeChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

impl Chunker for FixedSizeChunker {
    fn chunk(&self, corpus_name: &str, text: &str) -> Vec<Segment> {
        let bounds = char_boundaries(text);
        fixed_ranges(bounds.len() - 1, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .map(|(start, end)| Segment::new(&text[bounds[start]..bounds[end]], start, corpus_name))
            .collect()
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

/// Splits text on blank lines, then merges paragraphs into segments no longer
/// than `chunk_size` characters.
///
/// A paragraph that is longer than `chunk_size` on its own is split with the
/// [`FixedSizeChunker`] rules, including overlap. Segments consisting only of
/// whitespace are dropped.
#[derive(Debug, Clone)]
pub struct ParagraphChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl ParagraphChunker {
    /// Create a new `ParagraphChunker`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        validate(chunk_size, chunk_overlap)?;
        Ok(Self { chunk_size, chunk_overlap })
    }
}

/// Split text at a separator while keeping the separator attached to the preceding piece.
fn split_keeping_separator<'a>(text: &'a str, separator: &str) -> Vec<&'a str> {
    let mut result = Vec::new();
    let mut start = 0;

    while let Some(pos) = text[start..].find(separator) {
        let end = start + pos + separator.len();
        result.push(&text[start..end]);
        start = end;
    }

    if start < text.len() {
        result.push(&text[start..]);
    }

    result
}

/// A segment under construction: starting character offset, text and length in characters.
struct Pending {
    offset: usize,
    text: String,
    chars: usize,
}

impl Chunker for ParagraphChunker {
    fn chunk(&self, corpus_name: &str, text: &str) -> Vec<Segment> {
        let mut segments = Vec::new();
        let mut emit = |offset: usize, body: &str| {
            if !body.trim().is_empty() {
                segments.push(Segment::new(body, offset, corpus_name));
            }
        };

        let mut current: Option<Pending> = None;
        let mut offset = 0;

        for piece in split_keeping_separator(text, PARAGRAPH_SEPARATOR) {
            let piece_chars = piece.chars().count();

            if let Some(pending) = current.as_mut() {
                if pending.chars + piece_chars <= self.chunk_size {
                    pending.text.push_str(piece);
                    pending.chars += piece_chars;
                    offset += piece_chars;
                    continue;
                }
            }

            if let Some(pending) = current.take() {
                emit(pending.offset, &pending.text);
            }

            if piece_chars > self.chunk_size {
                let bounds = char_boundaries(piece);
                for (start, end) in fixed_ranges(piece_chars, self.chunk_size, self.chunk_overlap) {
                    emit(offset + start, &piece[bounds[start]..bounds[end]]);
                }
            } else {
                current = Some(Pending { offset, text: piece.to_string(), chars: piece_chars });
            }
            offset += piece_chars;
        }

        if let Some(pending) = current {
            emit(pending.offset, &pending.text);
        }

        segments
    }

    fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}
