//! Data types for segments and search hits.

use serde::{Deserialize, Serialize};

/// A contiguous slice of source text produced by a [`Chunker`](crate::Chunker).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Segment {
    /// The text content of the segment.
    pub text: String,
    /// Character offset of the segment's first character in its source document.
    pub source_offset: usize,
    /// Position of the source document among those the corpus was built from.
    #[serde(default)]
    pub document_index: usize,
    /// The corpus this segment belongs to.
    pub corpus_name: String,
}

impl Segment {
    /// Create a new segment.
    pub fn new(text: impl Into<String>, source_offset: usize, corpus_name: impl Into<String>) -> Self {
        Self { text: text.into(), source_offset, document_index: 0, corpus_name: corpus_name.into() }
    }

    /// Length of the segment in characters.
    pub fn char_len(&self) -> usize {
        self.text.chars().count()
    }
}

/// A retrieved [`Segment`] paired with its cosine similarity to the query.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SearchHit {
    /// The matched segment.
    pub segment: Segment,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}
