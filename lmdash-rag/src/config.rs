//! Configuration for corpus building and querying.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Default directory that holds one subdirectory per corpus.
pub const DEFAULT_CORPUS_ROOT: &str = "corpus";

/// Configuration parameters for the corpus manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusConfig {
    /// Directory holding one subdirectory per corpus.
    pub root: PathBuf,
    /// Maximum segment size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive segments.
    pub chunk_overlap: usize,
    /// Number of matches returned when the caller does not ask for a specific `k`.
    pub top_k: usize,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self { root: PathBuf::from(DEFAULT_CORPUS_ROOT), chunk_size: 1000, chunk_overlap: 0, top_k: 3 }
    }
}

impl CorpusConfig {
    /// Create a new builder for constructing a [`CorpusConfig`].
    pub fn builder() -> CorpusConfigBuilder {
        CorpusConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`CorpusConfig`].
#[derive(Debug, Clone, Default)]
pub struct CorpusConfigBuilder {
    config: CorpusConfig,
}

impl CorpusConfigBuilder {
    /// Set the storage root directory.
    pub fn root(mut self, root: impl Into<PathBuf>) -> Self {
        self.config.root = root.into();
        self
    }

    /// Set the maximum segment size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive segments in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the default number of matches returned by a query.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Build the [`CorpusConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0`
    /// - `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    pub fn build(self) -> Result<CorpusConfig> {
        if self.config.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.config.chunk_overlap >= self.config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.config.chunk_overlap, self.config.chunk_size
            )));
        }
        if self.config.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        Ok(self.config)
    }
}
