//! Error types for the `lmdash-rag` crate.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur while building or querying a corpus.
#[derive(Debug, Error)]
pub enum RagError {
    /// The embedding service could not produce a vector.
    #[error("Embedding unavailable ({provider}): {message}")]
    EmbeddingUnavailable {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// Persisted index state could not be read back.
    #[error("Index for corpus '{corpus}' is corrupt: {message}")]
    IndexCorrupt {
        /// The corpus whose storage is unreadable.
        corpus: String,
        /// A description of the failure.
        message: String,
    },

    /// `add` was called with a different number of segments and embeddings.
    #[error("Argument mismatch: {segments} segments but {embeddings} embeddings")]
    ArgumentMismatch {
        /// Number of segments supplied.
        segments: usize,
        /// Number of embeddings supplied.
        embeddings: usize,
    },

    /// A caller-supplied argument violates a precondition.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Chunking produced no segments for the corpus.
    #[error("Corpus '{corpus}' would be empty: no segments were produced")]
    EmptyCorpus {
        /// The corpus being built.
        corpus: String,
    },

    /// The named corpus does not exist under the storage root.
    #[error("Corpus '{corpus}' not found")]
    CorpusNotFound {
        /// The requested corpus.
        corpus: String,
    },

    /// A corpus with this name already exists.
    #[error("Corpus '{corpus}' already exists")]
    NameConflict {
        /// The conflicting corpus name.
        corpus: String,
    },

    /// The corpus was built with a different embedding model.
    #[error("Corpus '{corpus}' was built with embedding model '{expected}', not '{actual}'")]
    ModelMismatch {
        /// The corpus being opened.
        corpus: String,
        /// The model recorded in the corpus manifest.
        expected: String,
        /// The model the caller tried to use.
        actual: String,
    },

    /// A source file is not valid UTF-8 text.
    #[error("Unable to decode {}: it may be a binary file", path.display())]
    Decode {
        /// The file that failed to decode.
        path: PathBuf,
    },

    /// A filesystem operation failed.
    #[error("I/O error at {}: {source}", path.display())]
    Io {
        /// The path involved.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: std::io::Error,
    },

    /// A configuration validation error.
    #[error("Configuration error: {0}")]
    ConfigError(String),
}

impl RagError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io { path: path.into(), source }
    }
}

/// A convenience result type for corpus operations.
pub type Result<T> = std::result::Result<T, RagError>;
