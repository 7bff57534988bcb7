//! # lmdash-rag
//!
//! Retrieval corpora for lmdash.
//!
//! ## Overview
//!
//! A corpus is a named, persisted set of text segments and their embeddings.
//! This crate provides:
//!
//! - [`Chunker`] strategies that split text into [`Segment`]s
//! - [`EmbeddingProvider`] and its Ollama implementation [`OllamaEmbeddingProvider`]
//! - [`VectorIndex`], the per-corpus persisted cosine-similarity index
//! - [`CorpusManager`], which builds, queries, renames and deletes corpora
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use lmdash_rag::{CorpusConfig, CorpusManager, OllamaEmbeddingProvider};
//!
//! let manager = CorpusManager::builder()
//!     .config(CorpusConfig::builder().root("corpus").chunk_size(1000).build()?)
//!     .embedding_provider(Arc::new(OllamaEmbeddingProvider::new("http://localhost:11434")?))
//!     .build()?;
//!
//! manager.build_corpus("handbook", &["Chapter one...", "Chapter two..."]).await?;
//! for hit in manager.query_corpus("handbook", "what happens in chapter two?", 3).await? {
//!     println!("{:.3} {}", hit.score, hit.segment.text);
//! }
//! ```
//!
//! A corpus is bound to the embedding model that built it; the model name is
//! stored in its [`CorpusManifest`] and queries always embed with that model.

pub mod chunking;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod error;
pub mod index;
pub mod library;
pub mod ollama;
pub mod segment;

pub use chunking::{Chunker, FixedSizeChunker, PARAGRAPH_SEPARATOR, ParagraphChunker};
pub use config::{CorpusConfig, CorpusConfigBuilder, DEFAULT_CORPUS_ROOT};
pub use corpus::{CorpusManager, CorpusManagerBuilder, join_documents, validate_corpus_name};
pub use embedding::EmbeddingProvider;
pub use error::{RagError, Result};
pub use index::{CorpusManifest, VectorIndex};
pub use library::{
    CORPUS_SOURCE_EXTENSIONS, DEFAULT_FILES_ROOT, list_corpus_sources, read_documents,
};
pub use ollama::{DEFAULT_EMBEDDING_MODEL, DEFAULT_OLLAMA_URL, OllamaEmbeddingProvider};
pub use segment::{SearchHit, Segment};
