//! Persisted vector index for a single corpus.
//!
//! A [`VectorIndex`] owns one directory containing two JSON files:
//!
//! - `manifest.json`: the [`CorpusManifest`], including the embedding model
//!   the vectors were produced with
//! - `entries.json`: every stored segment with its embedding, in insertion order
//!
//! Additions are buffered in memory until [`VectorIndex::persist`] is called.
//! A handle with unflushed additions persists itself when dropped.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use crate::error::{RagError, Result};
use crate::segment::{SearchHit, Segment};

/// File name of the corpus manifest inside a corpus directory.
pub const MANIFEST_FILE: &str = "manifest.json";

/// File name of the stored entries inside a corpus directory.
pub const ENTRIES_FILE: &str = "entries.json";

/// Metadata persisted next to a corpus's entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CorpusManifest {
    /// The corpus name.
    pub name: String,
    /// The embedding model every stored vector was produced with.
    pub embedding_model: String,
    /// Vector dimensionality, `0` until the first entry is added.
    pub dimensions: usize,
    /// Number of stored segments.
    pub segment_count: usize,
    /// Segment size used when the corpus was chunked, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_size: Option<usize>,
    /// Segment overlap used when the corpus was chunked, if recorded.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunk_overlap: Option<usize>,
    /// When the corpus was first created.
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IndexEntry {
    segment: Segment,
    embedding: Vec<f32>,
}

/// An open handle on a corpus's persisted vectors.
///
/// Similarity is cosine similarity, the same metric for every corpus.
#[derive(Debug)]
pub struct VectorIndex {
    dir: PathBuf,
    manifest: CorpusManifest,
    entries: Vec<IndexEntry>,
    dirty: bool,
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

fn corrupt(corpus: &str, message: impl Into<String>) -> RagError {
    RagError::IndexCorrupt { corpus: corpus.to_string(), message: message.into() }
}

/// Write `contents` to `path` through a sibling temp file and a rename.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, contents).map_err(|e| RagError::io(&tmp, e))?;
    fs::rename(&tmp, path).map_err(|e| RagError::io(path, e))
}

impl VectorIndex {
    /// Open the index stored in `dir`, or start an empty one bound to
    /// `embedding_model_id` if `dir` holds no corpus yet.
    ///
    /// # Errors
    ///
    /// - [`RagError::IndexCorrupt`] if the stored state is unreadable
    /// - [`RagError::ModelMismatch`] if the stored corpus uses another embedding model
    pub fn create_or_open(
        dir: impl Into<PathBuf>,
        corpus_key: &str,
        embedding_model_id: &str,
    ) -> Result<Self> {
        let dir = dir.into();
        if !dir.join(MANIFEST_FILE).exists() {
            debug!(corpus = corpus_key, dir = %dir.display(), "creating empty index");
            return Ok(Self {
                dir,
                manifest: CorpusManifest {
                    name: corpus_key.to_string(),
                    embedding_model: embedding_model_id.to_string(),
                    dimensions: 0,
                    segment_count: 0,
                    chunk_size: None,
                    chunk_overlap: None,
                    created_at: Utc::now(),
                },
                entries: Vec::new(),
                dirty: false,
            });
        }

        let index = Self::open(dir, corpus_key)?;
        if index.manifest.embedding_model != embedding_model_id {
            return Err(RagError::ModelMismatch {
                corpus: corpus_key.to_string(),
                expected: index.manifest.embedding_model.clone(),
                actual: embedding_model_id.to_string(),
            });
        }
        Ok(index)
    }

    /// Open the index stored in `dir`.
    ///
    /// # Errors
    ///
    /// - [`RagError::CorpusNotFound`] if `dir` holds no manifest
    /// - [`RagError::IndexCorrupt`] if the manifest or entries are unreadable
    ///   or disagree with each other
    pub fn open(dir: impl Into<PathBuf>, corpus_key: &str) -> Result<Self> {
        let dir = dir.into();
        let manifest = Self::read_manifest(&dir, corpus_key)?;

        let entries_path = dir.join(ENTRIES_FILE);
        let raw = fs::read(&entries_path)
            .map_err(|e| corrupt(corpus_key, format!("cannot read {ENTRIES_FILE}: {e}")))?;
        let entries: Vec<IndexEntry> = serde_json::from_slice(&raw)
            .map_err(|e| corrupt(corpus_key, format!("cannot parse {ENTRIES_FILE}: {e}")))?;

        if entries.len() != manifest.segment_count {
            return Err(corrupt(
                corpus_key,
                format!(
                    "manifest lists {} segments but {} are stored",
                    manifest.segment_count,
                    entries.len()
                ),
            ));
        }
        if let Some(bad) = entries.iter().find(|e| e.embedding.len() != manifest.dimensions) {
            return Err(corrupt(
                corpus_key,
                format!(
                    "stored vector has {} dimensions, manifest says {}",
                    bad.embedding.len(),
                    manifest.dimensions
                ),
            ));
        }

        debug!(corpus = corpus_key, entries = entries.len(), "opened index");
        Ok(Self { dir, manifest, entries, dirty: false })
    }

    /// Read only the manifest of the corpus stored in `dir`.
    ///
    /// # Errors
    ///
    /// Same as [`open`](Self::open), without checking the entries.
    pub fn read_manifest(dir: &Path, corpus_key: &str) -> Result<CorpusManifest> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let raw = match fs::read(&manifest_path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(RagError::CorpusNotFound { corpus: corpus_key.to_string() });
            }
            Err(e) => return Err(corrupt(corpus_key, format!("cannot read {MANIFEST_FILE}: {e}"))),
        };
        serde_json::from_slice(&raw)
            .map_err(|e| corrupt(corpus_key, format!("cannot parse {MANIFEST_FILE}: {e}")))
    }

    /// The manifest as it will be persisted.
    pub fn manifest(&self) -> &CorpusManifest {
        &self.manifest
    }

    /// Directory this index persists to.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of stored entries, including unflushed ones.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the index holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether there are changes not yet written by [`persist`](Self::persist).
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Record the chunking parameters that produced this corpus's segments.
    pub fn record_chunking(&mut self, chunk_size: usize, chunk_overlap: usize) {
        self.manifest.chunk_size = Some(chunk_size);
        self.manifest.chunk_overlap = Some(chunk_overlap);
        self.dirty = true;
    }

    /// Append segments and their embeddings, pairing them by position.
    ///
    /// # Errors
    ///
    /// - [`RagError::ArgumentMismatch`] if the two sequences differ in length
    /// - [`RagError::InvalidArgument`] if a vector is empty or its dimension
    ///   differs from the vectors already stored
    pub fn add(&mut self, segments: Vec<Segment>, embeddings: Vec<Vec<f32>>) -> Result<()> {
        if segments.len() != embeddings.len() {
            return Err(RagError::ArgumentMismatch {
                segments: segments.len(),
                embeddings: embeddings.len(),
            });
        }

        let mut dimensions = self.manifest.dimensions;
        for embedding in &embeddings {
            if embedding.is_empty() {
                return Err(RagError::InvalidArgument("embedding vectors must not be empty".into()));
            }
            if dimensions == 0 {
                dimensions = embedding.len();
            } else if embedding.len() != dimensions {
                return Err(RagError::InvalidArgument(format!(
                    "embedding has {} dimensions, index '{}' stores {dimensions}",
                    embedding.len(),
                    self.manifest.name
                )));
            }
        }

        let added = segments.len();
        self.entries.extend(
            segments.into_iter().zip(embeddings).map(|(segment, embedding)| IndexEntry {
                segment,
                embedding,
            }),
        );
        self.manifest.dimensions = dimensions;
        self.manifest.segment_count = self.entries.len();
        self.dirty = true;

        debug!(corpus = %self.manifest.name, added, total = self.entries.len(), "added entries");
        Ok(())
    }

    /// Return up to `k` stored segments most similar to `query_embedding`,
    /// ordered by descending cosine similarity.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::InvalidArgument`] if `k` is zero or the query
    /// vector's dimension differs from the stored vectors.
    pub fn search(&self, query_embedding: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be greater than zero".into()));
        }
        if !self.entries.is_empty() && query_embedding.len() != self.manifest.dimensions {
            return Err(RagError::InvalidArgument(format!(
                "query embedding has {} dimensions, index '{}' stores {}",
                query_embedding.len(),
                self.manifest.name,
                self.manifest.dimensions
            )));
        }

        let mut scored: Vec<SearchHit> = self
            .entries
            .iter()
            .map(|entry| SearchHit {
                segment: entry.segment.clone(),
                score: cosine_similarity(&entry.embedding, query_embedding),
            })
            .collect();

        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        Ok(scored)
    }

    /// Rename the corpus recorded in the manifest and in every stored segment.
    pub fn relabel(&mut self, corpus_name: &str) {
        self.manifest.name = corpus_name.to_string();
        for entry in &mut self.entries {
            entry.segment.corpus_name = corpus_name.to_string();
        }
        self.dirty = true;
    }

    /// Point the handle at another directory, for example after the corpus
    /// directory was moved. The next [`persist`](Self::persist) writes there.
    pub fn relocate(&mut self, dir: impl Into<PathBuf>) {
        self.dir = dir.into();
        self.dirty = true;
    }

    /// Flush the manifest and entries to disk.
    ///
    /// Entries are written before the manifest and each file is replaced
    /// atomically, so a reader never sees a manifest describing entries that
    /// were not written.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] or [`RagError::IndexCorrupt`] if writing fails.
    pub fn persist(&mut self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| RagError::io(&self.dir, e))?;

        let entries = serde_json::to_vec(&self.entries)
            .map_err(|e| corrupt(&self.manifest.name, format!("cannot encode entries: {e}")))?;
        write_atomic(&self.dir.join(ENTRIES_FILE), &entries)?;

        let manifest = serde_json::to_vec_pretty(&self.manifest)
            .map_err(|e| corrupt(&self.manifest.name, format!("cannot encode manifest: {e}")))?;
        write_atomic(&self.dir.join(MANIFEST_FILE), &manifest)?;

        self.dirty = false;
        info!(
            corpus = %self.manifest.name,
            segment_count = self.manifest.segment_count,
            dir = %self.dir.display(),
            "persisted index"
        );
        Ok(())
    }
}

impl Drop for VectorIndex {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.persist() {
                error!(corpus = %self.manifest.name, error = %e, "failed to persist index on drop");
            }
        }
    }
}
