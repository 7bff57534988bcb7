//! Corpus manager.
//!
//! The [`CorpusManager`] coordinates corpus building (chunk → embed → index →
//! persist) and querying (embed → search) over a storage root that holds one
//! directory per corpus.
//!
//! # Example
//!
//! ```rust,ignore
//! use lmdash_rag::{CorpusConfig, CorpusManager, OllamaEmbeddingProvider};
//!
//! let manager = CorpusManager::builder()
//!     .config(CorpusConfig::builder().root("corpus").build()?)
//!     .embedding_provider(Arc::new(OllamaEmbeddingProvider::new("http://localhost:11434")?))
//!     .build()?;
//!
//! manager.build_corpus("handbook", &["first document", "second document"]).await?;
//! let hits = manager.query_corpus("handbook", "search query", 3).await?;
//! ```

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::OwnedMutexGuard;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::chunking::{Chunker, FixedSizeChunker, PARAGRAPH_SEPARATOR};
use crate::config::CorpusConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::index::{CorpusManifest, MANIFEST_FILE, VectorIndex};
use crate::library::read_documents;
use crate::segment::{SearchHit, Segment};

/// Maximum number of segments sent to the embedding service per request.
const EMBED_BATCH_SIZE: usize = 64;

/// Builds, queries, renames and deletes named corpora under one storage root.
///
/// A corpus exists when its directory holds a manifest. Directories without
/// one are not listed, cannot be queried, and are cleared when a corpus of
/// that name is built or renamed into place.
///
/// Every operation holds a per-corpus lock for its whole duration, so
/// concurrent callers never observe or produce a half-built corpus. Builds
/// are written to a hidden staging directory and moved into place only once
/// fully persisted.
pub struct CorpusManager {
    config: CorpusConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    chunker: Arc<dyn Chunker>,
    locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

/// Join documents into one corpus text, ending each with a blank line so
/// that paragraph-aware chunking never merges two documents' edges.
pub fn join_documents<D: AsRef<str>>(documents: &[D]) -> String {
    let mut text = String::new();
    for document in documents {
        text.push_str(document.as_ref());
        text.push_str(PARAGRAPH_SEPARATOR);
    }
    text
}

/// Attribute each segment to the document it starts in, rebasing its offset
/// from the joined text produced by [`join_documents`] to that document.
fn attribute_to_documents<D: AsRef<str>>(segments: &mut [Segment], documents: &[D]) {
    let mut starts = Vec::with_capacity(documents.len());
    let mut next = 0;
    for document in documents {
        starts.push(next);
        next += document.as_ref().chars().count() + PARAGRAPH_SEPARATOR.len();
    }

    for segment in segments {
        let index = starts.partition_point(|&start| start <= segment.source_offset).saturating_sub(1);
        segment.document_index = index;
        segment.source_offset -= starts.get(index).copied().unwrap_or(0);
    }
}

/// Per-corpus lock guard. Releasing the last guard for a name drops its lock entry.
struct CorpusLock<'a> {
    guard: Option<OwnedMutexGuard<()>>,
    name: String,
    locks: &'a Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl Drop for CorpusLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if locks.get(&self.name).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            locks.remove(&self.name);
        }
    }
}

/// Check that `name` can be used as a corpus directory name.
///
/// # Errors
///
/// Returns [`RagError::InvalidArgument`] for empty names, names starting with
/// `.`, and names containing path separators.
pub fn validate_corpus_name(name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(RagError::InvalidArgument("corpus name must not be empty".into()));
    }
    if name.starts_with('.') {
        return Err(RagError::InvalidArgument(format!(
            "corpus name '{name}' must not start with '.'"
        )));
    }
    if name.contains(['/', '\\']) {
        return Err(RagError::InvalidArgument(format!(
            "corpus name '{name}' must not contain path separators"
        )));
    }
    Ok(())
}

impl CorpusManager {
    /// Create a new [`CorpusManagerBuilder`].
    pub fn builder() -> CorpusManagerBuilder {
        CorpusManagerBuilder::default()
    }

    /// Return a reference to the manager configuration.
    pub fn config(&self) -> &CorpusConfig {
        &self.config
    }

    /// Return a reference to the embedding provider used for new corpora.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Directory a corpus named `name` is stored in.
    pub fn corpus_dir(&self, name: &str) -> PathBuf {
        self.config.root.join(name)
    }

    /// Whether a corpus named `name` is stored, i.e. its directory holds a manifest.
    pub fn corpus_exists(&self, name: &str) -> bool {
        self.corpus_dir(name).join(MANIFEST_FILE).is_file()
    }

    async fn lock(&self, name: &str) -> CorpusLock<'_> {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            locks.entry(name.to_string()).or_default().clone()
        };
        CorpusLock {
            guard: Some(lock.lock_owned().await),
            name: name.to_string(),
            locks: &self.locks,
        }
    }

    /// Remove a directory at `name` that holds no manifest so a corpus can take its place.
    fn clear_stray_dir(&self, name: &str) -> Result<()> {
        let dir = self.corpus_dir(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                warn!(corpus = name, dir = %dir.display(), "removed directory without a manifest");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::io(dir, e)),
        }
    }

    /// List stored corpora, sorted by name. A missing storage root is empty.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the storage root cannot be read.
    pub fn list_corpora(&self) -> Result<Vec<String>> {
        let root = &self.config.root;
        let read_dir = match fs::read_dir(root) {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(RagError::io(root, e)),
        };

        let mut names = Vec::new();
        for entry in read_dir {
            let entry = entry.map_err(|e| RagError::io(root, e))?;
            if let Some(name) = entry.file_name().to_str() {
                if !name.starts_with('.') && self.corpus_exists(name) {
                    names.push(name.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    /// Read the manifest of a stored corpus.
    ///
    /// # Errors
    ///
    /// - [`RagError::CorpusNotFound`] if the corpus does not exist
    /// - [`RagError::IndexCorrupt`] if its manifest is unreadable
    pub fn manifest(&self, name: &str) -> Result<CorpusManifest> {
        validate_corpus_name(name)?;
        VectorIndex::read_manifest(&self.corpus_dir(name), name)
    }

    /// Build a new corpus from `documents`: chunk → embed → index → persist.
    ///
    /// # Errors
    ///
    /// - [`RagError::NameConflict`] if a corpus with this name already exists
    /// - [`RagError::EmptyCorpus`] if chunking produces no segments
    /// - [`RagError::EmbeddingUnavailable`] if the embedding service fails
    pub async fn build_corpus<D: AsRef<str> + Sync>(
        &self,
        name: &str,
        documents: &[D],
    ) -> Result<CorpusManifest> {
        validate_corpus_name(name)?;
        let _guard = self.lock(name).await;

        if self.corpus_exists(name) {
            return Err(RagError::NameConflict { corpus: name.to_string() });
        }

        let (staging, manifest) = self.build_staged(name, documents).await?;
        let target = self.corpus_dir(name);
        if let Err(e) = self.clear_stray_dir(name) {
            remove_staging(&staging);
            return Err(e);
        }
        if let Err(e) = fs::rename(&staging, &target) {
            remove_staging(&staging);
            return Err(RagError::io(&target, e));
        }

        info!(corpus = name, segment_count = manifest.segment_count, "built corpus");
        Ok(manifest)
    }

    /// Build a corpus from `documents`, replacing any existing corpus with
    /// the same name. The previous corpus stays intact if the build fails.
    ///
    /// # Errors
    ///
    /// Same as [`build_corpus`](Self::build_corpus), except that an existing
    /// name is not an error.
    pub async fn rebuild_corpus<D: AsRef<str> + Sync>(
        &self,
        name: &str,
        documents: &[D],
    ) -> Result<CorpusManifest> {
        validate_corpus_name(name)?;
        let _guard = self.lock(name).await;

        let (staging, manifest) = self.build_staged(name, documents).await?;
        let target = self.corpus_dir(name);

        let retired = if target.exists() {
            let retired = self.config.root.join(format!(".{name}.replaced-{}", Uuid::new_v4()));
            if let Err(e) = fs::rename(&target, &retired) {
                remove_staging(&staging);
                return Err(RagError::io(&target, e));
            }
            Some(retired)
        } else {
            None
        };

        if let Err(e) = fs::rename(&staging, &target) {
            error!(corpus = name, error = %e, "failed to move rebuilt corpus into place");
            if let Some(retired) = &retired {
                if let Err(restore) = fs::rename(retired, &target) {
                    error!(corpus = name, error = %restore, "failed to restore previous corpus");
                }
            }
            remove_staging(&staging);
            return Err(RagError::io(&target, e));
        }

        if let Some(retired) = retired {
            remove_staging(&retired);
        }

        info!(corpus = name, segment_count = manifest.segment_count, "rebuilt corpus");
        Ok(manifest)
    }

    /// Build a new corpus from files in the library at `files_root`.
    ///
    /// # Errors
    ///
    /// - [`RagError::Decode`] if a file is not UTF-8 text
    /// - [`RagError::InvalidArgument`] if no files are given or a name is not
    ///   a `.txt`/`.json` library file
    /// - any error of [`build_corpus`](Self::build_corpus)
    pub async fn build_corpus_from_files(
        &self,
        name: &str,
        files_root: impl AsRef<Path>,
        file_names: &[String],
    ) -> Result<CorpusManifest> {
        if file_names.is_empty() {
            return Err(RagError::InvalidArgument(format!(
                "no files selected for corpus '{name}'"
            )));
        }
        let documents = read_documents(files_root, file_names)?;
        self.build_corpus(name, &documents).await
    }

    /// Chunk, embed and persist `documents` into a fresh staging directory.
    async fn build_staged<D: AsRef<str> + Sync>(
        &self,
        name: &str,
        documents: &[D],
    ) -> Result<(PathBuf, CorpusManifest)> {
        let mut segments = self.chunker.chunk(name, &join_documents(documents));
        segments.retain(|segment| !segment.text.trim().is_empty());
        attribute_to_documents(&mut segments, documents);
        if segments.is_empty() {
            return Err(RagError::EmptyCorpus { corpus: name.to_string() });
        }

        let mut embeddings = Vec::with_capacity(segments.len());
        for batch in segments.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<&str> = batch.iter().map(|s| s.text.as_str()).collect();
            let vectors = self.embedding_provider.embed_batch(&texts).await.map_err(|e| {
                error!(corpus = name, error = %e, "embedding failed during build");
                e
            })?;
            embeddings.extend(vectors);
        }

        let root = &self.config.root;
        fs::create_dir_all(root).map_err(|e| RagError::io(root, e))?;
        let staging = root.join(format!(".{name}.building-{}", Uuid::new_v4()));

        let persisted = (|| -> Result<CorpusManifest> {
            let mut index =
                VectorIndex::create_or_open(&staging, name, self.embedding_provider.model_id())?;
            index.record_chunking(self.chunker.chunk_size(), self.chunker.chunk_overlap());
            index.add(segments, embeddings)?;
            index.persist()?;
            Ok(index.manifest().clone())
        })();

        match persisted {
            Ok(manifest) => Ok((staging, manifest)),
            Err(e) => {
                error!(corpus = name, error = %e, "failed to persist corpus");
                remove_staging(&staging);
                Err(e)
            }
        }
    }

    /// Query a corpus with the configured default `top_k`.
    ///
    /// # Errors
    ///
    /// Same as [`query_corpus`](Self::query_corpus).
    pub async fn query(&self, name: &str, query: &str) -> Result<Vec<SearchHit>> {
        self.query_corpus(name, query, self.config.top_k).await
    }

    /// Return the `k` segments of corpus `name` most similar to `query`.
    ///
    /// The query is embedded with the model recorded in the corpus manifest,
    /// which may differ from the manager's default embedding model.
    ///
    /// # Errors
    ///
    /// - [`RagError::CorpusNotFound`] if the corpus does not exist
    /// - [`RagError::InvalidArgument`] if `k` is zero
    /// - [`RagError::IndexCorrupt`] if the stored index is unreadable
    /// - [`RagError::EmbeddingUnavailable`] if the embedding service fails
    pub async fn query_corpus(&self, name: &str, query: &str, k: usize) -> Result<Vec<SearchHit>> {
        validate_corpus_name(name)?;
        if k == 0 {
            return Err(RagError::InvalidArgument("k must be greater than zero".into()));
        }
        let _guard = self.lock(name).await;

        let index = VectorIndex::open(self.corpus_dir(name), name)?;
        let model = index.manifest().embedding_model.as_str();
        let provider = if model == self.embedding_provider.model_id() {
            Arc::clone(&self.embedding_provider)
        } else {
            self.embedding_provider.with_model(model)?
        };

        let query_embedding = provider.embed(query).await.map_err(|e| {
            error!(corpus = name, error = %e, "embedding failed during query");
            e
        })?;

        let hits = index.search(&query_embedding, k)?;
        info!(corpus = name, k, result_count = hits.len(), "query completed");
        Ok(hits)
    }

    /// Remove a corpus. Deleting a corpus that does not exist succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::Io`] if the corpus directory cannot be removed.
    pub async fn delete_corpus(&self, name: &str) -> Result<()> {
        validate_corpus_name(name)?;
        let _guard = self.lock(name).await;

        let dir = self.corpus_dir(name);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                info!(corpus = name, "deleted corpus");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(RagError::io(dir, e)),
        }
    }

    /// Rename corpus `old_name` to `new_name`.
    ///
    /// # Errors
    ///
    /// - [`RagError::CorpusNotFound`] if `old_name` does not exist
    /// - [`RagError::IndexCorrupt`] if `old_name` is unreadable; nothing is moved
    /// - [`RagError::NameConflict`] if `new_name` already exists
    ///
    /// If relabeling fails after the move, the corpus is moved back under `old_name`.
    pub async fn rename_corpus(&self, old_name: &str, new_name: &str) -> Result<()> {
        validate_corpus_name(old_name)?;
        validate_corpus_name(new_name)?;

        let (first, second) =
            if old_name <= new_name { (old_name, new_name) } else { (new_name, old_name) };
        let _first = self.lock(first).await;
        let _second = if first == second { None } else { Some(self.lock(second).await) };

        let old_dir = self.corpus_dir(old_name);
        let new_dir = self.corpus_dir(new_name);
        // Validates the stored corpus before anything moves.
        let mut index = VectorIndex::open(&old_dir, old_name)?;
        if self.corpus_exists(new_name) {
            return Err(RagError::NameConflict { corpus: new_name.to_string() });
        }

        self.clear_stray_dir(new_name)?;
        fs::rename(&old_dir, &new_dir).map_err(|e| RagError::io(&old_dir, e))?;
        index.relocate(&new_dir);
        index.relabel(new_name);

        if let Err(e) = index.persist() {
            error!(from = old_name, to = new_name, error = %e, "failed to relabel renamed corpus");
            match fs::rename(&new_dir, &old_dir) {
                Ok(()) => {
                    // The restored label is flushed when the handle drops.
                    index.relocate(&old_dir);
                    index.relabel(old_name);
                }
                Err(restore) => {
                    error!(corpus = old_name, error = %restore, "failed to move corpus back");
                }
            }
            return Err(e);
        }

        info!(from = old_name, to = new_name, "renamed corpus");
        Ok(())
    }
}

fn remove_staging(dir: &Path) {
    if let Err(e) = fs::remove_dir_all(dir) {
        if e.kind() != std::io::ErrorKind::NotFound {
            warn!(dir = %dir.display(), error = %e, "failed to remove staging directory");
        }
    }
}

/// Builder for constructing a [`CorpusManager`].
///
/// `embedding_provider` is required. The configuration defaults to
/// [`CorpusConfig::default`] and the chunker to a [`FixedSizeChunker`] built
/// from the configuration's chunk size and overlap.
#[derive(Default)]
pub struct CorpusManagerBuilder {
    config: Option<CorpusConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
}

impl CorpusManagerBuilder {
    /// Set the manager configuration.
    pub fn config(mut self, config: CorpusConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider used for new corpora.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the chunking strategy.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Build the [`CorpusManager`].
    ///
    /// # Errors
    ///
    /// - [`RagError::ConfigError`] if the embedding provider is missing
    /// - [`RagError::InvalidArgument`] if the default chunker cannot be built
    ///   from the configuration
    pub fn build(self) -> Result<CorpusManager> {
        let config = self.config.unwrap_or_default();
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let chunker = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(FixedSizeChunker::new(config.chunk_size, config.chunk_overlap)?),
        };

        Ok(CorpusManager { config, embedding_provider, chunker, locks: Mutex::new(HashMap::new()) })
    }
}
