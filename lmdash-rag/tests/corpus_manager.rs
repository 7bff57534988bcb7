//! Integration tests for corpus building and querying against a temp storage root.

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use lmdash_rag::{
    CorpusConfig, CorpusManager, EmbeddingProvider, FixedSizeChunker, ParagraphChunker, RagError,
    Result,
};

const DIM: usize = 64;

/// Deterministic bag-of-words embeddings: texts sharing words point the same way.
#[derive(Clone)]
struct BagOfWordsEmbedder {
    model: String,
    calls: Arc<AtomicUsize>,
}

impl BagOfWordsEmbedder {
    fn new(model: &str) -> Self {
        Self { model: model.to_string(), calls: Arc::new(AtomicUsize::new(0)) }
    }
}

fn bucket(word: &str) -> usize {
    let hash = word.bytes().fold(0xcbf2_9ce4_8422_2325u64, |acc, b| {
        (acc ^ u64::from(b)).wrapping_mul(0x0100_0000_01b3)
    });
    (hash % DIM as u64) as usize
}

#[async_trait]
impl EmbeddingProvider for BagOfWordsEmbedder {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![0.0f32; DIM];
        for word in text.split(|c: char| !c.is_alphanumeric()).filter(|w| !w.is_empty()) {
            v[bucket(&word.to_lowercase())] += 1.0;
        }
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            v.iter_mut().for_each(|x| *x /= norm);
        }
        Ok(v)
    }

    fn with_model(&self, model_id: &str) -> Result<Arc<dyn EmbeddingProvider>> {
        Ok(Arc::new(Self { model: model_id.to_string(), calls: Arc::clone(&self.calls) }))
    }
}

/// An embedder whose service is always down.
struct UnreachableEmbedder;

#[async_trait]
impl EmbeddingProvider for UnreachableEmbedder {
    fn model_id(&self) -> &str {
        "unreachable"
    }

    async fn embed(&self, _text: &str) -> Result<Vec<f32>> {
        Err(RagError::EmbeddingUnavailable {
            provider: "test".into(),
            message: "connection refused".into(),
        })
    }
}

const DOCS: [&str; 3] = [
    "Rust is a systems programming language focused on safety and speed.",
    "Bread rises because yeast ferments sugar into carbon dioxide.",
    "Tides are driven by the gravitational pull of the moon.",
];

fn manager(root: &Path) -> CorpusManager {
    manager_with(root, Arc::new(BagOfWordsEmbedder::new("bow-v1")))
}

fn manager_with(root: &Path, embedder: Arc<dyn EmbeddingProvider>) -> CorpusManager {
    CorpusManager::builder()
        .config(CorpusConfig::builder().root(root).chunk_size(200).chunk_overlap(0).build().unwrap())
        .embedding_provider(embedder)
        .build()
        .unwrap()
}

#[tokio::test]
async fn query_with_exact_document_text_ranks_it_first() {
    let temp = tempfile::tempdir().unwrap();
    let manager = CorpusManager::builder()
        .config(CorpusConfig::builder().root(temp.path()).chunk_size(200).build().unwrap())
        .embedding_provider(Arc::new(BagOfWordsEmbedder::new("bow-v1")))
        .chunker(Arc::new(ParagraphChunker::new(100, 0).unwrap()))
        .build()
        .unwrap();

    let manifest = manager.build_corpus("facts", &DOCS).await.unwrap();
    assert_eq!(manifest.segment_count, 3);
    assert_eq!(manifest.chunk_size, Some(100));
    assert_eq!(manifest.embedding_model, "bow-v1");
    assert_eq!(manifest.dimensions, DIM);

    for doc in DOCS {
        let hits = manager.query_corpus("facts", doc, 3).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert!(hits[0].segment.text.contains(doc), "top hit for {doc:?} was {:?}", hits[0]);
        assert_eq!(hits[0].segment.corpus_name, "facts");
    }
}

#[tokio::test]
async fn query_on_missing_corpus_is_not_found() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());

    let err = manager.query_corpus("nothing-here", "anything", 3).await.unwrap_err();
    assert!(matches!(err, RagError::CorpusNotFound { ref corpus } if corpus == "nothing-here"));
}

#[tokio::test]
async fn fewer_entries_than_k_returns_all_of_them() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());
    manager.build_corpus("tiny", &["just one short document"]).await.unwrap();

    let hits = manager.query_corpus("tiny", "short", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(matches!(
        manager.query_corpus("tiny", "short", 0).await,
        Err(RagError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn default_query_uses_configured_top_k() {
    let temp = tempfile::tempdir().unwrap();
    let manager = CorpusManager::builder()
        .config(CorpusConfig::builder().root(temp.path()).chunk_size(20).top_k(2).build().unwrap())
        .embedding_provider(Arc::new(BagOfWordsEmbedder::new("bow-v1")))
        .build()
        .unwrap();
    manager.build_corpus("facts", &DOCS).await.unwrap();

    assert_eq!(manager.query("facts", "moon tides").await.unwrap().len(), 2);
}

#[tokio::test]
async fn delete_then_query_is_not_found_and_delete_is_idempotent() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());
    manager.build_corpus("facts", &DOCS).await.unwrap();

    manager.delete_corpus("facts").await.unwrap();
    manager.delete_corpus("facts").await.unwrap();

    let err = manager.query_corpus("facts", DOCS[0], 3).await.unwrap_err();
    assert!(matches!(err, RagError::CorpusNotFound { .. }));
    assert!(manager.list_corpora().unwrap().is_empty());
}

#[tokio::test]
async fn names_are_reusable_after_delete() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());

    manager.build_corpus("facts", &DOCS).await.unwrap();
    let first = manager.query_corpus("facts", "yeast and sugar", 1).await.unwrap();

    manager.delete_corpus("facts").await.unwrap();
    manager.build_corpus("facts", &DOCS).await.unwrap();
    let second = manager.query_corpus("facts", "yeast and sugar", 1).await.unwrap();

    assert_eq!(first[0].segment.text, second[0].segment.text);
}

#[tokio::test]
async fn building_an_existing_name_is_a_conflict_but_rebuild_replaces() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());
    manager.build_corpus("facts", &DOCS).await.unwrap();

    let err = manager.build_corpus("facts", &["something else entirely"]).await.unwrap_err();
    assert!(matches!(err, RagError::NameConflict { .. }));

    let manifest = manager.rebuild_corpus("facts", &["something else entirely"]).await.unwrap();
    assert_eq!(manifest.segment_count, 1);
    let hits = manager.query_corpus("facts", "tides", 5).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert!(hits[0].segment.text.starts_with("something else entirely"));

    // No staging or retired directories are left behind.
    assert_eq!(fs::read_dir(temp.path()).unwrap().count(), 1);
}

#[tokio::test]
async fn empty_documents_are_an_empty_corpus() {
    let temp = tempfile::tempdir().unwrap();
    let manager = CorpusManager::builder()
        .config(CorpusConfig::builder().root(temp.path()).build().unwrap())
        .embedding_provider(Arc::new(BagOfWordsEmbedder::new("bow-v1")))
        .chunker(Arc::new(ParagraphChunker::new(100, 0).unwrap()))
        .build()
        .unwrap();

    let err = manager.build_corpus("blank", &["", "   "]).await.unwrap_err();
    assert!(matches!(err, RagError::EmptyCorpus { ref corpus } if corpus == "blank"));
    assert!(manager.list_corpora().unwrap().is_empty());
}

#[tokio::test]
async fn embedding_failure_leaves_no_corpus_behind() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager_with(temp.path(), Arc::new(UnreachableEmbedder));

    let err = manager.build_corpus("facts", &DOCS).await.unwrap_err();
    assert!(matches!(err, RagError::EmbeddingUnavailable { .. }));
    assert!(!manager.corpus_dir("facts").exists());
    assert!(manager.list_corpora().unwrap().is_empty());
}

#[tokio::test]
async fn rename_moves_corpus_and_rejects_conflicts() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());
    manager.build_corpus("draft", &DOCS).await.unwrap();
    manager.build_corpus("other", &["unrelated"]).await.unwrap();

    let err = manager.rename_corpus("draft", "other").await.unwrap_err();
    assert!(matches!(err, RagError::NameConflict { ref corpus } if corpus == "other"));

    let err = manager.rename_corpus("missing", "fresh").await.unwrap_err();
    assert!(matches!(err, RagError::CorpusNotFound { .. }));

    manager.rename_corpus("draft", "final").await.unwrap();
    assert_eq!(manager.list_corpora().unwrap(), ["final", "other"]);
    assert_eq!(manager.manifest("final").unwrap().name, "final");

    let hits = manager.query_corpus("final", "moon", 1).await.unwrap();
    assert_eq!(hits[0].segment.corpus_name, "final");
    assert!(matches!(
        manager.query_corpus("draft", "moon", 1).await,
        Err(RagError::CorpusNotFound { .. })
    ));
}

#[tokio::test]
async fn queries_embed_with_the_model_that_built_the_corpus() {
    let temp = tempfile::tempdir().unwrap();
    manager_with(temp.path(), Arc::new(BagOfWordsEmbedder::new("bow-v1")))
        .build_corpus("facts", &DOCS)
        .await
        .unwrap();

    // A manager whose default model differs still queries with bow-v1.
    let later = manager_with(temp.path(), Arc::new(BagOfWordsEmbedder::new("bow-v2")));
    let hits = later.query_corpus("facts", "yeast", 1).await.unwrap();
    assert!(hits[0].segment.text.contains("yeast"));
    assert_eq!(later.manifest("facts").unwrap().embedding_model, "bow-v1");
}

#[tokio::test]
async fn builds_from_library_files_and_reports_binary_files() {
    let temp = tempfile::tempdir().unwrap();
    let files = temp.path().join("files");
    fs::create_dir_all(&files).unwrap();
    fs::write(files.join("rust.txt"), DOCS[0]).unwrap();
    fs::write(files.join("bread.json"), format!("{{\"text\": \"{}\"}}", DOCS[1])).unwrap();
    fs::write(files.join("blob.txt"), [0xc3, 0x28, 0xa0]).unwrap();

    let manager = manager(&temp.path().join("corpus"));
    let manifest = manager
        .build_corpus_from_files("library", &files, &["rust.txt".into(), "bread.json".into()])
        .await
        .unwrap();
    assert!(manifest.segment_count >= 1);

    let err = manager
        .build_corpus_from_files("broken", &files, &["blob.txt".into()])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Decode { .. }));
    assert!(matches!(
        manager.build_corpus_from_files("none", &files, &[]).await,
        Err(RagError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn concurrent_builds_of_one_name_produce_one_corpus() {
    let temp = tempfile::tempdir().unwrap();
    let manager = Arc::new(manager(temp.path()));

    let a = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.build_corpus("shared", &DOCS).await }
    });
    let b = tokio::spawn({
        let manager = Arc::clone(&manager);
        async move { manager.build_corpus("shared", &DOCS).await }
    });

    let results = [a.await.unwrap(), b.await.unwrap()];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
    assert!(results.iter().any(|r| matches!(r, Err(RagError::NameConflict { .. }))));
    assert_eq!(manager.list_corpora().unwrap(), ["shared"]);
}

#[tokio::test]
async fn rejects_unsafe_corpus_names() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());
    for name in ["", "../escape", ".hidden"] {
        let err = manager.build_corpus(name, &DOCS).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)), "{name}");
    }
}

#[tokio::test]
async fn directories_without_a_manifest_are_not_corpora() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());
    fs::create_dir_all(temp.path().join("ghost")).unwrap();
    fs::create_dir_all(temp.path().join("leftover")).unwrap();
    fs::write(temp.path().join("leftover").join("entries.json"), "[]").unwrap();

    assert!(manager.list_corpora().unwrap().is_empty());
    assert!(!manager.corpus_exists("ghost"));
    assert!(matches!(
        manager.query_corpus("ghost", "anything", 1).await,
        Err(RagError::CorpusNotFound { .. })
    ));

    let err = manager.rename_corpus("ghost", "moved").await.unwrap_err();
    assert!(matches!(err, RagError::CorpusNotFound { ref corpus } if corpus == "ghost"));
    assert!(temp.path().join("ghost").exists());
    assert!(!temp.path().join("moved").exists());

    manager.build_corpus("ghost", &DOCS).await.unwrap();
    manager.build_corpus("real", &["renamed over a leftover directory"]).await.unwrap();
    manager.rename_corpus("real", "leftover").await.unwrap();

    assert_eq!(manager.list_corpora().unwrap(), ["ghost", "leftover"]);
    assert_eq!(manager.manifest("leftover").unwrap().segment_count, 1);
    let hits = manager.query_corpus("leftover", "leftover directory", 1).await.unwrap();
    assert_eq!(hits[0].segment.corpus_name, "leftover");
}

#[tokio::test]
async fn renaming_a_corrupt_corpus_moves_nothing() {
    let temp = tempfile::tempdir().unwrap();
    let manager = manager(temp.path());
    manager.build_corpus("facts", &DOCS).await.unwrap();
    fs::write(manager.corpus_dir("facts").join("entries.json"), "not json").unwrap();

    let err = manager.rename_corpus("facts", "renamed").await.unwrap_err();
    assert!(matches!(err, RagError::IndexCorrupt { .. }));
    assert!(manager.corpus_exists("facts"));
    assert!(!manager.corpus_dir("renamed").exists());
}

#[tokio::test]
async fn manifest_records_the_chunker_that_built_the_corpus() {
    let temp = tempfile::tempdir().unwrap();
    let manager = CorpusManager::builder()
        .config(CorpusConfig::builder().root(temp.path()).chunk_size(200).build().unwrap())
        .embedding_provider(Arc::new(BagOfWordsEmbedder::new("bow-v1")))
        .chunker(Arc::new(FixedSizeChunker::new(5, 1).unwrap()))
        .build()
        .unwrap();

    let manifest = manager.build_corpus("tiny", &["abcdefghij"]).await.unwrap();
    assert_eq!(manifest.chunk_size, Some(5));
    assert_eq!(manifest.chunk_overlap, Some(1));
    let stored = manager.manifest("tiny").unwrap();
    assert_eq!((stored.chunk_size, stored.chunk_overlap), (Some(5), Some(1)));
}

#[tokio::test]
async fn hits_point_back_to_their_source_document() {
    let temp = tempfile::tempdir().unwrap();
    let manager = CorpusManager::builder()
        .config(CorpusConfig::builder().root(temp.path()).build().unwrap())
        .embedding_provider(Arc::new(BagOfWordsEmbedder::new("bow-v1")))
        .chunker(Arc::new(ParagraphChunker::new(100, 0).unwrap()))
        .build()
        .unwrap();
    manager.build_corpus("facts", &DOCS).await.unwrap();

    for (index, doc) in DOCS.iter().enumerate() {
        let hits = manager.query_corpus("facts", doc, 1).await.unwrap();
        assert_eq!(hits[0].segment.document_index, index);
        assert_eq!(hits[0].segment.source_offset, 0);
    }
}
