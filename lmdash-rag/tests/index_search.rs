//! Property tests for vector index search ordering.

use lmdash_rag::{Segment, VectorIndex};
use proptest::prelude::*;

/// Generate a non-zero L2-normalized embedding of the given dimension.
fn arb_normalized_embedding(dim: usize) -> impl Strategy<Value = Vec<f32>> {
    proptest::collection::vec(-1.0f32..1.0f32, dim).prop_filter_map(
        "non-zero embedding",
        |mut v| {
            let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm < 1e-8 {
                return None;
            }
            for val in &mut v {
                *val /= norm;
            }
            Some(v)
        },
    )
}

/// Generate a segment with a normalized embedding.
fn arb_entry(dim: usize) -> impl Strategy<Value = (Segment, Vec<f32>)> {
    ("[a-z ]{5,30}", 0usize..10_000, arb_normalized_embedding(dim))
        .prop_map(|(text, offset, embedding)| (Segment::new(text, offset, "props"), embedding))
}

/// *For any* set of stored entries, searching SHALL return results ordered by
/// descending cosine similarity, and exactly `min(k, len)` of them.
mod prop_index_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_k(
            entries in proptest::collection::vec(arb_entry(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            k in 1usize..25,
        ) {
            let temp = tempfile::tempdir().unwrap();
            let mut index = VectorIndex::create_or_open(temp.path().join("props"), "props", "mock").unwrap();
            let count = entries.len();
            let (segments, embeddings): (Vec<_>, Vec<_>) = entries.into_iter().unzip();
            index.add(segments, embeddings).unwrap();

            let results = index.search(&query, k).unwrap();

            // Fewer than k entries returns all of them
            prop_assert_eq!(results.len(), k.min(count));

            for window in results.windows(2) {
                prop_assert!(
                    window[0].score >= window[1].score,
                    "results not in descending order: {} < {}",
                    window[0].score,
                    window[1].score,
                );
            }
        }

        #[test]
        fn reopened_index_answers_like_the_original(
            entries in proptest::collection::vec(arb_entry(DIM), 1..12),
            query in arb_normalized_embedding(DIM),
        ) {
            let temp = tempfile::tempdir().unwrap();
            let dir = temp.path().join("props");
            let (segments, embeddings): (Vec<_>, Vec<_>) = entries.into_iter().unzip();

            let mut index = VectorIndex::create_or_open(&dir, "props", "mock").unwrap();
            index.add(segments, embeddings).unwrap();
            index.persist().unwrap();
            let before = index.search(&query, 5).unwrap();
            drop(index);

            let reopened = VectorIndex::open(&dir, "props").unwrap();
            let after = reopened.search(&query, 5).unwrap();
            prop_assert_eq!(before, after);
        }
    }
}
