//! In-memory indexer lifecycle and search ordering.

use ragline::{Document, IndexPoint, Indexer, InMemoryIndexer, RagError};
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

fn arb_point(dim: usize) -> impl Strategy<Value = IndexPoint> {
    ("[a-z ]{5,30}", arb_normalized_embedding(dim))
        .prop_map(|(text, vector)| IndexPoint { vector, payload: Document::new(text) })
}

/// For any set of points, searching returns results ordered by descending
/// cosine similarity, bounded by the limit and by the number of points.
mod prop_inmemory_search_ordering {
    use super::*;

    const DIM: usize = 16;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        #[test]
        fn results_ordered_descending_and_bounded_by_limit(
            points in proptest::collection::vec(arb_point(DIM), 1..20),
            query in arb_normalized_embedding(DIM),
            limit in 1usize..25,
        ) {
            let count = points.len();
            let rt = tokio::runtime::Runtime::new().unwrap();
            let (ids, hits) = rt.block_on(async {
                let indexer = InMemoryIndexer::new();
                indexer.ensure_collection("test", DIM).await.unwrap();
                let ids = indexer.upsert("test", points).await.unwrap();
                let hits = indexer.search("test", &query, limit).await.unwrap();
                (ids, hits)
            });

            prop_assert_eq!(ids.len(), count);
            prop_assert_eq!(hits.len(), limit.min(count));
            for pair in hits.windows(2) {
                prop_assert!(pair[0].score.unwrap() >= pair[1].score.unwrap());
            }
        }
    }
}

#[tokio::test]
async fn lifecycle_transitions() {
    let indexer = InMemoryIndexer::new();

    // absent --delete--> absent
    indexer.delete_collection("docs").await.unwrap();
    // absent --ensure--> present
    indexer.ensure_collection("docs", 3).await.unwrap();
    let point = IndexPoint { vector: vec![1.0, 0.0, 0.0], payload: Document::new("kept") };
    indexer.upsert("docs", vec![point]).await.unwrap();
    // present --ensure--> present, content untouched
    indexer.ensure_collection("docs", 3).await.unwrap();
    assert_eq!(indexer.point_count("docs").await, Some(1));
    // present --delete--> absent
    indexer.delete_collection("docs").await.unwrap();
    assert_eq!(indexer.point_count("docs").await, None);
    assert!(indexer.list_collections().await.unwrap().is_empty());
}

#[tokio::test]
async fn ensure_with_other_size_is_reported() {
    let indexer = InMemoryIndexer::new();
    indexer.ensure_collection("docs", 3).await.unwrap();

    let err = indexer.ensure_collection("docs", 4).await.unwrap_err();
    assert!(matches!(err, RagError::DimensionMismatch { expected: 3, actual: 4, .. }));
}

#[tokio::test]
async fn writes_and_queries_check_dimensions() {
    let indexer = InMemoryIndexer::new();
    indexer.ensure_collection("docs", 2).await.unwrap();

    let bad = IndexPoint { vector: vec![1.0, 0.0, 0.0], payload: Document::new("x") };
    assert!(matches!(
        indexer.upsert("docs", vec![bad]).await,
        Err(RagError::DimensionMismatch { .. })
    ));
    assert_eq!(indexer.point_count("docs").await, Some(0));
    assert!(indexer.search("docs", &[1.0], 1).await.is_err());
    assert!(indexer.search("absent", &[1.0, 0.0], 1).await.is_err());
}

#[tokio::test]
async fn point_ids_are_fresh() {
    let indexer = InMemoryIndexer::new();
    indexer.ensure_collection("docs", 2).await.unwrap();
    let point = IndexPoint { vector: vec![0.0, 1.0], payload: Document::new("same text") };

    let first = indexer.upsert("docs", vec![point.clone()]).await.unwrap();
    let second = indexer.upsert("docs", vec![point]).await.unwrap();
    assert_ne!(first, second);
}

#[tokio::test]
async fn payload_round_trips_through_search() {
    let indexer = InMemoryIndexer::new();
    indexer.ensure_collection("docs", 2).await.unwrap();
    let payload =
        Document::new("content").with_metadata("source", "a.txt").with_metadata("page", 2usize);
    indexer
        .upsert("docs", vec![IndexPoint { vector: vec![1.0, 1.0], payload: payload.clone() }])
        .await
        .unwrap();

    let hits = indexer.search("docs", &[1.0, 1.0], 5).await.unwrap();
    assert_eq!(hits[0].payload, payload);
}
