//! Cross-collection retrieval.
//!
//! [`RetrievalMerger`] searches each target collection independently, with
//! at most `concurrency` searches in flight, and merges the hits into one
//! ranked list. A collection that fails to search is logged and left out.
//!
//! Ordering is decided only by [`compare_scores`] and the order of the
//! target list, never by which search finishes first:
//!
//! 1. per-collection results are concatenated in target order,
//! 2. a stable sort puts higher scores first and unscored results last,
//! 3. the list is cut to `top_k_per_collection * 2`.

use std::cmp::Ordering;
use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::cancel::{cancellable, check};
use crate::document::RetrievalResult;
use crate::error::{RagError, Result};
use crate::indexer::Indexer;

/// Ratio between the merged result budget and the per-collection limit.
pub const FAN_IN_FACTOR: usize = 2;

/// Order two optional scores: present beats absent, higher beats lower, and
/// two absent scores compare equal. Non-finite scores count as absent.
pub fn compare_scores(a: Option<f32>, b: Option<f32>) -> Ordering {
    let a = a.filter(|s| s.is_finite());
    let b = b.filter(|s| s.is_finite());
    match (a, b) {
        (Some(a), Some(b)) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Stable-sort `results` by descending score and keep at most `budget`.
pub fn merge_ranked(mut results: Vec<RetrievalResult>, budget: usize) -> Vec<RetrievalResult> {
    results.sort_by(|a, b| compare_scores(a.score, b.score));
    results.truncate(budget);
    results
}

/// Fans a query vector out over collections and merges the hits.
#[derive(Clone)]
pub struct RetrievalMerger {
    indexer: Arc<dyn Indexer>,
    concurrency: usize,
}

impl RetrievalMerger {
    /// Create a merger issuing at most `concurrency` searches at once.
    pub fn new(indexer: Arc<dyn Indexer>, concurrency: usize) -> Self {
        Self { indexer, concurrency: concurrency.max(1) }
    }

    /// List the collections available for a "search everything" query.
    ///
    /// # Errors
    ///
    /// Propagates the indexer failure, or [`RagError::Cancelled`].
    pub async fn list_collections(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        cancellable(cancel, self.indexer.list_collections()).await
    }

    /// Search every collection in `collections` and merge the results.
    ///
    /// Each collection is asked for `top_k_per_collection` hits; the merged
    /// list holds at most `top_k_per_collection * 2`.
    ///
    /// # Errors
    ///
    /// Only [`RagError::Cancelled`]. Per-collection failures are logged and
    /// the collection is omitted.
    pub async fn search(
        &self,
        query: &[f32],
        collections: &[String],
        top_k_per_collection: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrievalResult>> {
        check(cancel)?;

        let per_collection: Vec<Vec<RetrievalResult>> = stream::iter(collections)
            .map(|name| self.search_collection(name, query, top_k_per_collection, cancel))
            .buffered(self.concurrency)
            .try_collect()
            .await?;

        let candidates: Vec<RetrievalResult> = per_collection.into_iter().flatten().collect();
        let candidate_count = candidates.len();
        let merged = merge_ranked(candidates, top_k_per_collection.saturating_mul(FAN_IN_FACTOR));

        info!(
            collections = collections.len(),
            candidates = candidate_count,
            results = merged.len(),
            "merged retrieval results"
        );
        Ok(merged)
    }

    async fn search_collection(
        &self,
        name: &str,
        query: &[f32],
        limit: usize,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrievalResult>> {
        match cancellable(cancel, self.indexer.search(name, query, limit)).await {
            Ok(hits) => {
                debug!(collection = name, hits = hits.len(), "collection searched");
                Ok(hits
                    .into_iter()
                    .map(|hit| RetrievalResult::new(hit.payload, hit.score, name))
                    .collect())
            }
            Err(RagError::Cancelled) => Err(RagError::Cancelled),
            Err(e) => {
                warn!(collection = name, error = %e, "search failed, omitting collection");
                Ok(Vec::new())
            }
        }
    }
}
