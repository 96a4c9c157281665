//! In-memory indexer using cosine similarity.
//!
//! [`InMemoryIndexer`] keeps every collection in a `HashMap` behind a
//! `tokio::sync::RwLock`. It is suitable for development, tests and
//! small corpora.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::document::Document;
use crate::error::{RagError, Result};
use crate::indexer::{IndexPoint, Indexer, SearchHit, new_point_id};

const BACKEND: &str = "InMemory";

#[derive(Debug)]
struct StoredPoint {
    id: String,
    vector: Vec<f32>,
    payload: Document,
}

#[derive(Debug)]
struct StoredCollection {
    vector_size: usize,
    points: Vec<StoredPoint>,
}

/// An in-memory [`Indexer`] using cosine similarity for search.
///
/// Points keep their insertion order, so equal scores are returned in the
/// order they were written.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::{InMemoryIndexer, Indexer};
///
/// let indexer = InMemoryIndexer::new();
/// indexer.ensure_collection("docs", 768).await?;
/// ```
#[derive(Debug, Default)]
pub struct InMemoryIndexer {
    collections: RwLock<HashMap<String, StoredCollection>>,
}

impl InMemoryIndexer {
    /// Create a new empty indexer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of points stored in `name`, or `None` if it does not exist.
    pub async fn point_count(&self, name: &str) -> Option<usize> {
        self.collections.read().await.get(name).map(|c| c.points.len())
    }

    fn missing(name: &str) -> RagError {
        RagError::IndexerError {
            backend: BACKEND.to_string(),
            message: format!("collection '{name}' does not exist"),
        }
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl Indexer for InMemoryIndexer {
    async fn ensure_collection(&self, name: &str, vector_size: usize) -> Result<()> {
        let mut collections = self.collections.write().await;
        match collections.get(name) {
            Some(existing) if existing.vector_size != vector_size => {
                Err(RagError::DimensionMismatch {
                    collection: name.to_string(),
                    expected: existing.vector_size,
                    actual: vector_size,
                })
            }
            Some(_) => Ok(()),
            None => {
                collections
                    .insert(name.to_string(), StoredCollection { vector_size, points: Vec::new() });
                debug!(collection = name, vector_size, "created in-memory collection");
                Ok(())
            }
        }
    }

    async fn delete_collection(&self, name: &str) -> Result<()> {
        self.collections.write().await.remove(name);
        Ok(())
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<Vec<String>> {
        let mut collections = self.collections.write().await;
        let collection = collections.get_mut(name).ok_or_else(|| Self::missing(name))?;

        if let Some(bad) = points.iter().find(|p| p.vector.len() != collection.vector_size) {
            return Err(RagError::DimensionMismatch {
                collection: name.to_string(),
                expected: collection.vector_size,
                actual: bad.vector.len(),
            });
        }

        let ids: Vec<String> = points.iter().map(|_| new_point_id()).collect();
        collection.points.extend(points.into_iter().zip(&ids).map(|(point, id)| StoredPoint {
            id: id.clone(),
            vector: point.vector,
            payload: point.payload,
        }));
        debug!(collection = name, count = ids.len(), "upserted in-memory points");
        Ok(ids)
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        let collections = self.collections.read().await;
        let collection = collections.get(name).ok_or_else(|| Self::missing(name))?;
        if query.len() != collection.vector_size {
            return Err(RagError::DimensionMismatch {
                collection: name.to_string(),
                expected: collection.vector_size,
                actual: query.len(),
            });
        }

        let mut scored: Vec<(f32, &StoredPoint)> = collection
            .points
            .iter()
            .map(|point| (cosine_similarity(&point.vector, query), point))
            .collect();

        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);

        debug!(collection = name, hits = scored.len(), "searched in-memory collection");
        Ok(scored
            .into_iter()
            .map(|(score, point)| {
                debug!(point.id = %point.id, score, "in-memory hit");
                SearchHit { payload: point.payload.clone(), score: Some(score) }
            })
            .collect())
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> = self.collections.read().await.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}
