//! Indexer trait for collection lifecycle and similarity search.

use async_trait::async_trait;

use crate::document::Document;
use crate::error::Result;

/// A vector and the document stored alongside it.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexPoint {
    /// The embedding of `payload.content`.
    pub vector: Vec<f32>,
    /// The chunk text and its metadata.
    pub payload: Document,
}

/// A stored document returned by [`Indexer::search`].
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    /// The stored chunk text and metadata.
    pub payload: Document,
    /// Similarity to the query vector, if the backend reported one.
    pub score: Option<f32>,
}

/// A storage backend organised in named collections of cosine-distance
/// vectors.
///
/// Collections follow a simple lifecycle: `ensure_collection` creates an
/// absent collection and leaves a present one untouched, `delete_collection`
/// removes a present collection and treats an absent one as success.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::{IndexPoint, Indexer};
///
/// indexer.ensure_collection("docs", 768).await?;
/// let ids = indexer.upsert("docs", points).await?;
/// let hits = indexer.search("docs", &query_vector, 4).await?;
/// ```
#[async_trait]
pub trait Indexer: Send + Sync {
    /// Create `name` with the given vector size if it does not exist.
    ///
    /// Implementations return [`RagError::DimensionMismatch`](crate::RagError::DimensionMismatch)
    /// when the collection exists with a different vector size.
    async fn ensure_collection(&self, name: &str, vector_size: usize) -> Result<()>;

    /// Delete `name`. Deleting an absent collection succeeds.
    async fn delete_collection(&self, name: &str) -> Result<()>;

    /// Store `points` in `name`, returning one fresh id per point in order.
    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<Vec<String>>;

    /// Return at most `limit` stored documents most similar to `query`,
    /// most similar first.
    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<SearchHit>>;

    /// List every collection name. No ordering is guaranteed.
    async fn list_collections(&self) -> Result<Vec<String>>;
}

/// Generate a fresh point id. Ids are never derived from content or reused.
pub fn new_point_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
