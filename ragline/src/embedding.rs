//! Embedding generator trait for turning text into vectors.

use async_trait::async_trait;

use crate::error::{RagError, Result};

/// A backend that converts text into fixed-dimension vectors.
///
/// Implementations wrap a specific model server behind a unified async
/// interface. A batch either succeeds as a whole or fails as a whole; there
/// is no partial success.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::EmbeddingGenerator;
///
/// let vectors = embedder.embed_many(&["alpha".to_string(), "beta".to_string()]).await?;
/// assert_eq!(vectors.len(), 2);
/// ```
#[async_trait]
pub trait EmbeddingGenerator: Send + Sync {
    /// Embed a batch of texts.
    ///
    /// The output is order-preserving and 1:1 with `texts`.
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Embed a single text.
    ///
    /// The default implementation sends a batch of one.
    async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_many(&[text.to_string()]).await?;
        if vectors.len() != 1 {
            return Err(RagError::CountMismatch {
                context: "single embedding".to_string(),
                expected: 1,
                actual: vectors.len(),
            });
        }
        Ok(vectors.remove(0))
    }
}
