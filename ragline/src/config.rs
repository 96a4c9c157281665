//! Configuration for ingestion and query pipelines.

use serde::{Deserialize, Serialize};

use crate::collection::sanitize_collection_name;
use crate::error::{RagError, Result};

/// Configuration parameters shared by the ingestion and query pipelines.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk size in characters.
    pub chunk_size: usize,
    /// Number of overlapping characters between consecutive chunks.
    pub chunk_overlap: usize,
    /// Vector size of every collection written by ingestion.
    pub vector_size: usize,
    /// Collection used when a query does not name one.
    pub default_collection: String,
    /// Results per collection for single-collection queries.
    pub top_k: usize,
    /// Results per collection for multi-collection queries.
    pub top_k_per_collection: usize,
    /// Upper bound on prompt context length for multi-collection queries.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_context_chars: Option<usize>,
    /// Maximum number of concurrent per-collection searches.
    pub search_concurrency: usize,
    /// Maximum number of sources loaded or ingested concurrently.
    pub ingest_concurrency: usize,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 100,
            vector_size: 768,
            default_collection: "my_collection".to_string(),
            top_k: 4,
            top_k_per_collection: 2,
            max_context_chars: None,
            search_concurrency: 4,
            ingest_concurrency: 2,
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the vector size used when ensuring collections.
    pub fn vector_size(mut self, size: usize) -> Self {
        self.config.vector_size = size;
        self
    }

    /// Set the collection queried when no target is given.
    pub fn default_collection(mut self, name: impl Into<String>) -> Self {
        self.config.default_collection = name.into();
        self
    }

    /// Set the number of results for single-collection queries.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the number of results per collection for multi-collection queries.
    pub fn top_k_per_collection(mut self, k: usize) -> Self {
        self.config.top_k_per_collection = k;
        self
    }

    /// Cap the context block of multi-collection prompts.
    pub fn max_context_chars(mut self, chars: usize) -> Self {
        self.config.max_context_chars = Some(chars);
        self
    }

    /// Set the number of collections searched concurrently.
    pub fn search_concurrency(mut self, n: usize) -> Self {
        self.config.search_concurrency = n;
        self
    }

    /// Set the number of sources processed concurrently during ingestion.
    pub fn ingest_concurrency(mut self, n: usize) -> Self {
        self.config.ingest_concurrency = n;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_overlap >= chunk_size`
    /// - `vector_size`, `top_k`, `top_k_per_collection` or a concurrency limit is zero
    /// - `default_collection` is empty or not already a sanitized name
    pub fn build(self) -> Result<RagConfig> {
        let config = self.config;
        if config.chunk_overlap >= config.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                config.chunk_overlap, config.chunk_size
            )));
        }
        let positive = [
            ("vector_size", config.vector_size),
            ("top_k", config.top_k),
            ("top_k_per_collection", config.top_k_per_collection),
            ("search_concurrency", config.search_concurrency),
            ("ingest_concurrency", config.ingest_concurrency),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(RagError::ConfigError(format!("{name} must be greater than zero")));
            }
        }
        if config.default_collection.is_empty()
            || sanitize_collection_name(&config.default_collection) != config.default_collection
        {
            return Err(RagError::ConfigError(format!(
                "default_collection '{}' must be a non-empty [a-z0-9_] name",
                config.default_collection
            )));
        }
        Ok(config)
    }
}
