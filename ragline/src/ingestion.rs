//! Ingestion pipeline.
//!
//! The [`IngestionPipeline`] turns source files into indexed chunks
//! (load → split → embed → upsert) under one of two [`CollectionPolicy`]s:
//!
//! - [`CollectionPolicy::Single`] rebuilds one shared collection from every
//!   source. A source that fails to load or split is skipped; the run fails
//!   only if the collection cannot be ensured, nothing was produced, or the
//!   embed/upsert batch fails.
//! - [`CollectionPolicy::PerSource`] rebuilds one collection per source,
//!   named after the file. Any failure only skips that source.
//!
//! Point ids are regenerated on every run, so re-ingestion is idempotent in
//! content but not in identity. Callers must not run overlapping ingestions
//! against the same collection name.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragline::{CollectionPolicy, IngestionPipeline, RagConfig};
//!
//! let pipeline = IngestionPipeline::builder()
//!     .config(RagConfig::default())
//!     .loader(Arc::new(TextFileLoader::new()))
//!     .splitter(Arc::new(RecursiveSplitter::new(1000, 100)))
//!     .embedder(Arc::new(embedder))
//!     .indexer(Arc::new(InMemoryIndexer::new()))
//!     .build()?;
//!
//! let report = pipeline
//!     .ingest_dir(Path::new("data/docs"), "*.txt", &CollectionPolicy::PerSource, &cancel)
//!     .await?;
//! println!("indexed {} chunks", report.chunks_indexed);
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use futures::{StreamExt, stream};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::cancel::{cancellable, check};
use crate::chunking::Splitter;
use crate::collection::collection_name_for_source;
use crate::config::RagConfig;
use crate::document::Document;
use crate::embedding::EmbeddingGenerator;
use crate::error::{RagError, Result};
use crate::indexer::{IndexPoint, Indexer};
use crate::loader::{Loader, discover_sources};

/// Where ingested chunks are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollectionPolicy {
    /// Every source feeds the named collection.
    Single(String),
    /// Each source gets its own collection named after its file.
    PerSource,
}

/// Chunks written to one collection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    /// The collection written.
    pub collection: String,
    /// Sources whose chunks landed in the collection.
    pub sources: Vec<PathBuf>,
    /// Number of chunks indexed.
    pub chunks: usize,
}

/// A source left out of an ingestion run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedSource {
    /// The skipped source.
    pub source: PathBuf,
    /// Why it was skipped.
    pub reason: String,
}

/// Outcome of an ingestion run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Total chunks indexed across all collections.
    pub chunks_indexed: usize,
    /// Collections written, in source order.
    pub collections: Vec<CollectionSummary>,
    /// Sources skipped, in source order.
    pub skipped: Vec<SkippedSource>,
}

impl IngestReport {
    fn skip(&mut self, source: &Path, reason: impl Into<String>) {
        self.skipped.push(SkippedSource { source: source.to_path_buf(), reason: reason.into() });
    }
}

/// Loads, splits, embeds and indexes sources.
///
/// Construct one via [`IngestionPipeline::builder()`].
pub struct IngestionPipeline {
    config: RagConfig,
    loader: Arc<dyn Loader>,
    splitter: Arc<dyn Splitter>,
    embedder: Arc<dyn EmbeddingGenerator>,
    indexer: Arc<dyn Indexer>,
}

impl IngestionPipeline {
    /// Create a new [`IngestionPipelineBuilder`].
    pub fn builder() -> IngestionPipelineBuilder {
        IngestionPipelineBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Discover sources in `dir` matching `pattern` and ingest them with the
    /// configured vector size.
    ///
    /// # Errors
    ///
    /// Fails with [`RagError::NoSourcesMatched`] or [`RagError::ConfigError`]
    /// from discovery, then as [`ingest`](Self::ingest).
    pub async fn ingest_dir(
        &self,
        dir: &Path,
        pattern: &str,
        policy: &CollectionPolicy,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let sources = discover_sources(dir, pattern).inspect_err(|e| {
            error!(dir = %dir.display(), pattern, error = %e, "source discovery failed");
        })?;
        self.ingest(&sources, policy, self.config.vector_size, cancel).await
    }

    /// Ingest `sources` under `policy` into collections of `vector_size`.
    ///
    /// Returns a report whose `chunks_indexed` is the number of chunks the
    /// splitter produced from every source that was not skipped.
    ///
    /// # Errors
    ///
    /// - [`RagError::NoSourcesMatched`] if `sources` is empty
    /// - [`RagError::Cancelled`] if `cancel` fires
    /// - for [`CollectionPolicy::Single`]: the ensure failure,
    ///   [`RagError::NoDocuments`], or the embed/upsert failure
    pub async fn ingest(
        &self,
        sources: &[PathBuf],
        policy: &CollectionPolicy,
        vector_size: usize,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        if sources.is_empty() {
            return Err(RagError::NoSourcesMatched("no sources given".to_string()));
        }
        check(cancel)?;

        let report = match policy {
            CollectionPolicy::Single(collection) => {
                self.ingest_single(sources, collection, vector_size, cancel).await?
            }
            CollectionPolicy::PerSource => {
                self.ingest_per_source(sources, vector_size, cancel).await?
            }
        };

        info!(
            chunks = report.chunks_indexed,
            collections = report.collections.len(),
            skipped = report.skipped.len(),
            "ingestion finished"
        );
        Ok(report)
    }

    async fn ingest_single(
        &self,
        sources: &[PathBuf],
        collection: &str,
        vector_size: usize,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        // 1. Reset the collection
        self.reset_collection(collection, vector_size, cancel).await?;

        // 2. Load and split every source, keeping source order
        let prepared: Vec<Result<Vec<Document>>> = stream::iter(sources)
            .map(|source| self.prepare_source(source, cancel))
            .buffered(self.config.ingest_concurrency.max(1))
            .collect()
            .await;

        let mut report = IngestReport::default();
        let mut chunks = Vec::new();
        let mut used_sources = Vec::new();
        for (source, outcome) in sources.iter().zip(prepared) {
            match outcome {
                Ok(source_chunks) => {
                    chunks.extend(source_chunks);
                    used_sources.push(source.clone());
                }
                Err(RagError::Cancelled) => return Err(RagError::Cancelled),
                Err(e) => {
                    warn!(source = %source.display(), error = %e, "skipping source");
                    report.skip(source, e.to_string());
                }
            }
        }

        // 3. Refuse to write an empty collection
        if chunks.is_empty() {
            error!(collection, "no chunks produced from any source");
            return Err(RagError::NoDocuments { collection: collection.to_string() });
        }

        // 4. Embed and upsert in one batch
        let count = self.index_chunks(collection, chunks, vector_size, cancel).await?;
        report.chunks_indexed = count;
        report.collections.push(CollectionSummary {
            collection: collection.to_string(),
            sources: used_sources,
            chunks: count,
        });
        Ok(report)
    }

    async fn ingest_per_source(
        &self,
        sources: &[PathBuf],
        vector_size: usize,
        cancel: &CancellationToken,
    ) -> Result<IngestReport> {
        let mut report = IngestReport::default();

        // Sources mapping to an already claimed name are skipped so that no
        // two tasks write the same collection.
        let mut claimed = HashSet::new();
        let mut jobs = Vec::new();
        for source in sources {
            match collection_name_for_source(source) {
                Some(name) if claimed.insert(name.clone()) => jobs.push((source, name)),
                Some(name) => {
                    warn!(
                        source = %source.display(),
                        collection = %name,
                        "collection name already used, skipping source"
                    );
                    report.skip(
                        source,
                        format!("collection name '{name}' already used by another source"),
                    );
                }
                None => {
                    warn!(source = %source.display(), "no usable collection name, skipping source");
                    report.skip(source, "file name yields an empty collection name");
                }
            }
        }

        let outcomes: Vec<Result<usize>> = stream::iter(&jobs)
            .map(|(source, name)| self.ingest_one_source(source, name, vector_size, cancel))
            .buffered(self.config.ingest_concurrency.max(1))
            .collect()
            .await;

        for ((source, name), outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                Ok(0) => {
                    warn!(
                        source = %source.display(),
                        collection = %name,
                        "source produced no chunks"
                    );
                    report.skip(source, "source produced no chunks");
                }
                Ok(count) => {
                    report.chunks_indexed += count;
                    report.collections.push(CollectionSummary {
                        collection: name.clone(),
                        sources: vec![source.to_path_buf()],
                        chunks: count,
                    });
                }
                Err(RagError::Cancelled) => return Err(RagError::Cancelled),
                Err(e) => {
                    warn!(
                        source = %source.display(),
                        collection = %name,
                        error = %e,
                        "skipping source"
                    );
                    report.skip(source, e.to_string());
                }
            }
        }

        Ok(report)
    }

    /// Rebuild one source's collection and return the number of chunks written.
    async fn ingest_one_source(
        &self,
        source: &Path,
        collection: &str,
        vector_size: usize,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        self.reset_collection(collection, vector_size, cancel).await?;
        let chunks = self.prepare_source(source, cancel).await?;
        if chunks.is_empty() {
            return Ok(0);
        }
        self.index_chunks(collection, chunks, vector_size, cancel).await
    }

    /// Best-effort delete followed by a mandatory ensure.
    async fn reset_collection(
        &self,
        collection: &str,
        vector_size: usize,
        cancel: &CancellationToken,
    ) -> Result<()> {
        match cancellable(cancel, self.indexer.delete_collection(collection)).await {
            Ok(()) => {}
            Err(RagError::Cancelled) => return Err(RagError::Cancelled),
            Err(e) => warn!(collection, error = %e, "failed to delete collection, continuing"),
        }

        cancellable(cancel, self.indexer.ensure_collection(collection, vector_size))
            .await
            .inspect_err(|e| {
                error!(collection, vector_size, error = %e, "failed to ensure collection");
            })
    }

    async fn prepare_source(
        &self,
        source: &Path,
        cancel: &CancellationToken,
    ) -> Result<Vec<Document>> {
        let documents = cancellable(cancel, self.loader.load(source)).await?;
        let chunks = self.splitter.split(documents)?;
        info!(source = %source.display(), chunk_count = chunks.len(), "prepared source");
        Ok(chunks)
    }

    async fn index_chunks(
        &self,
        collection: &str,
        chunks: Vec<Document>,
        vector_size: usize,
        cancel: &CancellationToken,
    ) -> Result<usize> {
        // 1. Embed every chunk in one batch
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let vectors = cancellable(cancel, self.embedder.embed_many(&texts)).await.inspect_err(|e| {
            error!(collection, error = %e, "embedding failed during ingestion");
        })?;

        // 2. Check the batch shape before writing anything
        if vectors.len() != chunks.len() {
            error!(
                collection,
                expected = chunks.len(),
                actual = vectors.len(),
                "embedding count mismatch"
            );
            return Err(RagError::CountMismatch {
                context: format!("embedding batch for collection '{collection}'"),
                expected: chunks.len(),
                actual: vectors.len(),
            });
        }
        if let Some(bad) = vectors.iter().find(|v| v.len() != vector_size) {
            error!(
                collection,
                expected = vector_size,
                actual = bad.len(),
                "embedding dimension mismatch"
            );
            return Err(RagError::DimensionMismatch {
                collection: collection.to_string(),
                expected: vector_size,
                actual: bad.len(),
            });
        }

        // 3. Upsert
        let points: Vec<IndexPoint> = vectors
            .into_iter()
            .zip(chunks)
            .map(|(vector, payload)| IndexPoint { vector, payload })
            .collect();
        let expected = points.len();
        let ids =
            cancellable(cancel, self.indexer.upsert(collection, points)).await.inspect_err(|e| {
                error!(collection, error = %e, "upsert failed during ingestion");
            })?;
        if ids.len() != expected {
            return Err(RagError::CountMismatch {
                context: format!("upsert into collection '{collection}'"),
                expected,
                actual: ids.len(),
            });
        }

        info!(collection, chunk_count = ids.len(), "indexed chunks");
        Ok(ids.len())
    }
}

/// Builder for constructing an [`IngestionPipeline`].
///
/// All fields are required. Call [`build()`](IngestionPipelineBuilder::build)
/// to validate and produce the pipeline.
#[derive(Default)]
pub struct IngestionPipelineBuilder {
    config: Option<RagConfig>,
    loader: Option<Arc<dyn Loader>>,
    splitter: Option<Arc<dyn Splitter>>,
    embedder: Option<Arc<dyn EmbeddingGenerator>>,
    indexer: Option<Arc<dyn Indexer>>,
}

impl IngestionPipelineBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the source loader.
    pub fn loader(mut self, loader: Arc<dyn Loader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Set the document splitter.
    pub fn splitter(mut self, splitter: Arc<dyn Splitter>) -> Self {
        self.splitter = Some(splitter);
        self
    }

    /// Set the embedding generator.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingGenerator>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the indexer written to.
    pub fn indexer(mut self, indexer: Arc<dyn Indexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Build the [`IngestionPipeline`], validating that all fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any field is missing.
    pub fn build(self) -> Result<IngestionPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let loader =
            self.loader.ok_or_else(|| RagError::ConfigError("loader is required".to_string()))?;
        let splitter =
            self.splitter.ok_or_else(|| RagError::ConfigError("splitter is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let indexer =
            self.indexer.ok_or_else(|| RagError::ConfigError("indexer is required".to_string()))?;

        Ok(IngestionPipeline { config, loader, splitter, embedder, indexer })
    }
}
