//! Query orchestration.
//!
//! The [`QueryOrchestrator`] answers a question in four steps: embed the
//! question, retrieve ranked documents through the [`RetrievalMerger`],
//! build a grounding prompt from them, and drive the [`Generator`]. Blocking
//! and streaming answers share the first three steps, so both see the same
//! documents for the same query and index state.
//!
//! # Example
//!
//! ```rust,ignore
//! use ragline::{QueryOrchestrator, QueryTarget, RagConfig};
//!
//! let orchestrator = QueryOrchestrator::builder()
//!     .config(RagConfig::default())
//!     .embedder(Arc::new(embedder))
//!     .indexer(Arc::new(indexer))
//!     .generator(Arc::new(generator))
//!     .build()?;
//!
//! let documents = orchestrator
//!     .answer_streaming("What changed?", &QueryTarget::AllCollections, |f| print!("{f}"), &cancel)
//!     .await?;
//! ```

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::cancel::cancellable;
use crate::config::RagConfig;
use crate::document::RetrievalResult;
use crate::embedding::EmbeddingGenerator;
use crate::error::{RagError, Result};
use crate::generator::Generator;
use crate::indexer::Indexer;
use crate::merger::RetrievalMerger;

/// Answer returned when retrieval finds nothing.
pub const NO_RELEVANT_DOCUMENTS: &str = "No relevant documents found to answer the query.";

const SINGLE_CONTEXT_HEADER: &str = "Based on the following context:";
const MULTI_CONTEXT_HEADER: &str = "Based on the following context from multiple documents:";

/// Which collections a query searches.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum QueryTarget {
    /// The configured default collection.
    #[default]
    Default,
    /// One named collection.
    Collection(String),
    /// Every collection the indexer lists.
    AllCollections,
}

/// A generated answer and the documents that grounded it.
#[derive(Debug, Clone, PartialEq)]
pub struct Answer {
    /// The generated text, or [`NO_RELEVANT_DOCUMENTS`].
    pub text: String,
    /// Ranked documents used as context.
    pub documents: Vec<RetrievalResult>,
}

struct Retrieval {
    documents: Vec<RetrievalResult>,
    multi_collection: bool,
}

/// Join retrieved contents in ranked order, separated by a blank line.
pub fn build_context(results: &[RetrievalResult]) -> String {
    results.iter().map(RetrievalResult::content).collect::<Vec<_>>().join("\n\n")
}

/// Build the grounding prompt for `query`.
pub fn build_prompt(context: &str, query: &str, multi_collection: bool) -> String {
    let header = if multi_collection { MULTI_CONTEXT_HEADER } else { SINGLE_CONTEXT_HEADER };
    format!("{header}\n\n{context}\n\nAnswer the question: {query}")
}

/// Keep leading results while the context block stays within `max_chars`.
/// The top result is always kept.
fn cap_context(results: Vec<RetrievalResult>, max_chars: usize) -> Vec<RetrievalResult> {
    let mut used = 0;
    let mut kept = Vec::with_capacity(results.len());
    for result in results {
        let len = result.content().chars().count();
        let needed = if kept.is_empty() { len } else { used + 2 + len };
        if !kept.is_empty() && needed > max_chars {
            break;
        }
        used = needed;
        kept.push(result);
    }
    kept
}

/// Embeds questions, retrieves context and drives generation.
///
/// Construct one via [`QueryOrchestrator::builder()`].
pub struct QueryOrchestrator {
    config: RagConfig,
    embedder: Arc<dyn EmbeddingGenerator>,
    merger: RetrievalMerger,
    generator: Arc<dyn Generator>,
}

impl QueryOrchestrator {
    /// Create a new [`QueryOrchestratorBuilder`].
    pub fn builder() -> QueryOrchestratorBuilder {
        QueryOrchestratorBuilder::default()
    }

    /// Return a reference to the configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// List every collection a [`QueryTarget::AllCollections`] query would search.
    pub async fn list_collections(&self, cancel: &CancellationToken) -> Result<Vec<String>> {
        self.merger.list_collections(cancel).await
    }

    /// Retrieve the ranked documents for `query` without generating.
    ///
    /// # Errors
    ///
    /// Fails if the query cannot be embedded, the collection list cannot be
    /// read, or `cancel` fires.
    pub async fn retrieve(
        &self,
        query: &str,
        target: &QueryTarget,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrievalResult>> {
        Ok(self.run_retrieval(query, target, cancel).await?.documents)
    }

    /// Answer `query` with a single blocking completion.
    ///
    /// An empty retrieval returns [`NO_RELEVANT_DOCUMENTS`] with no documents
    /// and no error.
    ///
    /// # Errors
    ///
    /// Retrieval failures are returned as-is. A generation failure is
    /// returned as [`RagError::GenerationFailed`] carrying the documents.
    pub async fn answer(
        &self,
        query: &str,
        target: &QueryTarget,
        cancel: &CancellationToken,
    ) -> Result<Answer> {
        let retrieval = self.run_retrieval(query, target, cancel).await?;
        if retrieval.documents.is_empty() {
            info!(?target, "no relevant documents found");
            return Ok(Answer { text: NO_RELEVANT_DOCUMENTS.to_string(), documents: Vec::new() });
        }

        let prompt = retrieval.prompt(query);
        match cancellable(cancel, self.generator.complete(&prompt)).await {
            Ok(text) => {
                info!(
                    documents = retrieval.documents.len(),
                    answer_len = text.len(),
                    "answered query"
                );
                Ok(Answer { text, documents: retrieval.documents })
            }
            Err(RagError::Cancelled) => Err(RagError::Cancelled),
            Err(e) => Err(Self::generation_failed(e, retrieval.documents)),
        }
    }

    /// Answer `query`, forwarding each generated fragment to `on_chunk` in
    /// order, and return the documents used as context.
    ///
    /// An empty retrieval delivers [`NO_RELEVANT_DOCUMENTS`] as the only chunk
    /// and returns no documents. Once `cancel` fires no further fragments are
    /// delivered.
    ///
    /// # Errors
    ///
    /// Same as [`answer`](Self::answer), plus [`RagError::Cancelled`] when the
    /// token fires mid-stream.
    pub async fn answer_streaming<F>(
        &self,
        query: &str,
        target: &QueryTarget,
        mut on_chunk: F,
        cancel: &CancellationToken,
    ) -> Result<Vec<RetrievalResult>>
    where
        F: FnMut(&str) + Send,
    {
        let retrieval = self.run_retrieval(query, target, cancel).await?;
        if retrieval.documents.is_empty() {
            info!(?target, "no relevant documents found");
            on_chunk(NO_RELEVANT_DOCUMENTS);
            return Ok(Vec::new());
        }

        let prompt = retrieval.prompt(query);
        let mut fragments = 0usize;
        let result = {
            let mut forward = |fragment: &str| {
                if !cancel.is_cancelled() {
                    fragments += 1;
                    on_chunk(fragment);
                }
            };
            cancellable(cancel, self.generator.complete_streaming(&prompt, &mut forward)).await
        };

        match result {
            Ok(()) if cancel.is_cancelled() => Err(RagError::Cancelled),
            Ok(()) => {
                info!(documents = retrieval.documents.len(), fragments, "streamed answer");
                Ok(retrieval.documents)
            }
            Err(RagError::Cancelled) => Err(RagError::Cancelled),
            Err(e) => Err(Self::generation_failed(e, retrieval.documents)),
        }
    }

    async fn run_retrieval(
        &self,
        query: &str,
        target: &QueryTarget,
        cancel: &CancellationToken,
    ) -> Result<Retrieval> {
        // 1. Embed the query
        let vector = cancellable(cancel, self.embedder.embed_one(query)).await.inspect_err(|e| {
            error!(error = %e, "embedding failed during query");
        })?;

        // 2. Resolve target collections
        let (collections, top_k, multi_collection) = match target {
            QueryTarget::Default => {
                (vec![self.config.default_collection.clone()], self.config.top_k, false)
            }
            QueryTarget::Collection(name) => (vec![name.clone()], self.config.top_k, false),
            QueryTarget::AllCollections => {
                let names = self.merger.list_collections(cancel).await.inspect_err(|e| {
                    error!(error = %e, "listing collections failed during query");
                })?;
                (names, self.config.top_k_per_collection, true)
            }
        };

        // 3. Search and merge
        let mut documents = self.merger.search(&vector, &collections, top_k, cancel).await?;
        if multi_collection {
            if let Some(max_chars) = self.config.max_context_chars {
                documents = cap_context(documents, max_chars);
            }
        }

        Ok(Retrieval { documents, multi_collection })
    }

    fn generation_failed(e: RagError, documents: Vec<RetrievalResult>) -> RagError {
        error!(error = %e, documents = documents.len(), "generation failed after retrieval");
        RagError::GenerationFailed { message: e.to_string(), documents }
    }
}

impl Retrieval {
    fn prompt(&self, query: &str) -> String {
        build_prompt(&build_context(&self.documents), query, self.multi_collection)
    }
}

/// Builder for constructing a [`QueryOrchestrator`].
///
/// All fields are required. Call [`build()`](QueryOrchestratorBuilder::build)
/// to validate and produce the orchestrator.
#[derive(Default)]
pub struct QueryOrchestratorBuilder {
    config: Option<RagConfig>,
    embedder: Option<Arc<dyn EmbeddingGenerator>>,
    indexer: Option<Arc<dyn Indexer>>,
    generator: Option<Arc<dyn Generator>>,
}

impl QueryOrchestratorBuilder {
    /// Set the configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding generator used for queries.
    pub fn embedder(mut self, embedder: Arc<dyn EmbeddingGenerator>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    /// Set the indexer searched for context.
    pub fn indexer(mut self, indexer: Arc<dyn Indexer>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    /// Set the generator producing answers.
    pub fn generator(mut self, generator: Arc<dyn Generator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Build the [`QueryOrchestrator`], validating that all fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if any field is missing.
    pub fn build(self) -> Result<QueryOrchestrator> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        let embedder =
            self.embedder.ok_or_else(|| RagError::ConfigError("embedder is required".to_string()))?;
        let indexer =
            self.indexer.ok_or_else(|| RagError::ConfigError("indexer is required".to_string()))?;
        let generator = self
            .generator
            .ok_or_else(|| RagError::ConfigError("generator is required".to_string()))?;

        let merger = RetrievalMerger::new(indexer, config.search_concurrency);
        Ok(QueryOrchestrator { config, embedder, merger, generator })
    }
}
