//! # ragline
//!
//! Retrieval-augmented generation over pluggable backends.
//!
//! The crate is split into two pipelines that share a small set of
//! collaborator traits:
//!
//! - [`IngestionPipeline`] loads sources, splits them into chunks, embeds the
//!   chunks and writes them into one collection or one collection per source.
//! - [`QueryOrchestrator`] embeds a question, fans the search out over one or
//!   many collections through the [`RetrievalMerger`], builds a grounding
//!   prompt and drives a [`Generator`] in blocking or streaming mode.
//!
//! Backends are reached only through [`EmbeddingGenerator`], [`Indexer`],
//! [`Generator`], [`Loader`] and [`Splitter`]. The `ollama` and `qdrant`
//! features ship network backends, and the `pdf` feature adds a per-page PDF
//! loader. [`InMemoryIndexer`] is always available.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragline::{QueryOrchestrator, QueryTarget, RagConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let orchestrator = QueryOrchestrator::builder()
//!     .config(RagConfig::default())
//!     .embedder(embedder)
//!     .indexer(indexer)
//!     .generator(generator)
//!     .build()?;
//!
//! let answer = orchestrator
//!     .answer("What is a chunk?", &QueryTarget::Default, &CancellationToken::new())
//!     .await?;
//! println!("{}", answer.text);
//! ```

mod cancel;

pub mod chunking;
pub mod collection;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generator;
pub mod indexer;
pub mod inmemory;
pub mod ingestion;
pub mod loader;
pub mod merger;
pub mod orchestrator;

#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "pdf")]
pub mod pdf;
#[cfg(feature = "qdrant")]
pub mod qdrant;

pub use chunking::{FixedSizeSplitter, RecursiveSplitter, Splitter};
pub use collection::{collection_name_for_source, sanitize_collection_name};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Document, Metadata, MetadataValue, RetrievalResult};
pub use embedding::EmbeddingGenerator;
pub use error::{ErrorKind, RagError, Result};
pub use generator::Generator;
pub use indexer::{IndexPoint, Indexer, SearchHit};
pub use ingestion::{
    CollectionPolicy, CollectionSummary, IngestReport, IngestionPipeline,
    IngestionPipelineBuilder, SkippedSource,
};
pub use inmemory::InMemoryIndexer;
pub use loader::{ExtensionLoader, Loader, TextFileLoader, discover_sources};
pub use merger::{RetrievalMerger, compare_scores, merge_ranked};
pub use orchestrator::{
    Answer, NO_RELEVANT_DOCUMENTS, QueryOrchestrator, QueryOrchestratorBuilder, QueryTarget,
};
