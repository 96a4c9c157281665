//! Error types for the `ragline` crate.

use thiserror::Error;

use crate::document::RetrievalResult;

/// Errors that can occur in ingestion and query operations.
#[derive(Debug, Error)]
pub enum RagError {
    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred in the index backend.
    #[error("Indexer error ({backend}): {message}")]
    IndexerError {
        /// The index backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred while generating text.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation backend that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A source could not be loaded.
    #[error("Loader error ({source_ref}): {message}")]
    LoaderError {
        /// The source that failed to load.
        source_ref: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during document splitting.
    #[error("Chunking error: {0}")]
    ChunkingError(String),

    /// A configuration validation error, or a missing source directory.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Source discovery matched nothing.
    #[error("No sources matched: {0}")]
    NoSourcesMatched(String),

    /// Every source produced zero chunks for a single-collection ingestion.
    #[error("No documents to ingest into collection '{collection}'")]
    NoDocuments {
        /// The target collection.
        collection: String,
    },

    /// A backend returned a different number of items than it was given.
    #[error("Count mismatch in {context}: expected {expected}, got {actual}")]
    CountMismatch {
        /// The operation that produced the mismatch.
        context: String,
        /// The number of items sent.
        expected: usize,
        /// The number of items returned.
        actual: usize,
    },

    /// An embedding length does not match the collection's vector size.
    #[error("Dimension mismatch in collection '{collection}': expected {expected}, got {actual}")]
    DimensionMismatch {
        /// The collection being written or searched.
        collection: String,
        /// The collection's configured vector size.
        expected: usize,
        /// The offending vector length.
        actual: usize,
    },

    /// A stored payload could not be turned back into a document.
    #[error("Malformed payload in collection '{collection}': {message}")]
    MalformedPayload {
        /// The collection the payload came from.
        collection: String,
        /// A description of the problem.
        message: String,
    },

    /// The operation was cancelled by its caller.
    #[error("Operation cancelled")]
    Cancelled,

    /// Generation failed after retrieval succeeded.
    ///
    /// The ranked documents are kept so callers can report that retrieval
    /// worked even though no answer was produced.
    #[error("Generation failed with {} retrieved documents: {message}", .documents.len())]
    GenerationFailed {
        /// The underlying generation failure.
        message: String,
        /// The documents retrieved for the query.
        documents: Vec<RetrievalResult>,
    },
}

/// Coarse classification of a [`RagError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Bad backend endpoint, invalid parameters or a missing source directory.
    Configuration,
    /// A single backend call failed; the caller may skip and continue.
    Transient,
    /// Count or dimension mismatch, or a malformed payload.
    Data,
    /// Nothing to work with: no sources or no chunks.
    EmptyResult,
    /// The caller cancelled the operation.
    Cancelled,
}

impl RagError {
    /// Classify this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            RagError::EmbeddingError { .. }
            | RagError::IndexerError { .. }
            | RagError::GenerationError { .. }
            | RagError::LoaderError { .. }
            | RagError::GenerationFailed { .. } => ErrorKind::Transient,
            RagError::ChunkingError(_)
            | RagError::CountMismatch { .. }
            | RagError::DimensionMismatch { .. }
            | RagError::MalformedPayload { .. } => ErrorKind::Data,
            RagError::ConfigError(_) => ErrorKind::Configuration,
            RagError::NoSourcesMatched(_) | RagError::NoDocuments { .. } => ErrorKind::EmptyResult,
            RagError::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Whether the failure is confined to one backend call.
    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }

    /// Whether the caller cancelled the operation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RagError::Cancelled)
    }

    /// Documents retrieved before the failure, if any.
    pub fn retrieved_documents(&self) -> &[RetrievalResult] {
        match self {
            RagError::GenerationFailed { documents, .. } => documents,
            _ => &[],
        }
    }
}

/// A convenience result type for ragline operations.
pub type Result<T> = std::result::Result<T, RagError>;
