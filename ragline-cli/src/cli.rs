//! Command-line arguments.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use ragline::ollama::{DEFAULT_EMBEDDING_MODEL, DEFAULT_GENERATION_MODEL, DEFAULT_OLLAMA_URL};
use ragline::qdrant::DEFAULT_QDRANT_URL;

/// Ingest documents into Qdrant and answer questions about them with Ollama.
#[derive(Parser, Debug)]
#[command(name = "ragline", version, about)]
pub struct Cli {
    #[command(flatten)]
    pub settings: Settings,

    #[command(subcommand)]
    pub command: Command,
}

/// Backend endpoints and pipeline parameters shared by every command.
#[derive(Args, Debug, Clone)]
pub struct Settings {
    /// Ollama server address
    #[arg(long, env = "OLLAMA_URL", default_value = DEFAULT_OLLAMA_URL, global = true)]
    pub ollama_url: String,

    /// Qdrant gRPC address
    #[arg(long, env = "QDRANT_URL", default_value = DEFAULT_QDRANT_URL, global = true)]
    pub qdrant_url: String,

    /// Embedding model served by Ollama
    #[arg(long, env = "EMBEDDING_MODEL", default_value = DEFAULT_EMBEDDING_MODEL, global = true)]
    pub embedding_model: String,

    /// Generation model served by Ollama
    #[arg(long, env = "GENERATION_MODEL", default_value = DEFAULT_GENERATION_MODEL, global = true)]
    pub generation_model: String,

    /// Default collection for ingestion and queries
    #[arg(long, env = "RAG_COLLECTION", default_value = "my_collection", global = true)]
    pub collection: String,

    /// Embedding dimensionality of the collections
    #[arg(long, env = "RAG_VECTOR_SIZE", default_value_t = 768, global = true)]
    pub vector_size: usize,

    /// Maximum characters per chunk
    #[arg(long, env = "RAG_CHUNK_SIZE", default_value_t = 1000, global = true)]
    pub chunk_size: usize,

    /// Characters carried over between consecutive chunks
    #[arg(long, env = "RAG_CHUNK_OVERLAP", default_value_t = 100, global = true)]
    pub chunk_overlap: usize,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Rebuild the default collection from every matching source
    Ingest(SourceArgs),
    /// Rebuild one collection per matching source, named after the file
    IngestPerSource(SourceArgs),
    /// Answer a question with a single completion
    Query(QueryArgs),
    /// Answer a question, printing the answer as it is generated
    ///
    /// Searches every collection when more than one exists.
    Stream(QueryArgs),
    /// List indexed collections
    Collections,
}

#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Directory holding the sources
    #[arg(long, env = "RAG_SOURCE_DIR", default_value = "data/pdfs")]
    pub dir: PathBuf,

    /// File name glob (`*`, `?`, `[...]` and `{a,b}`); `.pdf` files are read per page
    #[arg(long, env = "RAG_SOURCE_PATTERN", default_value = "*.pdf")]
    pub pattern: String,
}

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// The question to answer
    pub question: String,

    /// Search every collection instead of the default one
    #[arg(long)]
    pub all: bool,

    /// Results for single-collection queries
    #[arg(long, default_value_t = 4)]
    pub top_k: usize,

    /// Results per collection for multi-collection queries
    #[arg(long, default_value_t = 2)]
    pub top_k_per_collection: usize,

    /// Cap on the context length of multi-collection prompts
    #[arg(long)]
    pub max_context_chars: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_ingest_per_source() {
        let cli = Cli::try_parse_from([
            "ragline",
            "ingest-per-source",
            "--dir",
            "corpus",
            "--pattern",
            "*.md",
            "--chunk-size",
            "500",
        ])
        .unwrap();

        assert_eq!(cli.settings.chunk_size, 500);
        match cli.command {
            Command::IngestPerSource(args) => {
                assert_eq!(args.dir, PathBuf::from("corpus"));
                assert_eq!(args.pattern, "*.md");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn parses_stream_with_all() {
        let cli = Cli::try_parse_from(["ragline", "stream", "what changed?", "--all"]).unwrap();
        match cli.command {
            Command::Stream(args) => {
                assert_eq!(args.question, "what changed?");
                assert!(args.all);
                assert_eq!(args.top_k_per_collection, 2);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn ingest_defaults_to_pdf_sources() {
        let cli = Cli::try_parse_from(["ragline", "ingest"]).unwrap();
        match cli.command {
            Command::Ingest(args) => {
                assert_eq!(args.dir, PathBuf::from("data/pdfs"));
                assert_eq!(args.pattern, "*.pdf");
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn question_is_required() {
        assert!(Cli::try_parse_from(["ragline", "query"]).is_err());
    }
}
