//! Command implementations wiring the Ollama and Qdrant backends into the
//! ragline pipelines.

use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use ragline::ollama::{OllamaEmbedder, OllamaGenerator};
use ragline::pdf::PdfLoader;
use ragline::qdrant::QdrantIndexer;
use ragline::{
    CollectionPolicy, ExtensionLoader, IngestReport, IngestionPipeline, QueryOrchestrator,
    QueryTarget, RagConfig, RagError, RecursiveSplitter, RetrievalMerger, RetrievalResult,
    TextFileLoader,
};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::cli::{Cli, Command, QueryArgs, Settings, SourceArgs};

/// Longest excerpt printed for each retrieved document.
const EXCERPT_CHARS: usize = 200;

/// Connected backends shared by the pipelines.
struct Backends {
    embedder: Arc<OllamaEmbedder>,
    generator: Arc<OllamaGenerator>,
    indexer: Arc<QdrantIndexer>,
}

impl Backends {
    fn connect(settings: &Settings) -> anyhow::Result<Self> {
        let indexer = QdrantIndexer::new(&settings.qdrant_url)
            .with_context(|| format!("failed to connect to Qdrant at {}", settings.qdrant_url))?;
        let embedder = OllamaEmbedder::new(&settings.ollama_url, &settings.embedding_model)?;
        let generator = OllamaGenerator::new(&settings.ollama_url, &settings.generation_model)?;
        info!(
            ollama = %settings.ollama_url,
            qdrant = %settings.qdrant_url,
            embedding_model = %settings.embedding_model,
            generation_model = %settings.generation_model,
            "backends configured"
        );
        Ok(Self {
            embedder: Arc::new(embedder),
            generator: Arc::new(generator),
            indexer: Arc::new(indexer),
        })
    }
}

fn base_config(settings: &Settings) -> ragline::RagConfigBuilder {
    RagConfig::builder()
        .chunk_size(settings.chunk_size)
        .chunk_overlap(settings.chunk_overlap)
        .vector_size(settings.vector_size)
        .default_collection(settings.collection.clone())
}

fn query_config(settings: &Settings, args: &QueryArgs) -> anyhow::Result<RagConfig> {
    let mut builder = base_config(settings)
        .top_k(args.top_k)
        .top_k_per_collection(args.top_k_per_collection);
    if let Some(chars) = args.max_context_chars {
        builder = builder.max_context_chars(chars);
    }
    Ok(builder.build()?)
}

/// Run the parsed command to completion.
pub async fn run(cli: Cli, cancel: &CancellationToken) -> anyhow::Result<()> {
    let backends = Backends::connect(&cli.settings)?;
    match &cli.command {
        Command::Ingest(args) => {
            let policy = CollectionPolicy::Single(cli.settings.collection.clone());
            ingest(&backends, &cli.settings, args, &policy, cancel).await
        }
        Command::IngestPerSource(args) => {
            ingest(&backends, &cli.settings, args, &CollectionPolicy::PerSource, cancel).await
        }
        Command::Query(args) => query(&backends, &cli.settings, args, cancel).await,
        Command::Stream(args) => stream(&backends, &cli.settings, args, cancel).await,
        Command::Collections => collections(&backends, cancel).await,
    }
}

async fn ingest(
    backends: &Backends,
    settings: &Settings,
    args: &SourceArgs,
    policy: &CollectionPolicy,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let config = base_config(settings).build()?;
    let pipeline = IngestionPipeline::builder()
        .splitter(Arc::new(RecursiveSplitter::from_config(&config)))
        .config(config)
        .loader(Arc::new(
            ExtensionLoader::new(Arc::new(TextFileLoader::new()))
                .route("pdf", Arc::new(PdfLoader::new())),
        ))
        .embedder(backends.embedder.clone())
        .indexer(backends.indexer.clone())
        .build()?;

    let report = pipeline
        .ingest_dir(&args.dir, &args.pattern, policy, cancel)
        .await
        .with_context(|| format!("ingestion from {} failed", args.dir.display()))?;
    print_report(&report);
    Ok(())
}

fn orchestrator(
    backends: &Backends,
    settings: &Settings,
    args: &QueryArgs,
) -> anyhow::Result<QueryOrchestrator> {
    Ok(QueryOrchestrator::builder()
        .config(query_config(settings, args)?)
        .embedder(backends.embedder.clone())
        .indexer(backends.indexer.clone())
        .generator(backends.generator.clone())
        .build()?)
}

async fn query(
    backends: &Backends,
    settings: &Settings,
    args: &QueryArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let orchestrator = orchestrator(backends, settings, args)?;
    let target = if args.all { QueryTarget::AllCollections } else { QueryTarget::Default };

    match orchestrator.answer(&args.question, &target, cancel).await {
        Ok(answer) => {
            println!("{}", answer.text);
            print_documents(&answer.documents);
            Ok(())
        }
        Err(e) => Err(report_failure(e)),
    }
}

async fn stream(
    backends: &Backends,
    settings: &Settings,
    args: &QueryArgs,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let orchestrator = orchestrator(backends, settings, args)?;
    let target = if args.all {
        QueryTarget::AllCollections
    } else {
        let collections = orchestrator.list_collections(cancel).await?;
        if collections.len() > 1 {
            info!(collections = collections.len(), "searching every collection");
            QueryTarget::AllCollections
        } else {
            QueryTarget::Default
        }
    };

    let mut output = FragmentWriter::new(std::io::stdout());
    let result = orchestrator
        .answer_streaming(&args.question, &target, |fragment| output.write(fragment), cancel)
        .await;
    output.finish();

    match result {
        Ok(documents) => {
            print_documents(&documents);
            Ok(())
        }
        Err(e) => Err(report_failure(e)),
    }
}

async fn collections(backends: &Backends, cancel: &CancellationToken) -> anyhow::Result<()> {
    let merger = RetrievalMerger::new(backends.indexer.clone(), 1);
    let names = merger.list_collections(cancel).await?;
    if names.is_empty() {
        println!("No collections found.");
    }
    for name in names {
        println!("{name}");
    }
    Ok(())
}

/// Writes streamed fragments as they arrive.
///
/// The first write or flush failure is logged once; later fragments are
/// dropped.
struct FragmentWriter<W: Write> {
    out: W,
    failed: bool,
}

impl<W: Write> FragmentWriter<W> {
    fn new(out: W) -> Self {
        Self { out, failed: false }
    }

    fn write(&mut self, fragment: &str) {
        if self.failed {
            return;
        }
        if let Err(e) = self.out.write_all(fragment.as_bytes()).and_then(|()| self.out.flush()) {
            warn!(error = %e, "failed to write answer to stdout; dropping further output");
            self.failed = true;
        }
    }

    fn finish(&mut self) {
        self.write("\n");
    }
}

/// Print the documents a failed generation had retrieved before surfacing
/// the error.
fn report_failure(error: RagError) -> anyhow::Error {
    let documents = error.retrieved_documents();
    if !documents.is_empty() {
        warn!(documents = documents.len(), "generation failed after retrieval");
        print_documents(documents);
    }
    error.into()
}

fn print_report(report: &IngestReport) {
    println!(
        "Indexed {} chunks into {} collection(s).",
        report.chunks_indexed,
        report.collections.len()
    );
    for summary in &report.collections {
        println!(
            "  {}: {} chunks from {} source(s)",
            summary.collection,
            summary.chunks,
            summary.sources.len()
        );
    }
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.source.display(), skipped.reason);
    }
}

fn print_documents(documents: &[RetrievalResult]) {
    if documents.is_empty() {
        return;
    }
    println!("\nRetrieved documents:");
    for (i, result) in documents.iter().enumerate() {
        let score =
            result.usable_score().map_or_else(|| "n/a".to_string(), |s| format!("{s:.4}"));
        let source = result.document.source().unwrap_or("unknown");
        println!("{}. [{}] score {score}, source {source}", i + 1, result.collection);
        println!("   {}", excerpt(result.content()));
    }
}

fn excerpt(content: &str) -> String {
    let flat = content.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= EXCERPT_CHARS {
        return flat;
    }
    let cut: String = flat.chars().take(EXCERPT_CHARS).collect();
    format!("{cut}...")
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Accepts a fixed number of writes, then fails.
    struct Limited {
        written: Vec<u8>,
        writes_left: usize,
    }

    impl Write for Limited {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            if self.writes_left == 0 {
                return Err(std::io::ErrorKind::BrokenPipe.into());
            }
            self.writes_left -= 1;
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn fragment_writer_stops_after_first_failure() {
        let mut writer = FragmentWriter::new(Limited { written: Vec::new(), writes_left: 2 });
        writer.write("Hel");
        writer.write("lo");
        assert!(!writer.failed);

        writer.write(" world");
        assert!(writer.failed);

        writer.out.writes_left = 5;
        writer.write("ignored");
        writer.finish();
        assert_eq!(writer.out.written, b"Hello");
    }

    #[test]
    fn excerpt_flattens_and_truncates() {
        assert_eq!(excerpt("a\n\nb   c"), "a b c");
        let long = "x".repeat(EXCERPT_CHARS + 10);
        let cut = excerpt(&long);
        assert!(cut.ends_with("..."));
        assert_eq!(cut.chars().count(), EXCERPT_CHARS + 3);
    }
}
