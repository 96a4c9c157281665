//! Source loading and discovery.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use globset::{Glob, GlobMatcher};
use tracing::debug;
use walkdir::WalkDir;

use crate::document::{Document, SOURCE_KEY};
use crate::error::{RagError, Result};

/// Turns a source reference into documents.
///
/// Every returned document carries a `source` metadata entry identifying
/// where it was loaded from.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Load the documents contained in `source`.
    async fn load(&self, source: &Path) -> Result<Vec<Document>>;
}

/// Loads UTF-8 text files (plain text, markdown, source code) as one
/// document per file.
#[derive(Debug, Clone, Copy, Default)]
pub struct TextFileLoader;

impl TextFileLoader {
    /// Create a new text file loader.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Loader for TextFileLoader {
    async fn load(&self, source: &Path) -> Result<Vec<Document>> {
        let content =
            tokio::fs::read_to_string(source).await.map_err(|e| RagError::LoaderError {
                source_ref: source.display().to_string(),
                message: e.to_string(),
            })?;
        debug!(source = %source.display(), bytes = content.len(), "loaded text source");
        Ok(vec![Document::new(content).with_metadata(SOURCE_KEY, source.display().to_string())])
    }
}

/// Routes each source to a loader chosen by its file extension.
///
/// Extensions are compared case-insensitively; sources with no registered
/// extension go to the fallback loader.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::{ExtensionLoader, TextFileLoader};
/// use ragline::pdf::PdfLoader;
///
/// let loader = ExtensionLoader::new(Arc::new(TextFileLoader::new()))
///     .route("pdf", Arc::new(PdfLoader::new()));
/// ```
pub struct ExtensionLoader {
    routes: Vec<(String, Arc<dyn Loader>)>,
    fallback: Arc<dyn Loader>,
}

impl ExtensionLoader {
    /// Create a loader sending every source to `fallback`.
    pub fn new(fallback: Arc<dyn Loader>) -> Self {
        Self { routes: Vec::new(), fallback }
    }

    /// Send sources ending in `.{extension}` to `loader`.
    pub fn route(mut self, extension: &str, loader: Arc<dyn Loader>) -> Self {
        self.routes.push((extension.trim_start_matches('.').to_ascii_lowercase(), loader));
        self
    }

    fn loader_for(&self, source: &Path) -> &Arc<dyn Loader> {
        let extension = source.extension().map(|e| e.to_string_lossy().to_ascii_lowercase());
        extension
            .and_then(|ext| self.routes.iter().find(|(route, _)| *route == ext))
            .map_or(&self.fallback, |(_, loader)| loader)
    }
}

#[async_trait]
impl Loader for ExtensionLoader {
    async fn load(&self, source: &Path) -> Result<Vec<Document>> {
        self.loader_for(source).load(source).await
    }
}

/// Compile a shell-style file name pattern (`*`, `?`, `[...]`, `{a,b}`).
fn name_matcher(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| RagError::ConfigError(format!("invalid source pattern '{pattern}': {e}")))
}

/// Find the files directly inside `dir` whose names match `pattern`.
///
/// The pattern is a glob over file names (`*`, `?`, `[...]` classes and
/// `{a,b}` alternatives). Results are sorted by path.
///
/// # Errors
///
/// - [`RagError::ConfigError`] if `dir` is not a directory or the pattern is invalid
/// - [`RagError::NoSourcesMatched`] if no file matches
pub fn discover_sources(dir: &Path, pattern: &str) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(RagError::ConfigError(format!(
            "source directory '{}' does not exist",
            dir.display()
        )));
    }
    let matcher = name_matcher(pattern)?;

    let mut sources: Vec<PathBuf> = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| matcher.is_match(entry.file_name()))
        .map(|entry| entry.into_path())
        .collect();

    if sources.is_empty() {
        return Err(RagError::NoSourcesMatched(format!(
            "pattern '{pattern}' in '{}'",
            dir.display()
        )));
    }

    sources.sort();
    debug!(dir = %dir.display(), pattern, count = sources.len(), "discovered sources");
    Ok(sources)
}
