//! PDF source loading.
//!
//! This module is only available when the `pdf` feature is enabled.
//! [`PdfLoader`] extracts the text of each page with
//! [lopdf](https://docs.rs/lopdf) and returns one document per page.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::document::{Document, SOURCE_KEY};
use crate::error::{RagError, Result};
use crate::loader::Loader;

/// Metadata key holding the 1-based page number.
pub const PAGE_KEY: &str = "page";

/// Metadata key holding the page count of the source.
pub const TOTAL_PAGES_KEY: &str = "total_pages";

/// Loads PDF files as one document per page with extractable text.
///
/// Every document carries `source`, `page` and `total_pages` metadata.
/// Pages without text (scanned images, blank pages) are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfLoader;

impl PdfLoader {
    /// Create a new PDF loader.
    pub fn new() -> Self {
        Self
    }
}

fn loader_err(source: &Path, message: impl Into<String>) -> RagError {
    RagError::LoaderError { source_ref: source.display().to_string(), message: message.into() }
}

fn extract_pages(source: &Path) -> Result<Vec<Document>> {
    let pdf = lopdf::Document::load(source).map_err(|e| loader_err(source, e.to_string()))?;
    let pages = pdf.get_pages();
    let total = pages.len();
    let source_ref = source.display().to_string();

    let mut documents = Vec::with_capacity(total);
    for &number in pages.keys() {
        let text = match pdf.extract_text(&[number]) {
            Ok(text) => text,
            Err(e) => {
                warn!(
                    source = %source_ref,
                    page = number,
                    error = %e,
                    "failed to extract page text"
                );
                continue;
            }
        };
        if text.trim().is_empty() {
            continue;
        }
        documents.push(
            Document::new(text)
                .with_metadata(SOURCE_KEY, source_ref.as_str())
                .with_metadata(PAGE_KEY, number as f64)
                .with_metadata(TOTAL_PAGES_KEY, total),
        );
    }

    debug!(source = %source_ref, pages = total, with_text = documents.len(), "loaded pdf source");
    Ok(documents)
}

#[async_trait]
impl Loader for PdfLoader {
    async fn load(&self, source: &Path) -> Result<Vec<Document>> {
        let path: PathBuf = source.to_path_buf();
        tokio::task::spawn_blocking(move || extract_pages(&path))
            .await
            .map_err(|e| loader_err(source, format!("extraction task failed: {e}")))?
    }
}
