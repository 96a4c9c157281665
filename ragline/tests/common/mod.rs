//! Deterministic test doubles shared by the integration tests.
#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use ragline::document::SOURCE_KEY;
use ragline::{
    Document, EmbeddingGenerator, Generator, IndexPoint, Indexer, InMemoryIndexer, Loader,
    RagError, Result, SearchHit,
};
use tokio::sync::Mutex;

pub const DIM: usize = 16;

/// Hashes words into a fixed-size bag-of-words vector. Identical texts get
/// identical vectors.
pub struct HashEmbedder {
    pub dim: usize,
    pub calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, calls: AtomicUsize::new(0) }
    }

    pub fn vector(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0.0; self.dim];
        for word in text.split_whitespace() {
            let hash = word
                .bytes()
                .fold(2166136261u32, |h, b| (h ^ u32::from(b)).wrapping_mul(16777619));
            v[hash as usize % self.dim] += 1.0;
        }
        if v.iter().all(|x| *x == 0.0) {
            v[0] = 1.0;
        }
        v
    }
}

#[async_trait]
impl EmbeddingGenerator for HashEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts.iter().map(|t| self.vector(t)).collect())
    }
}

/// Always fails.
pub struct FailingEmbedder;

#[async_trait]
impl EmbeddingGenerator for FailingEmbedder {
    async fn embed_many(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Err(RagError::EmbeddingError { provider: "test".into(), message: "embedder down".into() })
    }
}

/// Emits scripted fragments and records every prompt.
pub struct ScriptedGenerator {
    pub fragments: Vec<String>,
    pub fail: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(fragments: &[&str]) -> Self {
        Self {
            fragments: fragments.iter().map(|f| f.to_string()).collect(),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing() -> Self {
        Self { fail: true, ..Self::new(&[]) }
    }

    pub async fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().await.last().cloned()
    }

    fn check(&self) -> Result<()> {
        if self.fail {
            return Err(RagError::GenerationError {
                provider: "test".into(),
                message: "model offline".into(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl Generator for ScriptedGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().await.push(prompt.to_string());
        self.check()?;
        Ok(self.fragments.concat())
    }

    async fn complete_streaming(
        &self,
        prompt: &str,
        on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<()> {
        self.prompts.lock().await.push(prompt.to_string());
        self.check()?;
        for fragment in &self.fragments {
            on_fragment(fragment);
            tokio::task::yield_now().await;
        }
        Ok(())
    }
}

/// Serves in-memory sources; sources mapped to `Err` fail to load and
/// unknown sources are reported missing.
#[derive(Default)]
pub struct ScriptedLoader {
    pub sources: HashMap<PathBuf, std::result::Result<String, String>>,
}

impl ScriptedLoader {
    pub fn with(mut self, path: &str, content: &str) -> Self {
        self.sources.insert(PathBuf::from(path), Ok(content.to_string()));
        self
    }

    pub fn failing(mut self, path: &str) -> Self {
        self.sources.insert(PathBuf::from(path), Err("unreadable".to_string()));
        self
    }
}

#[async_trait]
impl Loader for ScriptedLoader {
    async fn load(&self, source: &Path) -> Result<Vec<Document>> {
        match self.sources.get(source) {
            Some(Ok(content)) => Ok(vec![
                Document::new(content.clone())
                    .with_metadata(SOURCE_KEY, source.display().to_string()),
            ]),
            Some(Err(message)) => Err(RagError::LoaderError {
                source_ref: source.display().to_string(),
                message: message.clone(),
            }),
            None => Err(RagError::LoaderError {
                source_ref: source.display().to_string(),
                message: "not found".into(),
            }),
        }
    }
}

/// Returns fixed hits per collection and fails on request.
#[derive(Default)]
pub struct ScriptedIndexer {
    pub hits: HashMap<String, Vec<SearchHit>>,
    pub failing: Vec<String>,
}

impl ScriptedIndexer {
    pub fn collection(mut self, name: &str, hits: &[(&str, Option<f32>)]) -> Self {
        self.hits.insert(
            name.to_string(),
            hits.iter()
                .map(|(text, score)| SearchHit { payload: Document::new(*text), score: *score })
                .collect(),
        );
        self
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.push(name.to_string());
        self
    }
}

#[async_trait]
impl Indexer for ScriptedIndexer {
    async fn ensure_collection(&self, _name: &str, _vector_size: usize) -> Result<()> {
        Ok(())
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        Ok(())
    }

    async fn upsert(&self, _name: &str, points: Vec<IndexPoint>) -> Result<Vec<String>> {
        Ok(points.iter().map(|_| ragline::indexer::new_point_id()).collect())
    }

    async fn search(&self, name: &str, _query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        if self.failing.iter().any(|f| f == name) {
            return Err(RagError::IndexerError {
                backend: "test".into(),
                message: format!("{name} unavailable"),
            });
        }
        // Collections with more hits answer later, so completion order differs from target order.
        let delay = self.hits.get(name).map_or(0, Vec::len) as u64;
        tokio::time::sleep(std::time::Duration::from_millis(5 * delay)).await;
        let mut hits = self.hits.get(name).cloned().unwrap_or_default();
        hits.truncate(limit);
        Ok(hits)
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        let mut names: Vec<String> =
            self.hits.keys().cloned().chain(self.failing.iter().cloned()).collect();
        names.sort();
        Ok(names)
    }
}

/// Wraps an [`InMemoryIndexer`], optionally failing deletes.
pub struct FlakyDeleteIndexer {
    pub inner: Arc<InMemoryIndexer>,
}

#[async_trait]
impl Indexer for FlakyDeleteIndexer {
    async fn ensure_collection(&self, name: &str, vector_size: usize) -> Result<()> {
        self.inner.ensure_collection(name, vector_size).await
    }

    async fn delete_collection(&self, _name: &str) -> Result<()> {
        Err(RagError::IndexerError { backend: "test".into(), message: "delete refused".into() })
    }

    async fn upsert(&self, name: &str, points: Vec<IndexPoint>) -> Result<Vec<String>> {
        self.inner.upsert(name, points).await
    }

    async fn search(&self, name: &str, query: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        self.inner.search(name, query, limit).await
    }

    async fn list_collections(&self) -> Result<Vec<String>> {
        self.inner.list_collections().await
    }
}
