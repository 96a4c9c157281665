//! Ollama embedding and generation backends.
//!
//! This module is only available when the `ollama` feature is enabled.
//! Both backends go through the [ollama-rs](https://docs.rs/ollama-rs) client:
//!
//! - [`OllamaEmbedder`] sends one batched embeddings request per call.
//! - [`OllamaGenerator`] completes a prompt in one response, or forwards the
//!   streamed response fragments in order.

use async_trait::async_trait;
use futures::StreamExt;
use ollama_rs::Ollama;
use ollama_rs::generation::completion::GenerationResponse;
use ollama_rs::generation::completion::request::GenerationRequest;
use ollama_rs::generation::embeddings::request::{EmbeddingsInput, GenerateEmbeddingsRequest};
use tracing::{debug, error};

use crate::embedding::EmbeddingGenerator;
use crate::error::{RagError, Result};
use crate::generator::Generator;

/// The default Ollama server address.
pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// The default embedding model (768 dimensions).
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text";

/// The default generation model.
pub const DEFAULT_GENERATION_MODEL: &str = "deepseek-r1:8b";

const PROVIDER: &str = "Ollama";

fn client(base_url: &str) -> Result<Ollama> {
    Ollama::try_new(base_url)
        .map_err(|e| RagError::ConfigError(format!("invalid Ollama URL '{base_url}': {e}")))
}

/// An [`EmbeddingGenerator`] backed by a local Ollama server.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::ollama::OllamaEmbedder;
///
/// let embedder = OllamaEmbedder::new("http://localhost:11434", "nomic-embed-text")?;
/// let vector = embedder.embed_one("hello world").await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaEmbedder {
    client: Ollama,
    model: String,
}

impl OllamaEmbedder {
    /// Create an embedder for `model` served at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `base_url` is not a valid URL.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        Ok(Self { client: client(base_url)?, model: model.into() })
    }

    /// Create an embedder using the default URL and model.
    pub fn default_url() -> Result<Self> {
        Self::new(DEFAULT_OLLAMA_URL, DEFAULT_EMBEDDING_MODEL)
    }

    fn err(message: impl Into<String>) -> RagError {
        RagError::EmbeddingError { provider: PROVIDER.to_string(), message: message.into() }
    }
}

#[async_trait]
impl EmbeddingGenerator for OllamaEmbedder {
    async fn embed_many(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = PROVIDER,
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request = GenerateEmbeddingsRequest::new(
            self.model.clone(),
            EmbeddingsInput::Multiple(texts.to_vec()),
        );
        let response = self.client.generate_embeddings(request).await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "embedding request failed");
            Self::err(e.to_string())
        })?;

        if response.embeddings.len() != texts.len() {
            return Err(RagError::CountMismatch {
                context: format!("{PROVIDER} embedding batch"),
                expected: texts.len(),
                actual: response.embeddings.len(),
            });
        }
        Ok(response.embeddings)
    }
}

/// A [`Generator`] backed by a local Ollama server.
///
/// Model output is forwarded verbatim, including any reasoning markup the
/// model emits.
///
/// # Example
///
/// ```rust,ignore
/// use ragline::ollama::OllamaGenerator;
///
/// let generator = OllamaGenerator::new("http://localhost:11434", "deepseek-r1:8b")?;
/// generator.complete_streaming("Say hi", &mut |f| print!("{f}")).await?;
/// ```
#[derive(Debug, Clone)]
pub struct OllamaGenerator {
    client: Ollama,
    model: String,
}

impl OllamaGenerator {
    /// Create a generator for `model` served at `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `base_url` is not a valid URL.
    pub fn new(base_url: &str, model: impl Into<String>) -> Result<Self> {
        Ok(Self { client: client(base_url)?, model: model.into() })
    }

    /// Create a generator using the default URL and model.
    pub fn default_url() -> Result<Self> {
        Self::new(DEFAULT_OLLAMA_URL, DEFAULT_GENERATION_MODEL)
    }

    fn err(message: impl Into<String>) -> RagError {
        RagError::GenerationError { provider: PROVIDER.to_string(), message: message.into() }
    }
}

/// Forward the non-empty fragments of one streamed batch. Returns `true`
/// once the stream reports completion.
fn forward_batch(
    batch: &[GenerationResponse],
    on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
) -> bool {
    let mut done = false;
    for response in batch {
        if !response.response.is_empty() {
            on_fragment(&response.response);
        }
        done |= response.done;
    }
    done
}

#[async_trait]
impl Generator for OllamaGenerator {
    async fn complete(&self, prompt: &str) -> Result<String> {
        debug!(provider = PROVIDER, model = %self.model, prompt_len = prompt.len(), "generating");
        let request = GenerationRequest::new(self.model.clone(), prompt.to_string());
        let response = self.client.generate(request).await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "generation request failed");
            Self::err(e.to_string())
        })?;
        Ok(response.response)
    }

    async fn complete_streaming(
        &self,
        prompt: &str,
        on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<()> {
        debug!(
            provider = PROVIDER,
            model = %self.model,
            prompt_len = prompt.len(),
            "streaming generation"
        );
        let request = GenerationRequest::new(self.model.clone(), prompt.to_string());
        let mut stream = self.client.generate_stream(request).await.map_err(|e| {
            error!(provider = PROVIDER, error = %e, "generation request failed");
            Self::err(e.to_string())
        })?;

        while let Some(batch) = stream.next().await {
            let batch = batch.map_err(|e| {
                error!(provider = PROVIDER, error = ?e, "generation stream interrupted");
                Self::err(format!("stream interrupted: {e:?}"))
            })?;
            if forward_batch(&batch, on_fragment) {
                break;
            }
        }
        Ok(())
    }
}
