//! Generator trait for language model completion.

use async_trait::async_trait;

use crate::error::Result;

/// A language model offering blocking and incremental completion.
#[async_trait]
pub trait Generator: Send + Sync {
    /// Complete `prompt` and return the full text.
    async fn complete(&self, prompt: &str) -> Result<String>;

    /// Complete `prompt`, invoking `on_fragment` for each piece of text in
    /// generation order before returning.
    async fn complete_streaming(
        &self,
        prompt: &str,
        on_fragment: &mut (dyn for<'a> FnMut(&'a str) + Send),
    ) -> Result<()>;
}
