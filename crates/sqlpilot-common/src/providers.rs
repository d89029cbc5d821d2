use async_trait::async_trait;

use crate::Result;

/// Trait for text-completion backends (OpenAI-compatible APIs, local
/// models, test stubs). The pipeline treats completion as an opaque
/// `prompt -> text` capability and assumes no determinism, even at
/// temperature 0.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Provider identifier (e.g. "openai", "stub").
    fn provider_id(&self) -> &str;

    /// Send one completion request and return the raw response text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Trait for embedding backends used to build and query the semantic index.
///
/// Index construction and query embedding must use the same model and
/// version; mixing them is undefined behavior. This is an operational
/// invariant, not enforced here.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    fn provider_id(&self) -> &str;

    /// Model identifier, used to key cached embeddings.
    fn model(&self) -> &str;

    async fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;
}
