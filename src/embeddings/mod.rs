pub mod openai;

pub use openai::OpenAIEmbedder;

use async_trait::async_trait;

use crate::error::Result;

/// Turns text into vectors. Implemented by the HTTP client and by test fakes.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed documents, one vector per input, same order.
    async fn embed_batch(&self, texts: Vec<String>) -> Result<Vec<Vec<f32>>>;

    /// Embed a single query string.
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>>;

    /// Length of every vector this embedder returns.
    fn dimensions(&self) -> usize;
}
