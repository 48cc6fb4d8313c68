// Embeddings module
// Defines the provider seam and the OpenAI embeddings client

pub mod openai;

pub use openai::OpenAiEmbedder;

use crate::Result;

/// External embedding capability: maps text to fixed-length numeric vectors
/// such that semantic similarity correlates with vector closeness.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed a batch of texts, preserving input order.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;
}
