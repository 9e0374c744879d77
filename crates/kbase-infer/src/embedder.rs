//! Embedding model trait.
//!
//! The `EmbeddingModel` trait abstracts over the model runtime. Implementations:
//! - `OnnxEmbedder`: ONNX Runtime with all-MiniLM-L6-v2 (requires the `onnx` feature)
//! - test doubles that count invocations

use kbase_core::Result;

/// A raw or normalized embedding vector.
pub type EmbeddingVector = Vec<f32>;

/// Trait for embedding model runtimes.
///
/// Output must be deterministic for identical input and always `dimension()` long.
pub trait EmbeddingModel: Send + Sync {
    /// Generate an embedding for a single text.
    fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Generate embeddings for a batch of texts, one vector per input in order.
    ///
    /// `batch_size` is a hint for how many inputs to run through the model at once.
    fn embed_batch(&self, texts: &[&str], batch_size: usize) -> Result<Vec<EmbeddingVector>> {
        let _ = batch_size;
        texts.iter().map(|t| self.embed(t)).collect()
    }

    /// Get the embedding dimension.
    fn dimension(&self) -> usize;

    /// Model identifier for logging.
    fn name(&self) -> &str;
}
