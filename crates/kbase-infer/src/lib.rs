//! kbase Infer — embedding model runtime, content-hash cache, embedding service.
//!
//! `EmbeddingService` wraps any `EmbeddingModel` with L2 normalization, a
//! bounded FIFO cache and batch deduplication. With the `onnx` feature,
//! `OnnxEmbedder` loads a SentenceTransformers export for local inference.

pub mod cache;
pub mod embedder;
pub mod onnx_embedder;
pub mod service;
pub mod vector;

pub use cache::{content_key, EmbeddingCache};
pub use embedder::{EmbeddingModel, EmbeddingVector};
pub use service::EmbeddingService;
pub use vector::{cosine_similarity, l2_normalize};

#[cfg(feature = "onnx")]
pub use onnx_embedder::OnnxEmbedder;

use std::sync::Arc;

use kbase_core::{PipelineConfig, Result};

/// Load the configured embedding model.
///
/// Failure is fatal: callers are expected to abort startup rather than run
/// without embeddings.
pub fn load_model(config: &PipelineConfig) -> Result<Arc<dyn EmbeddingModel>> {
    #[cfg(feature = "onnx")]
    {
        let model = OnnxEmbedder::load(
            &config.embedding_model_dir,
            &config.embedding_model,
            config.embedding_dimension,
        )?;
        tracing::info!("Using ONNX embedding model {} (dim={})", model.name(), model.dimension());
        Ok(Arc::new(model))
    }

    #[cfg(not(feature = "onnx"))]
    {
        Err(kbase_core::Error::ModelLoad(format!(
            "cannot load {}: built without the `onnx` feature",
            config.embedding_model
        )))
    }
}
