//! ONNX-based embedding model (SentenceTransformers export, e.g. all-MiniLM-L6-v2).
//!
//! Loads `model.onnx` and `tokenizer.json` from a model directory and produces
//! mean-pooled float32 embeddings. Requires the `onnx` feature.

#[cfg(feature = "onnx")]
mod inner {
    use std::path::Path;

    use ort::session::Session;
    use ort::value::Tensor;
    use parking_lot::Mutex;
    use tokenizers::Tokenizer;
    use tracing::info;

    use kbase_core::{Error, Result};

    use crate::embedder::{EmbeddingModel, EmbeddingVector};

    /// Maximum sequence length for the model.
    const MAX_SEQ_LEN: usize = 512;

    /// ONNX Runtime embedding model.
    pub struct OnnxEmbedder {
        session: Mutex<Session>,
        tokenizer: Tokenizer,
        dimension: usize,
        name: String,
    }

    impl OnnxEmbedder {
        /// Load an ONNX model and tokenizer from `model_dir`.
        ///
        /// `dimension` is the configured output size; inference output of any
        /// other size is rejected by the embedding service.
        pub fn load(model_dir: &Path, name: &str, dimension: usize) -> Result<Self> {
            let model_path = model_dir.join("model.onnx");
            let tokenizer_path = model_dir.join("tokenizer.json");

            if !model_path.exists() {
                return Err(Error::ModelLoad(format!(
                    "Model not found: {}",
                    model_path.display()
                )));
            }
            if !tokenizer_path.exists() {
                return Err(Error::ModelLoad(format!(
                    "Tokenizer not found: {}",
                    tokenizer_path.display()
                )));
            }

            // With load-dynamic, ORT_DYLIB_PATH must point to libonnxruntime.
            ort::init().commit();

            let session = Session::builder()
                .map_err(|e| Error::ModelLoad(format!("Failed to create session builder: {}", e)))?
                .with_intra_threads(2)
                .map_err(|e| Error::ModelLoad(format!("Failed to set threads: {}", e)))?
                .commit_from_file(&model_path)
                .map_err(|e| Error::ModelLoad(format!("Failed to load ONNX model: {}", e)))?;

            let tokenizer = Tokenizer::from_file(&tokenizer_path)
                .map_err(|e| Error::ModelLoad(format!("Failed to load tokenizer: {}", e)))?;

            info!(
                "ONNX embedding model loaded: name={}, dim={}, path={}",
                name,
                dimension,
                model_path.display()
            );

            Ok(Self {
                session: Mutex::new(session),
                tokenizer,
                dimension,
                name: name.to_string(),
            })
        }

        fn infer(&self, text: &str) -> Result<EmbeddingVector> {
            let encoding = self
                .tokenizer
                .encode(text, true)
                .map_err(|e| Error::Embedding(format!("Tokenization failed: {}", e)))?;

            let seq_len = encoding.get_ids().len().min(MAX_SEQ_LEN);
            let input_ids = &encoding.get_ids()[..seq_len];
            let attention_mask = &encoding.get_attention_mask()[..seq_len];

            let ids_data: Vec<i64> = input_ids.iter().map(|&id| id as i64).collect();
            let mask_data: Vec<i64> = attention_mask.iter().map(|&m| m as i64).collect();
            let type_ids_data: Vec<i64> = vec![0i64; seq_len];

            let tensor = |data: Vec<i64>, what: &str| {
                Tensor::from_array(([1usize, seq_len], data))
                    .map_err(|e| Error::Embedding(format!("Failed to create {} tensor: {}", what, e)))
            };
            let ids_tensor = tensor(ids_data, "ids")?;
            let mask_tensor = tensor(mask_data, "mask")?;
            let type_ids_tensor = tensor(type_ids_data, "type_ids")?;

            let mut session = self.session.lock();
            let outputs = session
                .run(ort::inputs![ids_tensor, mask_tensor, type_ids_tensor])
                .map_err(|e| Error::Embedding(format!("ONNX inference failed: {}", e)))?;

            // [1, seq_len, dim] token embeddings need mean pooling; [1, dim] is already pooled.
            let (shape, data) = outputs[0]
                .try_extract_tensor::<f32>()
                .map_err(|e| Error::Embedding(format!("Failed to extract output tensor: {}", e)))?;
            let shape_dims: Vec<i64> = shape.iter().copied().collect();

            match shape_dims.len() {
                3 => {
                    let dim = shape_dims[2] as usize;
                    let mask_sum: f32 = attention_mask.iter().map(|&m| m as f32).sum();
                    if mask_sum < 1e-9 {
                        return Err(Error::Embedding("empty attention mask".into()));
                    }

                    let mut pooled = vec![0.0f32; dim];
                    for (i, &m) in attention_mask.iter().enumerate() {
                        if m > 0 {
                            let offset = i * dim;
                            for (d, slot) in pooled.iter_mut().enumerate() {
                                *slot += data[offset + d] * m as f32;
                            }
                        }
                    }
                    Ok(pooled.into_iter().map(|v| v / mask_sum).collect())
                }
                2 => {
                    let dim = shape_dims[1] as usize;
                    Ok(data[..dim].to_vec())
                }
                _ => Err(Error::Embedding(format!(
                    "Unexpected output shape: {:?}",
                    shape_dims
                ))),
            }
        }
    }

    impl EmbeddingModel for OnnxEmbedder {
        fn embed(&self, text: &str) -> Result<EmbeddingVector> {
            self.infer(text)
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn name(&self) -> &str {
            &self.name
        }
    }
}

#[cfg(feature = "onnx")]
pub use inner::OnnxEmbedder;
