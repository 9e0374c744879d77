//! Embedding service: cache-aware single and batch embedding.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use kbase_core::{Error, Result};

use crate::cache::{content_key, EmbeddingCache};
use crate::embedder::{EmbeddingModel, EmbeddingVector};
use crate::vector::{cosine_similarity, l2_normalize};

/// Maps text to unit-length vectors, caching by content hash.
///
/// Shared across concurrent ingestion tasks. Two tasks missing on the same
/// text may both compute it; the last write wins, which is harmless because
/// the model is deterministic.
pub struct EmbeddingService {
    model: Arc<dyn EmbeddingModel>,
    cache: EmbeddingCache,
    cache_enabled: bool,
}

impl EmbeddingService {
    pub fn new(model: Arc<dyn EmbeddingModel>, cache_enabled: bool) -> Self {
        Self::with_cache(model, EmbeddingCache::default(), cache_enabled)
    }

    pub fn with_cache(
        model: Arc<dyn EmbeddingModel>,
        cache: EmbeddingCache,
        cache_enabled: bool,
    ) -> Self {
        Self {
            model,
            cache,
            cache_enabled,
        }
    }

    /// Embed one text, consulting the cache first.
    pub fn embed_one(&self, text: &str) -> Result<EmbeddingVector> {
        let key = content_key(text);
        if self.cache_enabled {
            if let Some(cached) = self.cache.get(&key) {
                return Ok(cached);
            }
        }

        let embedding = self.finish(self.model.embed(text)?)?;
        if self.cache_enabled {
            self.cache.put(key, embedding.clone());
        }
        Ok(embedding)
    }

    /// Embed a search query. Same vector space and cache as [`embed_one`](Self::embed_one).
    pub fn embed_query(&self, query: &str) -> Result<EmbeddingVector> {
        self.embed_one(query)
    }

    /// Embed many texts, returning one vector per input in input order.
    ///
    /// Cache hits are served directly; the distinct misses go to the model in
    /// a single batch call, so duplicates are only computed once.
    pub fn embed_many<S: AsRef<str>>(
        &self,
        texts: &[S],
        batch_size: usize,
    ) -> Result<Vec<EmbeddingVector>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let mut results: Vec<Option<EmbeddingVector>> = vec![None; texts.len()];
        let mut miss_keys: Vec<String> = Vec::new();
        let mut miss_texts: Vec<&str> = Vec::new();
        let mut slot_by_key: HashMap<String, usize> = HashMap::new();
        // (input position, index into miss_texts)
        let mut pending: Vec<(usize, usize)> = Vec::new();

        for (position, text) in texts.iter().enumerate() {
            let text = text.as_ref();
            let key = content_key(text);

            if self.cache_enabled {
                if let Some(cached) = self.cache.get(&key) {
                    results[position] = Some(cached);
                    continue;
                }
            }

            let slot = match slot_by_key.get(&key) {
                Some(&slot) => slot,
                None => {
                    let slot = miss_texts.len();
                    slot_by_key.insert(key.clone(), slot);
                    miss_keys.push(key);
                    miss_texts.push(text);
                    slot
                }
            };
            pending.push((position, slot));
        }

        if !miss_texts.is_empty() {
            debug!(
                "Embedding {} uncached texts ({} requested) with {}",
                miss_texts.len(),
                texts.len(),
                self.model.name()
            );

            let raw = self.model.embed_batch(&miss_texts, batch_size.max(1))?;
            if raw.len() != miss_texts.len() {
                return Err(Error::Embedding(format!(
                    "model returned {} vectors for {} inputs",
                    raw.len(),
                    miss_texts.len()
                )));
            }

            let computed = raw
                .into_iter()
                .map(|v| self.finish(v))
                .collect::<Result<Vec<_>>>()?;

            if self.cache_enabled {
                for (key, embedding) in miss_keys.into_iter().zip(computed.iter()) {
                    self.cache.put(key, embedding.clone());
                }
            }

            for (position, slot) in pending {
                results[position] = Some(computed[slot].clone());
            }
        }

        results
            .into_iter()
            .collect::<Option<Vec<_>>>()
            .ok_or_else(|| Error::Internal("embedding result missing for an input".into()))
    }

    /// Cosine similarity in `[0, 1]`; 0 for degenerate vectors.
    pub fn similarity(&self, a: &[f32], b: &[f32]) -> f32 {
        cosine_similarity(a, b)
    }

    /// Dimension of every vector this service returns.
    pub fn dimension(&self) -> usize {
        self.model.dimension()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Number of cached embeddings.
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Empty the cache, returning how many entries it held.
    pub fn clear_cache(&self) -> usize {
        let count = self.cache.clear();
        debug!("Cleared {} cached embeddings", count);
        count
    }

    /// Validate dimension and normalize a raw model output.
    fn finish(&self, raw: EmbeddingVector) -> Result<EmbeddingVector> {
        let expected = self.model.dimension();
        if raw.len() != expected {
            return Err(Error::Embedding(format!(
                "model {} returned a {}-dim vector, expected {}",
                self.model.name(),
                raw.len(),
                expected
            )));
        }
        Ok(l2_normalize(raw))
    }
}
