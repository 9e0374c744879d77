//! Vector math on embeddings.

use ndarray::ArrayView1;

use crate::embedder::EmbeddingVector;

/// Scale `v` to unit L2 norm. Zero vectors are returned unchanged.
pub fn l2_normalize(mut v: EmbeddingVector) -> EmbeddingVector {
    let norm = ArrayView1::from(&v[..]).dot(&ArrayView1::from(&v[..])).sqrt();
    if norm > f32::EPSILON {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}

/// Cosine similarity clamped to `[0, 1]`.
///
/// Returns 0 for zero-norm inputs or mismatched lengths instead of failing.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let a = ArrayView1::from(a);
    let b = ArrayView1::from(b);
    let norm_a = a.dot(&a).sqrt();
    let norm_b = b.dot(&b).sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    let sim = a.dot(&b) / (norm_a * norm_b);
    if sim.is_nan() {
        0.0
    } else {
        sim.clamp(0.0, 1.0)
    }
}
