//! Deterministic text embeddings: hashed bag-of-words into a fixed-size
//! vector, L2-normalized. Stable across processes and runs, which is what
//! lets the index live in the database as plain JSON arrays.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

pub const EMBEDDING_DIM: usize = 256;

/// Embeds text into a unit vector. Empty or non-alphanumeric input yields
/// the zero vector, which cosine-matches nothing.
pub fn embed(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; EMBEDDING_DIM];

    for token in tokenize(text) {
        let mut hasher = DefaultHasher::new();
        token.hash(&mut hasher);
        let hash = hasher.finish();

        let index = (hash % EMBEDDING_DIM as u64) as usize;
        // Second hash bit decides the sign so frequent tokens don't all pile
        // up in the positive direction.
        let sign = if (hash >> 32) & 1 == 0 { 1.0 } else { -1.0 };
        vector[index] += sign;
    }

    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut vector {
            *v /= norm;
        }
    }
    vector
}

/// Cosine similarity mapped into `[0.0, 1.0]`. Mismatched or zero-length
/// vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|v| v * v).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    ((dot / (norm_a * norm_b)) + 1.0) / 2.0
}

pub(crate) fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedding_is_deterministic() {
        let a = embed("fintech mobile payments adoption");
        let b = embed("fintech mobile payments adoption");
        assert_eq!(a, b);
        assert_eq!(a.len(), EMBEDDING_DIM);
    }

    #[test]
    fn test_embedding_is_normalized() {
        let v = embed("quarterly revenue growth and churn");
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_empty_text_is_zero_vector() {
        let v = embed("  !! ??  ");
        assert!(v.iter().all(|&x| x == 0.0));
        assert_eq!(cosine_similarity(&v, &embed("anything")), 0.0);
    }

    #[test]
    fn test_similar_text_scores_higher() {
        let topic = embed("mobile payment adoption in banking");
        let close = embed("banking customers and mobile payment growth");
        let far = embed("gardening tips for winter vegetables");

        assert!(cosine_similarity(&topic, &close) > cosine_similarity(&topic, &far));
    }

    #[test]
    fn test_identical_vectors_score_one() {
        let v = embed("identical content");
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_mismatched_lengths_score_zero() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0]), 0.0);
    }
}
