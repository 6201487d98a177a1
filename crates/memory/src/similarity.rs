//! Vector similarity utilities.
//!
//! Embedding vectors from the provider are already normalized, so cosine
//! similarity reduces to the dot product. The result is clamped to [0, 1]
//! to absorb floating-point overshoot.

/// Cosine similarity between two normalized embedding vectors.
///
/// Returns a value in [0, 1]. Mismatched lengths or empty vectors score 0.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f64 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f64;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += *x as f64 * *y as f64;
    }

    dot.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_unit_vectors() {
        let v = vec![1.0, 0.0, 0.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn orthogonal_vectors() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn known_value() {
        // Both normalized; dot = 1/sqrt(2)
        let a = vec![1.0, 0.0];
        let inv = std::f32::consts::FRAC_1_SQRT_2;
        let b = vec![inv, inv];
        assert!((cosine_similarity(&a, &b) - 0.7071).abs() < 0.001);
    }

    #[test]
    fn overshoot_is_clamped() {
        // Slightly denormalized vectors can push the dot product past 1
        let a = vec![1.0000005, 0.0];
        let b = vec![1.0000005, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 1.0);
    }

    #[test]
    fn negative_dot_clamps_to_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![-1.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn mismatched_lengths_score_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![1.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }

    #[test]
    fn empty_vectors_score_zero() {
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }
}
