//! Vector similarity metrics.

/// Dot product of two equal-length vectors.
pub fn dot_product(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

/// Euclidean norm.
pub fn magnitude(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity in [-1, 1].
///
/// Returns 0.0 ("no signal") when either vector has zero magnitude, when the
/// lengths differ, or when the result is not finite.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mag_a = magnitude(a);
    let mag_b = magnitude(b);
    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }

    let score = dot_product(a, b) / (mag_a * mag_b);
    if score.is_finite() {
        score.clamp(-1.0, 1.0)
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn test_unit_vectors() {
        let v = [1.0, 0.0, 0.0, 0.0, 0.0];
        assert_eq!(cosine_similarity(&v, &[1.0, 0.0, 0.0, 0.0, 0.0]), 1.0);
        assert_eq!(cosine_similarity(&v, &[0.0, 1.0, 0.0, 0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&v, &[-1.0, 0.0, 0.0, 0.0, 0.0]), -1.0);
    }

    #[test]
    fn test_self_and_opposite() {
        for v in [vec![0.3, -1.7, 2.2], vec![1e-3, 4e3, 7.0, -0.5], vec![5.0]] {
            let neg: Vec<f32> = v.iter().map(|x| -x).collect();
            assert!(approx(cosine_similarity(&v, &v), 1.0));
            assert!(approx(cosine_similarity(&v, &neg), -1.0));
        }
    }

    #[test]
    fn test_magnitude_invariant() {
        let a = [1.0, 2.0, 3.0];
        let b = [2.0, 4.0, 6.0];
        assert!(approx(cosine_similarity(&a, &b), 1.0));
    }

    #[test]
    fn test_orthogonal_and_zero() {
        assert_eq!(cosine_similarity(&[1.0, 1.0], &[1.0, -1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 2.0]), 0.0);
        assert_eq!(cosine_similarity(&[1.0, 2.0], &[0.0, 0.0]), 0.0);
        assert_eq!(cosine_similarity(&[], &[]), 0.0);
    }

    #[test]
    fn test_mismatched_lengths() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0, 0.0]), 0.0);
    }

    #[test]
    fn test_non_finite_input() {
        assert_eq!(cosine_similarity(&[f32::NAN, 1.0], &[1.0, 1.0]), 0.0);
    }
}
