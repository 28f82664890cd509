//! SIMD vector kernels using the `wide` crate.

use wide::{f32x8, f64x4};

/// Inputs shorter than this use the scalar path.
const SIMD_THRESHOLD: usize = 16;

#[inline]
fn lanes(chunk: &[f32]) -> f32x8 {
    let mut lane = [0.0f32; 8];
    lane.copy_from_slice(chunk);
    f32x8::new(lane)
}

/// Dot product of two equally sized slices.
///
/// Panics if the slices differ in length.
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    assert_eq!(a.len(), b.len(), "dot product of mismatched slices");

    if a.len() < SIMD_THRESHOLD {
        return a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    }

    let mut acc = f32x8::splat(0.0);

    // Process 8 values at a time
    let chunks_a = a.chunks_exact(8);
    let chunks_b = b.chunks_exact(8);
    let remainder_a = chunks_a.remainder();
    let remainder_b = chunks_b.remainder();

    for (chunk_a, chunk_b) in chunks_a.zip(chunks_b) {
        acc = acc + lanes(chunk_a) * lanes(chunk_b);
    }

    let mut total = acc.to_array().iter().sum::<f32>();
    total += remainder_a
        .iter()
        .zip(remainder_b.iter())
        .map(|(x, y)| x * y)
        .sum::<f32>();

    total
}

/// Sum of squared components, accumulated in `f64`.
///
/// The square of any finite `f32` is representable in `f64`, so tiny
/// vectors do not underflow to zero and large ones do not overflow.
pub fn sum_of_squares(values: &[f32]) -> f64 {
    let chunks = values.chunks_exact(4);
    let remainder = chunks.remainder();

    let mut acc = f64x4::splat(0.0);
    for chunk in chunks {
        let lane = f64x4::new([
            f64::from(chunk[0]),
            f64::from(chunk[1]),
            f64::from(chunk[2]),
            f64::from(chunk[3]),
        ]);
        acc = acc + lane * lane;
    }

    acc.to_array().iter().sum::<f64>()
        + remainder
            .iter()
            .map(|x| f64::from(*x) * f64::from(*x))
            .sum::<f64>()
}

/// Euclidean (L2) norm in full `f64` precision.
pub fn l2_norm_f64(values: &[f32]) -> f64 {
    sum_of_squares(values).sqrt()
}

/// Euclidean (L2) norm.
pub fn l2_norm(values: &[f32]) -> f32 {
    l2_norm_f64(values) as f32
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scalar_dot(a: &[f32], b: &[f32]) -> f32 {
        a.iter().zip(b).map(|(x, y)| x * y).sum()
    }

    #[test]
    fn test_dot_matches_scalar_for_odd_lengths() {
        for len in [0usize, 1, 7, 8, 15, 16, 17, 33, 512] {
            let a: Vec<f32> = (0..len).map(|i| (i as f32 * 0.37).sin()).collect();
            let b: Vec<f32> = (0..len).map(|i| (i as f32 * 0.11).cos()).collect();
            let expected = scalar_dot(&a, &b);
            assert!(
                (dot(&a, &b) - expected).abs() < 1e-4,
                "length {len}: {} vs {expected}",
                dot(&a, &b)
            );
        }
    }

    #[test]
    fn test_l2_norm() {
        assert_eq!(l2_norm(&[3.0, 4.0]), 5.0);
        assert_eq!(l2_norm(&[]), 0.0);

        let ones = vec![1.0f32; 64];
        assert!((l2_norm(&ones) - 8.0).abs() < 1e-6);
    }

    #[test]
    fn test_norm_of_extreme_magnitudes() {
        let tiny = [1e-25f32; 4];
        assert!((l2_norm_f64(&tiny) - 2e-25).abs() < 1e-35);
        assert!(l2_norm(&tiny) > 0.0);

        let huge = [1e20f32; 5];
        let expected = 1e20 * 5f64.sqrt();
        assert!((l2_norm_f64(&huge) - expected).abs() / expected < 1e-7);
        assert!(l2_norm(&huge).is_finite());
    }

    #[test]
    #[should_panic]
    fn test_dot_rejects_mismatched_lengths() {
        dot(&[1.0, 2.0], &[1.0]);
    }
}
