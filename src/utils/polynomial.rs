//! Real roots of small polynomials via companion matrix eigenvalues

use crate::constants::EPSILON;
use nalgebra::{DMatrix, Schur};

/// Imaginary parts below this are treated as zero
const IMAGINARY_TOLERANCE: f64 = 1e-7;

/// Roots closer than this are merged
const DUPLICATE_ROOT_TOLERANCE: f64 = 1e-9;

/// Iteration cap for the Schur decomposition
const SCHUR_MAX_ITERATIONS: usize = 1000;

/// Real roots of `c[0] + c[1] x + c[2] x^2 + ...`, ascending and deduplicated
///
/// Vanishing leading coefficients lower the degree. Non-finite
/// coefficients, constant polynomials and a failed decomposition all yield
/// no roots.
#[must_use]
pub fn real_roots(coefficients: &[f64]) -> Vec<f64> {
    near_real_roots(coefficients, IMAGINARY_TOLERANCE)
}

/// Like [`real_roots`], but keeps the real part of complex roots whose
/// imaginary part is below `imaginary_tolerance` (relative to the real part
/// once that exceeds one)
///
/// Rounding splits a repeated real root into a complex pair with an
/// imaginary part around the square root of machine precision.
#[must_use]
pub fn near_real_roots(coefficients: &[f64], imaginary_tolerance: f64) -> Vec<f64> {
    if coefficients.iter().any(|c| !c.is_finite()) {
        return Vec::new();
    }

    let Some(degree) = coefficients.iter().rposition(|c| c.abs() >= EPSILON) else {
        return Vec::new();
    };
    if degree == 0 {
        return Vec::new();
    }

    let leading = coefficients[degree];
    if degree == 1 {
        return vec![-coefficients[0] / leading];
    }

    let mut companion = DMatrix::<f64>::zeros(degree, degree);
    for (column, &c) in coefficients[..degree].iter().rev().enumerate() {
        companion[(0, column)] = -c / leading;
    }
    for row in 1..degree {
        companion[(row, row - 1)] = 1.0;
    }

    let Some(schur) = Schur::try_new(companion, f64::EPSILON, SCHUR_MAX_ITERATIONS) else {
        return Vec::new();
    };

    let mut roots: Vec<f64> = schur
        .complex_eigenvalues()
        .iter()
        .filter(|value| value.im.abs() < imaginary_tolerance * value.re.abs().max(1.0))
        .map(|value| value.re)
        .collect();

    roots.sort_by(f64::total_cmp);
    roots.dedup_by(|a, b| (*a - *b).abs() < DUPLICATE_ROOT_TOLERANCE);
    roots
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_quartic_with_four_roots() {
        // (x^2 - 1)(x^2 - 4)
        let roots = real_roots(&[4.0, 0.0, -5.0, 0.0, 1.0]);
        assert_eq!(roots.len(), 4);
        for (root, expected) in roots.iter().zip([-2.0, -1.0, 1.0, 2.0]) {
            assert_relative_eq!(*root, expected, epsilon = 1e-9);
        }
    }

    #[test]
    fn test_quartic_without_real_roots() {
        // x^4 + 1
        assert!(real_roots(&[1.0, 0.0, 0.0, 0.0, 1.0]).is_empty());
    }

    #[test]
    fn test_degree_drops_with_zero_leading_terms() {
        // 2x^2 - 8 written as a quartic
        let roots = real_roots(&[-8.0, 0.0, 2.0, 0.0, 0.0]);
        assert_eq!(roots.len(), 2);
        assert_relative_eq!(roots[0], -2.0, epsilon = 1e-9);
        assert_relative_eq!(roots[1], 2.0, epsilon = 1e-9);

        let linear = real_roots(&[3.0, -1.5, 0.0]);
        assert_eq!(linear, vec![2.0]);
    }

    #[test]
    fn test_degenerate_inputs() {
        assert!(real_roots(&[]).is_empty());
        assert!(real_roots(&[5.0, 0.0, 0.0]).is_empty());
        assert!(real_roots(&[1.0, f64::NAN, 1.0]).is_empty());
    }

    #[test]
    fn test_repeated_root_is_merged() {
        // (x - 3)^2 (x + 1)
        let roots = real_roots(&[9.0, 3.0, -5.0, 1.0]);
        assert!(roots.iter().any(|r| (r + 1.0).abs() < 1e-6));
        assert!(roots.iter().any(|r| (r - 3.0).abs() < 1e-6));
    }

    #[test]
    fn test_split_double_root_is_kept_when_tolerated() {
        // (x - 1)^2 + 1e-10 has roots 1 +- 1e-5 i
        let coefficients = [1.0 + 1e-10, -2.0, 1.0];
        assert!(real_roots(&coefficients).is_empty());

        let roots = near_real_roots(&coefficients, 1e-4);
        assert_eq!(roots.len(), 1);
        assert_relative_eq!(roots[0], 1.0, epsilon = 1e-9);
    }
}
