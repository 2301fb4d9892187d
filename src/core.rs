// SeisRecover — Shared numeric utilities
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

// ---------------------------------------------------------------------------
// Epsilons
// ---------------------------------------------------------------------------

/// Guard added to the blend weight sum before division.
pub const BLEND_EPS: f64 = 1e-8;

/// Guard added to the standard deviation during normalization.
pub const NORM_EPS: f64 = 1e-8;

/// Guard added to the previous iterate's norm in the convergence test.
pub const CONVERGENCE_EPS: f64 = 1e-9;

// ---------------------------------------------------------------------------
// Norms
// ---------------------------------------------------------------------------

/// Frobenius (flat L2) norm of a buffer.
#[inline]
pub fn frobenius_norm(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum::<f64>().sqrt()
}

/// Relative change `||new - old||_F / (||old||_F + eps)`.
///
/// # Panics
/// Panics in debug builds if the lengths differ.
pub fn relative_change(new: &[f64], old: &[f64]) -> f64 {
    debug_assert_eq!(new.len(), old.len());
    let diff = new
        .iter()
        .zip(old.iter())
        .map(|(a, b)| (a - b) * (a - b))
        .sum::<f64>()
        .sqrt();
    diff / (frobenius_norm(old) + CONVERGENCE_EPS)
}

// ---------------------------------------------------------------------------
// Moments
// ---------------------------------------------------------------------------

/// Mean and population standard deviation. Empty input yields `(0, 0)`.
pub fn mean_and_std(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let rcp_n = (values.len() as f64).recip();
    let mean = values.iter().sum::<f64>() * rcp_n;
    let var = values.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() * rcp_n;
    (mean, var.sqrt())
}

// ---------------------------------------------------------------------------
// Soft thresholding
// ---------------------------------------------------------------------------

/// Branchless soft thresholding: sign(v) * max(|v| - t, 0).
///
/// Equivalent to:
///   if |v| <= t  => 0
///   if v > t     => v - t
///   if v < -t    => v + t
#[inline]
pub fn soft_threshold(v: f64, t: f64) -> f64 {
    let shrunk = v.abs() - t;
    let positive = if shrunk > 0.0 { shrunk } else { 0.0 };
    v.signum() * positive
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // -- Norms ------------------------------------------------------------------

    #[test]
    fn test_frobenius_norm() {
        assert!((frobenius_norm(&[3.0, 4.0]) - 5.0).abs() < 1e-15);
        assert_eq!(frobenius_norm(&[]), 0.0);
    }

    #[test]
    fn test_relative_change_identical_is_zero() {
        let v = vec![1.0, -2.0, 3.0];
        assert_eq!(relative_change(&v, &v), 0.0);
    }

    #[test]
    fn test_relative_change_from_zero_is_finite() {
        let c = relative_change(&[1.0], &[0.0]);
        assert!(c.is_finite());
        assert!(c > 1e8);
    }

    // -- Moments ----------------------------------------------------------------

    #[test]
    fn test_mean_and_std() {
        let (m, s) = mean_and_std(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((m - 5.0).abs() < 1e-12);
        assert!((s - 2.0).abs() < 1e-12);
    }

    #[test]
    fn test_mean_and_std_empty() {
        assert_eq!(mean_and_std(&[]), (0.0, 0.0));
    }

    // -- Soft threshold ---------------------------------------------------------

    #[test]
    fn test_soft_threshold_zero() {
        assert!((soft_threshold(0.5, 1.0) - 0.0).abs() < 1e-15);
        assert!((soft_threshold(-0.5, 1.0) - 0.0).abs() < 1e-15);
    }

    #[test]
    fn test_soft_threshold_positive_and_negative() {
        assert!((soft_threshold(3.0, 1.0) - 2.0).abs() < 1e-15);
        assert!((soft_threshold(-3.0, 1.0) - (-2.0)).abs() < 1e-15);
    }

    #[test]
    fn test_soft_threshold_exact_boundary() {
        assert_eq!(soft_threshold(1.0, 1.0), 0.0);
        assert_eq!(soft_threshold(-1.0, 1.0), 0.0);
    }

    #[test]
    fn test_soft_threshold_zero_threshold() {
        assert_eq!(soft_threshold(5.0, 0.0), 5.0);
        assert_eq!(soft_threshold(-5.0, 0.0), -5.0);
    }
}
