// SeisRecover — Compressed sensing recovery (ISTA / FISTA)
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
pub use crate::core::soft_threshold;
use crate::dct::Dct2d;
use crate::error::{ensure_nonzero, ensure_positive, Result};
use crate::grid::{resolve_mask, zero_filled, Array2D, Mask2D};
use crate::recovery::{run_iterations, IterativeFit, RecoveryAlgorithm};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Configuration for sparse recovery (ISTA/FISTA).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SparseConfig {
    /// Sparsity penalty weight (L1 regularization strength).
    pub lambda: f64,
    #[serde(alias = "max_iters")]
    pub max_iterations: u32,
    #[serde(alias = "tol")]
    pub tolerance: f64,
    /// If true, use FISTA (Nesterov acceleration) for O(1/k^2) convergence.
    /// If false, use plain ISTA with O(1/k) convergence.
    pub accelerated: bool,
}

impl Default for SparseConfig {
    fn default() -> Self {
        Self {
            lambda: 0.1,
            max_iterations: 100,
            tolerance: 1e-5,
            accelerated: false,
        }
    }
}

impl SparseConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("lambda", self.lambda)?;
        ensure_nonzero("max_iterations", self.max_iterations as usize)?;
        ensure_positive("tolerance", self.tolerance)
    }
}

// ---------------------------------------------------------------------------
// ISTA / FISTA solver
// ---------------------------------------------------------------------------

/// Recovery of a gather assumed sparse in the 2D orthonormal DCT domain.
///
/// ## Algorithm
/// 1. Initialize missing values with zero.
/// 2. Each iteration:
///    a. (FISTA only) Nesterov momentum extrapolation.
///    b. Forward 2D DCT.
///    c. Soft threshold DCT coefficients (enforce sparsity).
///    d. Inverse 2D DCT.
///    e. Re-project known values.
/// 3. Check convergence on the relative Frobenius change.
#[derive(Debug, Clone, Default)]
pub struct SparseRecovery {
    pub config: SparseConfig,
}

impl SparseRecovery {
    pub fn new(config: SparseConfig) -> Self {
        Self { config }
    }
}

/// Nesterov momentum state carried between FISTA iterations.
struct Momentum {
    prev: Vec<f64>,
    t_k: f64,
    point: Vec<f64>,
}

impl Momentum {
    fn new(start: Vec<f64>) -> Self {
        let n = start.len();
        Self {
            prev: start,
            t_k: 1.0,
            point: vec![0.0; n],
        }
    }

    /// `y = x + (t_k - 1) / t_{k+1} * (x - x_prev)`, then remember `x`.
    fn extrapolate(&mut self, current: &[f64]) -> &[f64] {
        let t_k1 = (1.0 + (1.0 + 4.0 * self.t_k * self.t_k).sqrt()) * 0.5;
        let momentum = (self.t_k - 1.0) / t_k1;
        self.t_k = t_k1;
        for ((y, &x), &p) in self.point.iter_mut().zip(current).zip(self.prev.iter()) {
            *y = x + momentum * (x - p);
        }
        self.prev.copy_from_slice(current);
        &self.point
    }
}

impl RecoveryAlgorithm for SparseRecovery {
    type Fitted = IterativeFit;

    fn fit_with_cancel(
        &self,
        data: &Array2D,
        mask: Option<&Mask2D>,
        cancel: &CancelToken,
    ) -> Result<IterativeFit> {
        self.config.validate()?;
        let mask = resolve_mask(data, mask)?;
        let dct = Dct2d::new(data.rows, data.cols);
        let threshold = self.config.lambda;
        let mut coeffs = vec![0.0; data.len()];
        let mut momentum = self
            .config
            .accelerated
            .then(|| Momentum::new(zero_filled(data, &mask)));

        run_iterations(
            "sparse",
            data,
            &mask,
            self.config.max_iterations,
            self.config.tolerance,
            cancel,
            |x, out| {
                let work = match momentum.as_mut() {
                    Some(m) => m.extrapolate(x),
                    None => x,
                };
                dct.forward(work, &mut coeffs);
                for c in coeffs.iter_mut() {
                    *c = soft_threshold(*c, threshold);
                }
                dct.inverse(&coeffs, out);
                Ok(())
            },
        )
    }

    fn transform(
        &self,
        fitted: &IterativeFit,
        data: &Array2D,
        mask: Option<&Mask2D>,
    ) -> Result<Array2D> {
        fitted.transform(data, mask)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
