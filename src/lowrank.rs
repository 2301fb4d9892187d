// SeisRecover — Low-rank matrix completion (soft-impute)
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};

use crate::cancel::CancelToken;
use crate::error::{ensure_nonzero, ensure_positive, RecoveryError, Result};
use crate::grid::{resolve_mask, Array2D, Mask2D};
use crate::recovery::{run_iterations, IterativeFit, RecoveryAlgorithm};

/// Sweep cap handed to the implicit-shift SVD.
const SVD_MAX_SWEEPS: usize = 10_000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LowRankConfig {
    /// Singular value shrinkage.
    pub lambda: f64,
    #[serde(alias = "max_iters")]
    pub max_iterations: u32,
    #[serde(alias = "tol")]
    pub tolerance: f64,
    /// Keep only the `rank` largest singular values each iteration.
    /// `None`, or a rank at least `min(rows, cols)`, uses the full spectrum.
    /// This caps the model rank only: every iteration still computes a full
    /// SVD, so a small rank does not make a step cheaper.
    pub rank: Option<usize>,
}

impl Default for LowRankConfig {
    fn default() -> Self {
        Self {
            lambda: 0.1,
            max_iterations: 100,
            tolerance: 1e-5,
            rank: None,
        }
    }
}

impl LowRankConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_positive("lambda", self.lambda)?;
        ensure_nonzero("max_iterations", self.max_iterations as usize)?;
        ensure_positive("tolerance", self.tolerance)?;
        if let Some(rank) = self.rank {
            ensure_nonzero("rank", rank)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Singular value thresholding
// ---------------------------------------------------------------------------

/// One soft-impute step: `out = U diag(max(s - lambda, 0)) V^T` of the
/// row-major `rows x cols` matrix `x`, optionally truncated to `rank` terms.
pub(crate) fn singular_value_threshold(
    x: &[f64],
    rows: usize,
    cols: usize,
    lambda: f64,
    rank: Option<usize>,
    out: &mut [f64],
) -> Result<()> {
    let matrix = DMatrix::from_row_slice(rows, cols, x);
    let mut svd = matrix
        .try_svd(true, true, f64::EPSILON, SVD_MAX_SWEEPS)
        .ok_or(RecoveryError::Decomposition)?;

    let full = rows.min(cols);
    let keep = rank.map_or(full, |k| k.min(full));
    if keep < full {
        let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
        order.sort_by(|&a, &b| svd.singular_values[b].total_cmp(&svd.singular_values[a]));
        for &idx in &order[keep..] {
            svd.singular_values[idx] = 0.0;
        }
    }
    for s in svd.singular_values.iter_mut() {
        *s = (*s - lambda).max(0.0);
    }

    let recomposed = svd.recompose().map_err(|_| RecoveryError::Decomposition)?;
    // Column-major storage of the transpose is the row-major original.
    out.copy_from_slice(recomposed.transpose().as_slice());
    Ok(())
}

// ---------------------------------------------------------------------------
// Solver
// ---------------------------------------------------------------------------

/// Nuclear-norm matrix completion by iterated singular value shrinkage.
#[derive(Debug, Clone, Default)]
pub struct LowRankCompletion {
    pub config: LowRankConfig,
}

impl LowRankCompletion {
    pub fn new(config: LowRankConfig) -> Self {
        Self { config }
    }
}

impl RecoveryAlgorithm for LowRankCompletion {
    type Fitted = IterativeFit;

    fn fit_with_cancel(
        &self,
        data: &Array2D,
        mask: Option<&Mask2D>,
        cancel: &CancelToken,
    ) -> Result<IterativeFit> {
        self.config.validate()?;
        let mask = resolve_mask(data, mask)?;
        let (rows, cols) = data.shape();
        let LowRankConfig {
            lambda,
            max_iterations,
            tolerance,
            rank,
        } = self.config;
        run_iterations(
            "low_rank",
            data,
            &mask,
            max_iterations,
            tolerance,
            cancel,
            |x, out| singular_value_threshold(x, rows, cols, lambda, rank, out),
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
