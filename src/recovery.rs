// SeisRecover — Recovery algorithm contract and dispatch
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cancel::CancelToken;
use crate::core::relative_change;
use crate::deconvolution::{DeconvolutionConfig, PredictiveDeconvolution};
use crate::error::{RecoveryError, Result};
use crate::grid::{impose_observed, resolve_mask, zero_filled, Array2D, Mask2D};
use crate::lowrank::{LowRankCompletion, LowRankConfig};
use crate::sparse::{SparseConfig, SparseRecovery};

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Shared fit/transform contract for classical recovery.
///
/// `fit` produces an immutable fitted value instead of mutating the
/// algorithm, so one configured instance can serve many gathers at once.
pub trait RecoveryAlgorithm {
    type Fitted;

    /// Fit with a cancellation checkpoint between iterations.
    fn fit_with_cancel(
        &self,
        data: &Array2D,
        mask: Option<&Mask2D>,
        cancel: &CancelToken,
    ) -> Result<Self::Fitted>;

    /// Produce the reconstruction for `data` from a fitted value.
    fn transform(
        &self,
        fitted: &Self::Fitted,
        data: &Array2D,
        mask: Option<&Mask2D>,
    ) -> Result<Array2D>;

    /// Fit on `data`. An absent mask is derived from non-finite samples.
    fn fit(&self, data: &Array2D, mask: Option<&Mask2D>) -> Result<Self::Fitted> {
        self.fit_with_cancel(data, mask, &CancelToken::new())
    }

    fn fit_transform(&self, data: &Array2D, mask: Option<&Mask2D>) -> Result<Array2D> {
        let fitted = self.fit(data, mask)?;
        self.transform(&fitted, data, mask)
    }
}

// ---------------------------------------------------------------------------
// Iterative fit state
// ---------------------------------------------------------------------------

/// Why an iterative fit stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// Relative change fell below the tolerance.
    Converged,
    /// The iteration budget ran out; the last iterate is a best effort.
    MaxIterations,
    /// Cancelled between iterations; the last completed iterate is kept.
    Cancelled,
}

/// Result of fitting a completion algorithm.
///
/// `reconstruction` equals the observed samples at every observed position,
/// whatever the stop reason.
#[derive(Debug, Clone, PartialEq)]
pub struct IterativeFit {
    pub reconstruction: Array2D,
    pub iterations: u32,
    pub stop: StopReason,
    /// Relative Frobenius change of the final iteration.
    pub final_change: f64,
}

impl IterativeFit {
    pub fn converged(&self) -> bool {
        self.stop == StopReason::Converged
    }

    /// Fitted reconstruction with the observed samples of `data` re-imposed.
    pub(crate) fn transform(&self, data: &Array2D, mask: Option<&Mask2D>) -> Result<Array2D> {
        if self.reconstruction.shape() != data.shape() {
            return Err(RecoveryError::FittedShapeMismatch {
                fitted: self.reconstruction.shape(),
                data: data.shape(),
            });
        }
        let mask = resolve_mask(data, mask)?;
        let mut out = self.reconstruction.clone();
        impose_observed(&mut out.data, data, &mask);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Projected iteration
// ---------------------------------------------------------------------------

/// Drive a projected fixed-point iteration shared by the completion solvers.
///
/// Starts from the zero-filled observations. Each pass calls `step(x, out)`,
/// re-imposes the observed samples on `out` and stops once the relative
/// Frobenius change drops below `tolerance`. Cancellation is checked before
/// every pass, so the returned iterate is always fully consistent.
pub(crate) fn run_iterations<F>(
    solver: &'static str,
    data: &Array2D,
    mask: &Mask2D,
    max_iterations: u32,
    tolerance: f64,
    cancel: &CancelToken,
    mut step: F,
) -> Result<IterativeFit>
where
    F: FnMut(&[f64], &mut [f64]) -> Result<()>,
{
    let mut current = zero_filled(data, mask);
    if current.is_empty() {
        return Ok(IterativeFit {
            reconstruction: Array2D::new(data.rows, data.cols, current),
            iterations: 0,
            stop: StopReason::Converged,
            final_change: 0.0,
        });
    }
    let mut next = vec![0.0; current.len()];
    let mut iterations = 0u32;
    let mut final_change = f64::INFINITY;
    let mut stop = StopReason::MaxIterations;

    while iterations < max_iterations {
        if cancel.is_cancelled() {
            stop = StopReason::Cancelled;
            break;
        }
        step(&current, &mut next)?;
        impose_observed(&mut next, data, mask);
        final_change = relative_change(&next, &current);
        std::mem::swap(&mut current, &mut next);
        iterations += 1;
        if final_change < tolerance {
            stop = StopReason::Converged;
            break;
        }
    }

    debug!(solver, iterations, ?stop, final_change, "iterative fit finished");
    if stop == StopReason::MaxIterations {
        warn!(solver, max_iterations, final_change, tolerance, "fit did not converge");
    }

    Ok(IterativeFit {
        reconstruction: Array2D::new(data.rows, data.cols, current),
        iterations,
        stop,
        final_change,
    })
}

// ---------------------------------------------------------------------------
// Method selection
// ---------------------------------------------------------------------------

/// Algorithm selector with its configuration, deserializable from
/// `{"method": "low_rank" | "sparse" | "deconvolution", ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum RecoveryMethod {
    LowRank(LowRankConfig),
    Sparse(SparseConfig),
    Deconvolution(DeconvolutionConfig),
}

impl RecoveryMethod {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let method: Self = serde_json::from_str(json)?;
        method.validate()?;
        Ok(method)
    }

    pub fn validate(&self) -> Result<()> {
        match self {
            Self::LowRank(c) => c.validate(),
            Self::Sparse(c) => c.validate(),
            Self::Deconvolution(c) => c.validate(),
        }
    }

    /// Fit and transform in one call with the selected algorithm.
    pub fn recover(&self, data: &Array2D, mask: Option<&Mask2D>) -> Result<Array2D> {
        self.recover_with_cancel(data, mask, &CancelToken::new())
    }

    pub fn recover_with_cancel(
        &self,
        data: &Array2D,
        mask: Option<&Mask2D>,
        cancel: &CancelToken,
    ) -> Result<Array2D> {
        match self {
            Self::LowRank(c) => run(&LowRankCompletion::new(c.clone()), data, mask, cancel),
            Self::Sparse(c) => run(&SparseRecovery::new(c.clone()), data, mask, cancel),
            Self::Deconvolution(c) => {
                run(&PredictiveDeconvolution::new(c.clone()), data, mask, cancel)
            }
        }
    }
}

fn run<A: RecoveryAlgorithm>(
    algorithm: &A,
    data: &Array2D,
    mask: Option<&Mask2D>,
    cancel: &CancelToken,
) -> Result<Array2D> {
    let fitted = algorithm.fit_with_cancel(data, mask, cancel)?;
    algorithm.transform(&fitted, data, mask)
}

/// Recover many gathers in parallel (Rayon). Masks are derived per gather.
pub fn recover_batch(gathers: &[Array2D], method: &RecoveryMethod) -> Vec<Result<Array2D>> {
    gathers.par_iter().map(|g| method.recover(g, None)).collect()
}

// ===========================================================================
// Tests
// ===========================================================================
