// SeisRecover — Predictive (Wiener–Levinson) deconvolution
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use nalgebra::{DMatrix, DVector};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cancel::CancelToken;
use crate::error::{ensure_nonzero, RecoveryError, Result};
use crate::grid::{resolve_mask, zero_filled, Array2D, Mask2D};
use crate::recovery::RecoveryAlgorithm;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Gapped prediction-error filter design.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeconvolutionConfig {
    /// Number of prediction coefficients `L`.
    pub operator_length: usize,
    /// Prediction gap `alpha` in samples; 1 is spiking deconvolution.
    pub prediction_distance: usize,
    /// Pre-whitening in percent of the zero-lag autocorrelation.
    pub white_noise: f64,
}

impl Default for DeconvolutionConfig {
    fn default() -> Self {
        Self {
            operator_length: 20,
            prediction_distance: 1,
            white_noise: 0.1,
        }
    }
}

impl DeconvolutionConfig {
    pub fn validate(&self) -> Result<()> {
        ensure_nonzero("operator_length", self.operator_length)?;
        ensure_nonzero("prediction_distance", self.prediction_distance)?;
        if !(self.white_noise.is_finite() && self.white_noise >= 0.0) {
            return Err(RecoveryError::InvalidParameter {
                name: "white_noise",
                value: self.white_noise,
            });
        }
        Ok(())
    }

    /// Shortest trace a filter can be designed for, `L + alpha`.
    pub fn min_trace_len(&self) -> usize {
        self.operator_length + self.prediction_distance
    }
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

/// Autocorrelation `r[k] = sum_n x[n] * x[n + k]` for lags `0..=max_lag`.
/// Lags at or beyond the trace length are zero.
pub fn autocorrelation(trace: &[f64], max_lag: usize) -> Vec<f64> {
    (0..=max_lag)
        .map(|lag| {
            if lag >= trace.len() {
                return 0.0;
            }
            trace[..trace.len() - lag]
                .iter()
                .zip(&trace[lag..])
                .map(|(a, b)| a * b)
                .sum()
        })
        .collect()
}

/// Solve the pre-whitened Toeplitz normal equations `R a = g`.
///
/// `R[i][j] = r[|i - j|]` for `i, j < L`, its diagonal scaled by
/// `1 + white_noise / 100`, and `g = r[alpha..alpha + L]`. Returns `None`
/// when `R` is not positive definite or the solution is not finite.
///
/// # Panics
/// Panics if `r` has fewer than `alpha + L` lags.
pub fn prediction_operator(
    r: &[f64],
    operator_length: usize,
    prediction_distance: usize,
    white_noise: f64,
) -> Option<Vec<f64>> {
    let l = operator_length;
    let alpha = prediction_distance;
    assert!(r.len() >= alpha + l, "autocorrelation too short for operator");

    let whitening = 1.0 + white_noise / 100.0;
    let toeplitz = DMatrix::from_fn(l, l, |i, j| {
        let v = r[i.abs_diff(j)];
        if i == j {
            v * whitening
        } else {
            v
        }
    });
    let rhs = DVector::from_column_slice(&r[alpha..alpha + l]);

    let solution = toeplitz.cholesky()?.solve(&rhs);
    if solution.iter().all(|v| v.is_finite()) {
        Some(solution.as_slice().to_vec())
    } else {
        None
    }
}

/// Prediction-error filter `[1, 0, .., 0, -a_0, .., -a_{L-1}]` of length
/// `alpha + L`, with the operator starting at index `alpha`.
pub fn prediction_error_filter(operator: &[f64], prediction_distance: usize) -> Vec<f64> {
    let mut pef = vec![0.0; prediction_distance + operator.len()];
    pef[0] = 1.0;
    for (dst, &a) in pef[prediction_distance..].iter_mut().zip(operator) {
        *dst = -a;
    }
    pef
}

/// Linear convolution cropped to the signal's length and centred on the
/// kernel: `out[n] = full[n + (K - 1) / 2]`.
pub fn convolve_same(signal: &[f64], kernel: &[f64]) -> Vec<f64> {
    let n = signal.len();
    let k = kernel.len();
    if n == 0 || k == 0 {
        return vec![0.0; n];
    }
    let offset = (k - 1) / 2;
    (0..n)
        .map(|i| {
            let m = i + offset;
            // full[m] = sum_j kernel[j] * signal[m - j] over valid j
            let lo = m.saturating_sub(n - 1);
            let hi = m.min(k - 1);
            (lo..=hi).map(|j| kernel[j] * signal[m - j]).sum()
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Single trace
// ---------------------------------------------------------------------------

/// Outcome of designing a filter for one trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeconvolutionStatus {
    /// The prediction-error filter was applied.
    Applied,
    /// Shorter than `operator_length + prediction_distance`; left unchanged.
    TraceTooShort,
    /// The normal equations could not be solved; left unchanged.
    Unstable,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TraceDeconvolution {
    pub trace: Vec<f64>,
    pub status: DeconvolutionStatus,
    /// The prediction-error filter, when one was designed.
    pub operator: Option<Vec<f64>>,
}

/// Design the prediction-error filter for one trace, or report why not.
fn design_filter(
    trace: &[f64],
    config: &DeconvolutionConfig,
) -> (DeconvolutionStatus, Option<Vec<f64>>) {
    let l = config.operator_length;
    let alpha = config.prediction_distance;
    if trace.len() < config.min_trace_len() {
        warn!(
            len = trace.len(),
            required = config.min_trace_len(),
            "trace too short for deconvolution, returned unchanged"
        );
        return (DeconvolutionStatus::TraceTooShort, None);
    }
    let r = autocorrelation(trace, l + alpha);
    match prediction_operator(&r, l, alpha, config.white_noise) {
        Some(a) => (
            DeconvolutionStatus::Applied,
            Some(prediction_error_filter(&a, alpha)),
        ),
        None => {
            warn!(
                operator_length = l,
                prediction_distance = alpha,
                "unstable normal equations, trace returned unchanged"
            );
            (DeconvolutionStatus::Unstable, None)
        }
    }
}

/// Gapped predictive deconvolution of a single trace.
///
/// Soft failures (short trace, unsolvable system) return the input unchanged
/// with the matching status; only an invalid configuration is an error.
pub fn predictive_deconvolution(
    trace: &[f64],
    config: &DeconvolutionConfig,
) -> Result<TraceDeconvolution> {
    config.validate()?;
    let (status, operator) = design_filter(trace, config);
    let out = match &operator {
        Some(pef) => convolve_same(trace, pef),
        None => trace.to_vec(),
    };
    Ok(TraceDeconvolution {
        trace: out,
        status,
        operator,
    })
}

// ---------------------------------------------------------------------------
// Gather
// ---------------------------------------------------------------------------

/// Per-trace filters designed for one gather (one trace per row).
#[derive(Debug, Clone, PartialEq)]
pub struct DeconvolutionFit {
    pub rows: usize,
    pub cols: usize,
    pub filters: Vec<Option<Vec<f64>>>,
    pub statuses: Vec<DeconvolutionStatus>,
}

impl DeconvolutionFit {
    pub fn applied_count(&self) -> usize {
        self.statuses
            .iter()
            .filter(|&&s| s == DeconvolutionStatus::Applied)
            .count()
    }
}

/// Trace-by-trace predictive deconvolution of a gather.
///
/// Missing samples contribute zero to the autocorrelation and the output.
/// This is a shaping filter: unlike the completion algorithms, its
/// `transform` rewrites observed samples too, so it does not honour the
/// [`RecoveryAlgorithm`] guarantee that observed samples come back unchanged.
#[derive(Debug, Clone, Default)]
pub struct PredictiveDeconvolution {
    pub config: DeconvolutionConfig,
}

impl PredictiveDeconvolution {
    pub fn new(config: DeconvolutionConfig) -> Self {
        Self { config }
    }
}

impl RecoveryAlgorithm for PredictiveDeconvolution {
    type Fitted = DeconvolutionFit;

    fn fit_with_cancel(
        &self,
        data: &Array2D,
        mask: Option<&Mask2D>,
        cancel: &CancelToken,
    ) -> Result<DeconvolutionFit> {
        self.config.validate()?;
        let mask = resolve_mask(data, mask)?;
        let filled = Array2D::new(data.rows, data.cols, zero_filled(data, &mask));

        let designed: Vec<(DeconvolutionStatus, Option<Vec<f64>>)> = (0..filled.rows)
            .into_par_iter()
            .map(|r| {
                if cancel.is_cancelled() {
                    return Err(RecoveryError::Cancelled);
                }
                Ok(design_filter(filled.row(r), &self.config))
            })
            .collect::<Result<_>>()?;

        let (statuses, filters) = designed.into_iter().unzip();
        Ok(DeconvolutionFit {
            rows: data.rows,
            cols: data.cols,
            filters,
            statuses,
        })
    }

    fn transform(
        &self,
        fitted: &DeconvolutionFit,
        data: &Array2D,
        mask: Option<&Mask2D>,
    ) -> Result<Array2D> {
        if (fitted.rows, fitted.cols) != data.shape() {
            return Err(RecoveryError::FittedShapeMismatch {
                fitted: (fitted.rows, fitted.cols),
                data: data.shape(),
            });
        }
        let mask = resolve_mask(data, mask)?;
        let mut out = Array2D::new(data.rows, data.cols, zero_filled(data, &mask));
        if out.cols == 0 {
            return Ok(out);
        }
        out.data
            .par_chunks_mut(data.cols)
            .zip(fitted.filters.par_iter())
            .for_each(|(row, filter)| {
                if let Some(pef) = filter {
                    let shaped = convolve_same(row, pef);
                    row.copy_from_slice(&shaped);
                }
            });
        Ok(out)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
