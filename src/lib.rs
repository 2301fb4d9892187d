// SeisRecover — Seismic gather reconstruction and missing-data recovery
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

//! Tiled patch inference with overlap-add blending, plus classical recovery
//! of gappy gathers: low-rank completion, sparse DCT recovery and
//! predictive deconvolution.

// ---------------------------------------------------------------------------
// Modules
// ---------------------------------------------------------------------------

pub mod cancel;
pub mod config;
pub mod core;
pub(crate) mod cosine_table;
pub mod dct;
pub mod deconvolution;
pub mod engine;
pub mod error;
pub mod grid;
pub mod lowrank;
pub mod metrics;
pub mod normalize;
pub mod recovery;
pub mod sparse;
pub mod tiling;
pub mod window;

// ---------------------------------------------------------------------------
// Re-exports
// ---------------------------------------------------------------------------

pub use cancel::CancelToken;
pub use config::InferenceConfig;
pub use dct::Dct2d;
pub use deconvolution::{
    autocorrelation, convolve_same, prediction_error_filter, prediction_operator,
    predictive_deconvolution, DeconvolutionConfig, DeconvolutionFit, DeconvolutionStatus,
    PredictiveDeconvolution, TraceDeconvolution,
};
pub use engine::{
    reconstruct, reconstruct_parallel, reconstruct_with_cancel, PatchBatch, Predictor,
};
pub use error::{PredictorError, RecoveryError, Result};
pub use grid::{Array2D, Mask2D};
pub use lowrank::{LowRankCompletion, LowRankConfig};
pub use metrics::{
    evaluate, evaluate_with_range, frequency_domain_correlation, mean_squared_error,
    peak_signal_to_noise_ratio, phase_coherence, signal_to_noise_ratio,
    structural_similarity_index, ReconstructionMetrics,
};
pub use normalize::NormalizationParams;
pub use recovery::{recover_batch, IterativeFit, RecoveryAlgorithm, RecoveryMethod, StopReason};
pub use sparse::{soft_threshold, SparseConfig, SparseRecovery};
pub use tiling::{plan, stride_for, PatchCoord, TilingPlan};
pub use window::{window, BlendBuffers, BlendWindow};

// ===========================================================================
// Tests (end-to-end scenarios)
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    /// Smooth synthetic gather: two dipping events on a gentle background.
    fn synthetic_gather(rows: usize, cols: usize) -> Array2D {
        Array2D::from_fn(rows, cols, |r, c| {
            let t = c as f64;
            let x = r as f64;
            (0.3 * t - 0.2 * x).sin() + 0.5 * (0.1 * t + 0.05 * x).cos() + 2.0
        })
    }

    /// Scattered gaps, one sample in `keep_every` knocked out as NaN.
    fn decimate(data: &Array2D, keep_every: usize) -> (Array2D, Mask2D) {
        let mask = Mask2D::from_fn(data.rows, data.cols, |r, c| {
            (r * 5 + c * 3) % keep_every != 1
        });
        let mut gappy = data.clone();
        for (v, &m) in gappy.data.iter_mut().zip(mask.values.iter()) {
            if !m {
                *v = f64::NAN;
            }
        }
        (gappy, mask)
    }

    fn zero_fill(data: &Array2D) -> Array2D {
        data.map(|v| if v.is_finite() { v } else { 0.0 })
    }

    // -- Engine ---------------------------------------------------------------

    #[test]
    fn test_identity_predictor_round_trip_through_preset() {
        let data = synthetic_gather(70, 90);
        let mut config = InferenceConfig::preset("autoencoder_denoise_v1").unwrap();
        config.patch_size = 32;
        let identity = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            Ok(b.clone())
        };
        let out = reconstruct(&data, &identity, &config).unwrap();
        assert_eq!(out.shape(), data.shape());
        assert!(out.max_abs_diff(&data) < 1e-4);
    }

    #[test]
    fn test_tiling_scenario_reaches_corner() {
        let p = plan(10, 10, 4, 2).unwrap();
        assert!(p.coords.iter().any(|c| c.row == 6 && c.col == 6));
        assert!(p.covers());
    }

    // -- Recovery -------------------------------------------------------------

    #[test]
    fn test_recovery_beats_zero_fill() {
        let truth = synthetic_gather(24, 32);
        let (gappy, _) = decimate(&truth, 4);
        let baseline = mean_squared_error(&truth, &zero_fill(&gappy));
        for method in [
            RecoveryMethod::LowRank(LowRankConfig {
                lambda: 0.05,
                max_iterations: 200,
                ..LowRankConfig::default()
            }),
            RecoveryMethod::Sparse(SparseConfig {
                lambda: 0.1,
                max_iterations: 200,
                ..SparseConfig::default()
            }),
        ] {
            let out = method.recover(&gappy, None).unwrap();
            let mse = mean_squared_error(&truth, &out);
            assert!(mse < baseline, "{:?}: {} vs zero-fill {}", method, mse, baseline);
        }
    }

    #[test]
    fn test_json_selected_method_on_batch() {
        let method = RecoveryMethod::from_json_str(
            r#"{"method": "sparse", "lambda": 0.05, "max_iters": 50, "accelerated": true}"#,
        )
        .unwrap();
        let truth = synthetic_gather(12, 16);
        let (gappy, mask) = decimate(&truth, 3);
        let results = recover_batch(&[gappy.clone(), gappy], &method);
        for res in results {
            let out = res.unwrap();
            for i in 0..out.len() {
                if mask.values[i] {
                    assert_eq!(out.data[i], truth.data[i]);
                } else {
                    assert!(out.data[i].is_finite());
                }
            }
        }
    }

    #[test]
    fn test_metrics_improve_after_recovery() {
        let truth = synthetic_gather(16, 16);
        let (gappy, mask) = decimate(&truth, 4);
        let out = LowRankCompletion::new(LowRankConfig {
            lambda: 0.05,
            max_iterations: 300,
            ..LowRankConfig::default()
        })
        .fit_transform(&gappy, Some(&mask))
        .unwrap();
        let before = evaluate(&truth, &zero_fill(&gappy));
        let after = evaluate(&truth, &out);
        assert!(after.snr_db > before.snr_db);
        assert!(after.psnr_db > before.psnr_db);
        assert!(after.ssim > before.ssim);
    }

    // -- Deconvolution --------------------------------------------------------

    #[test]
    fn test_deconvolution_zero_gather() {
        let data = Array2D::zeros(3, 50);
        let method = RecoveryMethod::Deconvolution(DeconvolutionConfig::default());
        let out = method.recover(&data, None).unwrap();
        assert!(out.data.iter().all(|&v| v == 0.0));
    }
}
