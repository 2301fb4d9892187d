// SeisRecover — Tiled patch reconstruction engine
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use std::sync::mpsc;

use rayon::prelude::*;
use tracing::debug;

use crate::cancel::CancelToken;
use crate::config::InferenceConfig;
use crate::error::{PredictorError, RecoveryError, Result};
use crate::grid::Array2D;
use crate::normalize::NormalizationParams;
use crate::tiling::{plan, PatchCoord, TilingPlan};
use crate::window::{BlendBuffers, BlendWindow};

// ---------------------------------------------------------------------------
// Predictor capability
// ---------------------------------------------------------------------------

/// A stack of equally shaped 2D patches, layout `[count, height, width]`.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchBatch {
    pub count: usize,
    pub height: usize,
    pub width: usize,
    /// Row-major per patch: `data[(i * height + r) * width + c]`.
    pub data: Vec<f64>,
}

impl PatchBatch {
    /// # Panics
    /// Panics if `data.len() != count * height * width`.
    pub fn new(count: usize, height: usize, width: usize, data: Vec<f64>) -> Self {
        assert_eq!(
            data.len(),
            count * height * width,
            "data length must equal count * height * width"
        );
        Self {
            count,
            height,
            width,
            data,
        }
    }

    pub fn zeros(count: usize, height: usize, width: usize) -> Self {
        Self {
            count,
            height,
            width,
            data: vec![0.0; count * height * width],
        }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize, usize) {
        (self.count, self.height, self.width)
    }

    pub fn patch(&self, i: usize) -> &[f64] {
        let n = self.height * self.width;
        &self.data[i * n..(i + 1) * n]
    }

    pub fn patch_mut(&mut self, i: usize) -> &mut [f64] {
        let n = self.height * self.width;
        &mut self.data[i * n..(i + 1) * n]
    }

    /// Apply `f` to every sample, keeping the shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            count: self.count,
            height: self.height,
            width: self.width,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }
}

/// Opaque model mapping a batch of patches to a same-shaped batch.
///
/// Implementations should be deterministic for fixed weights. Any error is
/// handed back to the caller of [`reconstruct`] untouched.
pub trait Predictor {
    fn predict(&self, batch: &PatchBatch) -> std::result::Result<PatchBatch, PredictorError>;
}

impl<F> Predictor for F
where
    F: Fn(&PatchBatch) -> std::result::Result<PatchBatch, PredictorError>,
{
    fn predict(&self, batch: &PatchBatch) -> std::result::Result<PatchBatch, PredictorError> {
        self(batch)
    }
}

// ---------------------------------------------------------------------------
// Reconstruction
// ---------------------------------------------------------------------------

/// Reconstruct `data` with `predictor`, blending overlapping patches.
pub fn reconstruct<P: Predictor + ?Sized>(
    data: &Array2D,
    predictor: &P,
    config: &InferenceConfig,
) -> Result<Array2D> {
    reconstruct_with_cancel(data, predictor, config, &CancelToken::new())
}

/// [`reconstruct`] with a cancellation checkpoint before every batch.
///
/// A cancelled call returns [`RecoveryError::Cancelled`], never a partial blend.
pub fn reconstruct_with_cancel<P: Predictor + ?Sized>(
    data: &Array2D,
    predictor: &P,
    config: &InferenceConfig,
    cancel: &CancelToken,
) -> Result<Array2D> {
    let setup = Setup::new(data, config)?;
    let blended = blend_sequential(
        &setup.normalized,
        predictor,
        &setup.plan,
        &setup.window,
        config.batch_size,
        cancel,
    )?;
    Ok(setup.params.invert(&blended))
}

/// Parallel variant: batches are predicted on the rayon pool while one owner
/// thread performs every blend accumulation, in completion order.
pub fn reconstruct_parallel<P: Predictor + Sync + ?Sized>(
    data: &Array2D,
    predictor: &P,
    config: &InferenceConfig,
    cancel: &CancelToken,
) -> Result<Array2D> {
    let setup = Setup::new(data, config)?;
    let chunks: Vec<&[PatchCoord]> = setup.plan.coords.chunks(config.batch_size).collect();
    let (rows, cols) = setup.normalized.shape();
    let size = config.patch_size;
    let normalized = &setup.normalized;
    let window = &setup.window;
    let chunks_ref = &chunks;

    let (tx, rx) = mpsc::channel::<(usize, PatchBatch)>();

    let (buffers, produced) = std::thread::scope(|scope| {
        let owner = scope.spawn(move || {
            let mut buffers = BlendBuffers::new(rows, cols);
            for (idx, predictions) in rx {
                for (i, coord) in chunks_ref[idx].iter().enumerate() {
                    buffers.accumulate(coord, predictions.patch(i), window);
                }
            }
            buffers
        });

        let produced = chunks
            .par_iter()
            .enumerate()
            .try_for_each_with(tx, |tx, (idx, coords)| {
                if cancel.is_cancelled() {
                    return Err(RecoveryError::Cancelled);
                }
                let predictions = predict_batch(normalized, coords, predictor, size)?;
                tx.send((idx, predictions))
                    .map_err(|_| RecoveryError::Cancelled)
            });

        let buffers = owner
            .join()
            .unwrap_or_else(|panic| std::panic::resume_unwind(panic));
        (buffers, produced)
    });

    produced?;
    Ok(setup.params.invert(&buffers.finalize()))
}

// ---------------------------------------------------------------------------
// Internals
// ---------------------------------------------------------------------------

/// Validated, normalized input plus the placements to predict.
struct Setup {
    params: NormalizationParams,
    normalized: Array2D,
    plan: TilingPlan,
    window: BlendWindow,
}

impl Setup {
    fn new(data: &Array2D, config: &InferenceConfig) -> Result<Self> {
        config.validate()?;
        let stride = config.stride()?;
        let params = NormalizationParams::fit(data);
        let normalized = params.apply(data);
        let (rows, cols) = normalized.shape();
        let size = config.patch_size;

        // Inputs that fit in one patch skip the planner: a single zero-padded
        // placement, blended exactly like a one-patch tiled plan.
        let plan = if rows <= size && cols <= size {
            debug!(rows, cols, patch_size = size, "direct single-patch reconstruction");
            TilingPlan {
                rows,
                cols,
                patch_size: size,
                stride,
                coords: vec![PatchCoord {
                    row: 0,
                    col: 0,
                    height: rows,
                    width: cols,
                }],
            }
        } else {
            let p = plan(rows, cols, size, stride)?;
            debug!(
                rows,
                cols,
                patch_size = size,
                stride,
                patches = p.len(),
                batch_size = config.batch_size,
                "tiled reconstruction"
            );
            p
        };

        Ok(Self {
            params,
            normalized,
            plan,
            window: BlendWindow::new(size),
        })
    }
}

/// Predict and blend `plan` batch by batch on the calling thread.
pub(crate) fn blend_sequential<P: Predictor + ?Sized>(
    normalized: &Array2D,
    predictor: &P,
    plan: &TilingPlan,
    window: &BlendWindow,
    batch_size: usize,
    cancel: &CancelToken,
) -> Result<Array2D> {
    let mut buffers = BlendBuffers::new(normalized.rows, normalized.cols);
    for coords in plan.coords.chunks(batch_size) {
        if cancel.is_cancelled() {
            return Err(RecoveryError::Cancelled);
        }
        let predictions = predict_batch(normalized, coords, predictor, plan.patch_size)?;
        for (i, coord) in coords.iter().enumerate() {
            buffers.accumulate(coord, predictions.patch(i), window);
        }
    }
    Ok(buffers.finalize())
}

/// Extract zero-padded patches for `coords`, run one predictor call and check
/// the returned batch against the input shape.
fn predict_batch<P: Predictor + ?Sized>(
    normalized: &Array2D,
    coords: &[PatchCoord],
    predictor: &P,
    size: usize,
) -> Result<PatchBatch> {
    let mut batch = PatchBatch::zeros(coords.len(), size, size);
    for (i, c) in coords.iter().enumerate() {
        batch
            .patch_mut(i)
            .copy_from_slice(&normalized.extract_padded(c.row, c.col, c.height, c.width, size));
    }

    let predictions = predictor
        .predict(&batch)
        .map_err(|source| RecoveryError::Predictor { source })?;

    if predictions.shape() != batch.shape() || predictions.data.len() != batch.data.len() {
        return Err(RecoveryError::PredictorOutput {
            reason: format!(
                "expected shape {:?}, got {:?} with {} samples",
                batch.shape(),
                predictions.shape(),
                predictions.data.len()
            ),
        });
    }
    Ok(predictions)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tiling::stride_for;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn identity(batch: &PatchBatch) -> std::result::Result<PatchBatch, PredictorError> {
        Ok(batch.clone())
    }

    fn ramp(rows: usize, cols: usize) -> Array2D {
        Array2D::from_fn(rows, cols, |r, c| (r as f64 * 0.7).sin() * 5.0 + c as f64 * 0.1)
    }

    fn config(patch_size: usize, overlap: f64, batch_size: usize) -> InferenceConfig {
        InferenceConfig {
            patch_size,
            overlap,
            batch_size,
        }
    }

    // -- Shape & identity -------------------------------------------------------

    #[test]
    fn test_identity_predictor_reproduces_input() {
        let data = ramp(37, 29);
        let out = reconstruct(&data, &identity, &config(8, 0.5, 4)).unwrap();
        assert_eq!(out.shape(), data.shape());
        assert!(out.max_abs_diff(&data) < 1e-4, "diff {}", out.max_abs_diff(&data));
    }

    #[test]
    fn test_shape_preserved_across_sizes() {
        for &(rows, cols) in &[(1, 1), (3, 20), (20, 3), (16, 16), (17, 33)] {
            let data = ramp(rows, cols);
            let out = reconstruct(&data, &identity, &config(8, 0.25, 3)).unwrap();
            assert_eq!(out.shape(), (rows, cols));
        }
    }

    #[test]
    fn test_small_input_uses_single_call() {
        let calls = AtomicUsize::new(0);
        let counting = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            calls.fetch_add(1, Ordering::SeqCst);
            assert_eq!(b.shape(), (1, 16, 16));
            Ok(b.clone())
        };
        let data = ramp(5, 9);
        let out = reconstruct(&data, &counting, &config(16, 0.25, 8)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(out.max_abs_diff(&data) < 1e-4);
    }

    // -- Direct / tiled equivalence ---------------------------------------------

    #[test]
    fn test_direct_path_matches_single_patch_plan() {
        let size = 8;
        let data = ramp(size, size);
        let scale = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            Ok(b.map(|v| v * 1.5 - 0.25))
        };
        let cfg = config(size, 0.25, 2);
        let direct = reconstruct(&data, &scale, &cfg).unwrap();

        let params = NormalizationParams::fit(&data);
        let normalized = params.apply(&data);
        let forced = plan(size, size, size, stride_for(size, 0.25).unwrap()).unwrap();
        assert_eq!(forced.len(), 1);
        let tiled = blend_sequential(
            &normalized,
            &scale,
            &forced,
            &BlendWindow::new(size),
            cfg.batch_size,
            &CancelToken::new(),
        )
        .unwrap();
        assert_eq!(direct, params.invert(&tiled));
    }

    // -- Batching ---------------------------------------------------------------

    #[test]
    fn test_batches_respect_batch_size() {
        let calls = AtomicUsize::new(0);
        let counting = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            calls.fetch_add(1, Ordering::SeqCst);
            assert!(b.count <= 5);
            Ok(b.clone())
        };
        // 10x10, patch 4, stride 2 => 16 patches => 4 calls of <= 5
        reconstruct(&ramp(10, 10), &counting, &config(4, 0.5, 5)).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    // -- Errors -----------------------------------------------------------------

    #[test]
    fn test_config_errors_before_any_prediction() {
        let calls = AtomicUsize::new(0);
        let counting = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(b.clone())
        };
        let data = ramp(20, 20);
        assert!(matches!(
            reconstruct(&data, &counting, &config(0, 0.25, 4)),
            Err(RecoveryError::InvalidPatchSize)
        ));
        assert!(matches!(
            reconstruct(&data, &counting, &config(8, 1.0, 4)),
            Err(RecoveryError::InvalidOverlap { .. })
        ));
        assert!(matches!(
            reconstruct(&data, &counting, &config(8, 0.25, 0)),
            Err(RecoveryError::InvalidBatchSize)
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_predictor_failure_propagates() {
        let calls = AtomicUsize::new(0);
        let flaky = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            if calls.fetch_add(1, Ordering::SeqCst) == 1 {
                return Err("accelerator fault".into());
            }
            Ok(b.clone())
        };
        let err = reconstruct(&ramp(10, 10), &flaky, &config(4, 0.5, 5)).unwrap_err();
        match err {
            RecoveryError::Predictor { source } => {
                assert_eq!(source.to_string(), "accelerator fault")
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_predictor_wrong_shape_rejected() {
        let shrink = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            Ok(PatchBatch::zeros(b.count, b.height - 1, b.width))
        };
        let err = reconstruct(&ramp(12, 12), &shrink, &config(4, 0.0, 2)).unwrap_err();
        assert!(matches!(err, RecoveryError::PredictorOutput { .. }));
    }

    #[test]
    fn test_cancelled_returns_no_result() {
        let token = CancelToken::new();
        token.cancel();
        let err = reconstruct_with_cancel(&ramp(20, 20), &identity, &config(4, 0.5, 2), &token)
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Cancelled));
    }

    #[test]
    fn test_cancel_mid_run() {
        let token = CancelToken::new();
        let calls = AtomicUsize::new(0);
        let cancelling = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                token.cancel();
            }
            Ok(b.clone())
        };
        let err = reconstruct_with_cancel(&ramp(20, 20), &cancelling, &config(4, 0.5, 2), &token)
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Cancelled));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    // -- Parallel ---------------------------------------------------------------

    #[test]
    fn test_parallel_matches_sequential() {
        let data = ramp(45, 31);
        let twist = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            Ok(b.map(|v| v.tanh()))
        };
        let cfg = config(8, 0.5, 3);
        let seq = reconstruct(&data, &twist, &cfg).unwrap();
        let par = reconstruct_parallel(&data, &twist, &cfg, &CancelToken::new()).unwrap();
        assert_eq!(par.shape(), seq.shape());
        assert!(par.max_abs_diff(&seq) < 1e-9);
    }

    #[test]
    fn test_parallel_propagates_failure() {
        let failing = |_: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            Err("out of memory".into())
        };
        let cfg = config(8, 0.25, 2);
        let err = reconstruct_parallel(&ramp(30, 30), &failing, &cfg, &CancelToken::new())
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Predictor { .. }));
    }

    #[test]
    fn test_parallel_cancel_inside_predictor() {
        let token = CancelToken::new();
        let calls = AtomicUsize::new(0);
        let cancelling = |b: &PatchBatch| -> std::result::Result<PatchBatch, PredictorError> {
            calls.fetch_add(1, Ordering::SeqCst);
            token.cancel();
            Ok(b.clone())
        };
        // 81 patches in 41 batches over two workers: each worker sees the
        // token set before its second batch
        let pool = rayon::ThreadPoolBuilder::new().num_threads(2).build().unwrap();
        let err = pool
            .install(|| {
                reconstruct_parallel(&ramp(20, 20), &cancelling, &config(4, 0.5, 2), &token)
            })
            .unwrap_err();
        assert!(matches!(err, RecoveryError::Cancelled));
        assert!(calls.load(Ordering::SeqCst) <= 2);
    }

    // -- PatchBatch -------------------------------------------------------------

    #[test]
    fn test_patch_batch_layout() {
        let b = PatchBatch::new(2, 2, 3, (0..12).map(|v| v as f64).collect());
        assert_eq!(b.patch(1), &[6.0, 7.0, 8.0, 9.0, 10.0, 11.0]);
    }

    #[test]
    #[should_panic(expected = "data length must equal count * height * width")]
    fn test_patch_batch_bad_length() {
        PatchBatch::new(2, 2, 2, vec![0.0; 7]);
    }
}
