// SeisRecover — Error taxonomy
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use thiserror::Error;

/// Boxed error produced by an opaque [`Predictor`](crate::engine::Predictor).
pub type PredictorError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum RecoveryError {
    #[error("patch_size must be positive")]
    InvalidPatchSize,
    #[error("overlap must lie in [0, 1), got {overlap}")]
    InvalidOverlap { overlap: f64 },
    #[error("batch_size must be positive")]
    InvalidBatchSize,
    #[error("{name} must be positive and finite, got {value}")]
    InvalidParameter { name: &'static str, value: f64 },
    #[error("mask shape {mask:?} does not match data shape {data:?}")]
    ShapeMismatch {
        data: (usize, usize),
        mask: (usize, usize),
    },
    #[error("observed sample at ({row}, {col}) is not finite")]
    NonFiniteObserved { row: usize, col: usize },
    #[error("unknown preset `{0}`")]
    UnknownPreset(String),
    #[error("predictor failed: {source}")]
    Predictor {
        #[source]
        source: PredictorError,
    },
    #[error("predictor output violates the batch contract: {reason}")]
    PredictorOutput { reason: String },
    #[error("operation cancelled")]
    Cancelled,
    #[error("singular value decomposition did not produce singular vectors")]
    Decomposition,
    #[error("fitted state has shape {fitted:?} but data has shape {data:?}")]
    FittedShapeMismatch {
        fitted: (usize, usize),
        data: (usize, usize),
    },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl RecoveryError {
    /// True for errors raised while validating inputs, before numeric work.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidPatchSize
                | Self::InvalidOverlap { .. }
                | Self::InvalidBatchSize
                | Self::InvalidParameter { .. }
                | Self::ShapeMismatch { .. }
                | Self::NonFiniteObserved { .. }
                | Self::UnknownPreset(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, RecoveryError>;

/// Validate that a tuning scalar is strictly positive and finite.
pub(crate) fn ensure_positive(name: &'static str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(RecoveryError::InvalidParameter { name, value })
    }
}

/// Validate that an iteration/length count is non-zero.
pub(crate) fn ensure_nonzero(name: &'static str, value: usize) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(RecoveryError::InvalidParameter {
            name,
            value: value as f64,
        })
    }
}
