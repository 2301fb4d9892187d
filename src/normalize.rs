// SeisRecover — Global affine normalization
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use serde::{Deserialize, Serialize};

use crate::core::{mean_and_std, NORM_EPS};
use crate::grid::Array2D;

/// Mean and standard deviation captured from one array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizationParams {
    pub mean: f64,
    pub std: f64,
}

impl NormalizationParams {
    /// Compute `mean` and population `std` of every sample.
    pub fn fit(array: &Array2D) -> Self {
        let (mean, std) = mean_and_std(&array.data);
        Self { mean, std }
    }

    /// `(x - mean) / (std + eps)`.
    pub fn apply(&self, array: &Array2D) -> Array2D {
        let scale = (self.std + NORM_EPS).recip();
        let mean = self.mean;
        array.map(|v| (v - mean) * scale)
    }

    /// `x * (std + eps) + mean`, undoing [`apply`](Self::apply).
    pub fn invert(&self, array: &Array2D) -> Array2D {
        let scale = self.std + NORM_EPS;
        let mean = self.mean;
        array.map(|v| v * scale + mean)
    }
}
