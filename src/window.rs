// SeisRecover — Overlap-add blend window and accumulators
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use std::f64::consts::PI;

use crate::core::BLEND_EPS;
use crate::grid::Array2D;
use crate::tiling::PatchCoord;

// ---------------------------------------------------------------------------
// Window
// ---------------------------------------------------------------------------

/// Separable sine taper used to weight patch predictions before summing.
///
/// `w[i] = sin(pi * (i + 0.5) / N)` is strictly positive, peaks at the
/// centre and never reaches zero at the edges; the 2D window is the outer
/// product `w[r] * w[c]`.
#[derive(Debug, Clone, PartialEq)]
pub struct BlendWindow {
    pub size: usize,
    taper: Vec<f64>,
    /// Row-major `size x size` outer product.
    weights: Vec<f64>,
}

impl BlendWindow {
    pub fn new(size: usize) -> Self {
        let rcp_n = if size > 0 { (size as f64).recip() } else { 0.0 };
        let taper: Vec<f64> = (0..size)
            .map(|i| (PI * (i as f64 + 0.5) * rcp_n).sin())
            .collect();
        let mut weights = Vec::with_capacity(size * size);
        for &wr in &taper {
            for &wc in &taper {
                weights.push(wr * wc);
            }
        }
        Self {
            size,
            taper,
            weights,
        }
    }

    /// The 1D taper.
    pub fn taper(&self) -> &[f64] {
        &self.taper
    }

    #[inline]
    pub fn weight(&self, r: usize, c: usize) -> f64 {
        self.weights[r * self.size + c]
    }

    /// The 2D window as an array.
    pub fn to_array(&self) -> Array2D {
        Array2D::new(self.size, self.size, self.weights.clone())
    }
}

/// Convenience: the `patch_size x patch_size` blend window.
pub fn window(patch_size: usize) -> Array2D {
    BlendWindow::new(patch_size).to_array()
}

// ---------------------------------------------------------------------------
// Accumulators
// ---------------------------------------------------------------------------

/// Weighted-sum and weight-sum accumulators for one reconstruction.
#[derive(Debug, Clone)]
pub struct BlendBuffers {
    output: Array2D,
    weight: Array2D,
}

impl BlendBuffers {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            output: Array2D::zeros(rows, cols),
            weight: Array2D::zeros(rows, cols),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.output.shape()
    }

    /// Add the valid `height x width` corner of a `size x size` prediction,
    /// tapered by the window, at the patch's coordinate.
    pub fn accumulate(&mut self, coord: &PatchCoord, prediction: &[f64], window: &BlendWindow) {
        let size = window.size;
        debug_assert_eq!(prediction.len(), size * size);
        debug_assert!(coord.height <= size && coord.width <= size);
        let cols = self.output.cols;
        for r in 0..coord.height {
            let dst = (coord.row + r) * cols + coord.col;
            let src = r * size;
            let out = &mut self.output.data[dst..dst + coord.width];
            let wsum = &mut self.weight.data[dst..dst + coord.width];
            let pred = &prediction[src..src + coord.width];
            let win = &window.weights[src..src + coord.width];
            for c in 0..coord.width {
                out[c] += pred[c] * win[c];
                wsum[c] += win[c];
            }
        }
    }

    /// Read-only view of the accumulated weight sum.
    pub fn weight(&self) -> &Array2D {
        &self.weight
    }

    /// `output / (weight + eps)`, consuming the buffers.
    pub fn finalize(self) -> Array2D {
        let mut result = self.output;
        for (o, &w) in result.data.iter_mut().zip(self.weight.data.iter()) {
            *o /= w + BLEND_EPS;
        }
        result
    }
}

// ===========================================================================
// Tests
// ===========================================================================
