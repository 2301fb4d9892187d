// SeisRecover — Dense 2D arrays and observation masks
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use std::ops::{Index, IndexMut};

use crate::error::{RecoveryError, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A dense 2D array of samples, axes (trace, time-sample).
#[derive(Debug, Clone, PartialEq)]
pub struct Array2D {
    pub rows: usize,
    pub cols: usize,
    /// Row-major data: `data[r * cols + c]`.
    pub data: Vec<f64>,
}

/// Observation mask paired with an [`Array2D`]: `true` = observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mask2D {
    pub rows: usize,
    pub cols: usize,
    pub values: Vec<bool>,
}

// ---------------------------------------------------------------------------
// Array2D
// ---------------------------------------------------------------------------

impl Array2D {
    /// Create a new Array2D.
    ///
    /// # Panics
    /// Panics if `data.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols, "data length must equal rows * cols");
        Self { rows, cols, data }
    }

    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self::filled(rows, cols, 0.0)
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self {
            rows,
            cols,
            data: vec![value; rows * cols],
        }
    }

    /// Build an array by evaluating `f(row, col)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> f64) -> Self {
        let mut data = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                data.push(f(r, c));
            }
        }
        Self { rows, cols, data }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Borrow one trace (row).
    pub fn row(&self, r: usize) -> &[f64] {
        let base = r * self.cols;
        &self.data[base..base + self.cols]
    }

    pub fn row_mut(&mut self, r: usize) -> &mut [f64] {
        let base = r * self.cols;
        &mut self.data[base..base + self.cols]
    }

    /// Copy the `height x width` region at `(row, col)` into the top-left of
    /// a zero-filled `size x size` buffer.
    ///
    /// The region must lie within bounds and fit in the buffer.
    pub fn extract_padded(
        &self,
        row: usize,
        col: usize,
        height: usize,
        width: usize,
        size: usize,
    ) -> Vec<f64> {
        debug_assert!(height <= size && width <= size);
        debug_assert!(row + height <= self.rows && col + width <= self.cols);
        let mut patch = vec![0.0; size * size];
        for r in 0..height {
            let src = (row + r) * self.cols + col;
            patch[r * size..r * size + width].copy_from_slice(&self.data[src..src + width]);
        }
        patch
    }

    /// Element-wise map into a new array of the same shape.
    pub fn map(&self, f: impl Fn(f64) -> f64) -> Self {
        Self {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&v| f(v)).collect(),
        }
    }

    /// Maximum absolute element-wise difference to `other`.
    ///
    /// # Panics
    /// Panics if the shapes differ.
    pub fn max_abs_diff(&self, other: &Array2D) -> f64 {
        assert_eq!(self.shape(), other.shape(), "shapes must match");
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| (a - b).abs())
            .fold(0.0, f64::max)
    }
}

impl Index<(usize, usize)> for Array2D {
    type Output = f64;

    #[inline]
    fn index(&self, (r, c): (usize, usize)) -> &f64 {
        &self.data[r * self.cols + c]
    }
}

impl IndexMut<(usize, usize)> for Array2D {
    #[inline]
    fn index_mut(&mut self, (r, c): (usize, usize)) -> &mut f64 {
        &mut self.data[r * self.cols + c]
    }
}

// ---------------------------------------------------------------------------
// Mask2D
// ---------------------------------------------------------------------------

impl Mask2D {
    /// Create a new Mask2D.
    ///
    /// # Panics
    /// Panics if `values.len() != rows * cols`.
    pub fn new(rows: usize, cols: usize, values: Vec<bool>) -> Self {
        assert_eq!(values.len(), rows * cols, "mask length must equal rows * cols");
        Self { rows, cols, values }
    }

    /// Mask marking every sample observed.
    pub fn all_observed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            values: vec![true; rows * cols],
        }
    }

    /// Derive a mask from missing-sample markers: non-finite = missing.
    pub fn from_finite(data: &Array2D) -> Self {
        Self {
            rows: data.rows,
            cols: data.cols,
            values: data.data.iter().map(|v| v.is_finite()).collect(),
        }
    }

    /// Build a mask by evaluating `f(row, col)` for every cell.
    pub fn from_fn(rows: usize, cols: usize, mut f: impl FnMut(usize, usize) -> bool) -> Self {
        let mut values = Vec::with_capacity(rows * cols);
        for r in 0..rows {
            for c in 0..cols {
                values.push(f(r, c));
            }
        }
        Self { rows, cols, values }
    }

    #[inline]
    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    #[inline]
    pub fn is_observed(&self, r: usize, c: usize) -> bool {
        self.values[r * self.cols + c]
    }

    pub fn observed_count(&self) -> usize {
        self.values.iter().filter(|&&m| m).count()
    }

    /// Fraction of cells that are observed.
    pub fn observed_fraction(&self) -> f64 {
        let n = self.values.len();
        if n == 0 {
            return 0.0;
        }
        self.observed_count() as f64 * (n as f64).recip()
    }

    pub fn is_fully_observed(&self) -> bool {
        self.values.iter().all(|&m| m)
    }
}

// ---------------------------------------------------------------------------
// Data-consistency helpers
// ---------------------------------------------------------------------------

/// Resolve the effective mask for `data`.
///
/// An absent mask is derived from non-finite markers. A supplied mask must
/// match the data shape, and every observed sample must be finite.
pub(crate) fn resolve_mask(data: &Array2D, mask: Option<&Mask2D>) -> Result<Mask2D> {
    let mask = match mask {
        None => return Ok(Mask2D::from_finite(data)),
        Some(m) => m,
    };
    if mask.shape() != data.shape() {
        return Err(RecoveryError::ShapeMismatch {
            data: data.shape(),
            mask: mask.shape(),
        });
    }
    if let Some(idx) = data
        .data
        .iter()
        .zip(mask.values.iter())
        .position(|(v, &m)| m && !v.is_finite())
    {
        return Err(RecoveryError::NonFiniteObserved {
            row: idx / data.cols,
            col: idx % data.cols,
        });
    }
    Ok(mask.clone())
}

/// Observed samples copied, every missing sample set to zero.
pub(crate) fn zero_filled(data: &Array2D, mask: &Mask2D) -> Vec<f64> {
    data.data
        .iter()
        .zip(mask.values.iter())
        .map(|(&d, &m)| if m { d } else { 0.0 })
        .collect()
}

/// Overwrite every observed position of `values` with the observed sample.
#[inline]
pub(crate) fn impose_observed(values: &mut [f64], data: &Array2D, mask: &Mask2D) {
    for ((v, &d), &m) in values.iter_mut().zip(data.data.iter()).zip(mask.values.iter()) {
        if m {
            *v = d;
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================
