// SeisRecover — Patch tiling planner
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use crate::error::{RecoveryError, Result};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Placement of one patch: top-left corner plus the extent actually
/// available inside the array (smaller than the patch at right/bottom edges).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchCoord {
    pub row: usize,
    pub col: usize,
    pub height: usize,
    pub width: usize,
}

/// Ordered patch placements for one (shape, patch size, stride).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TilingPlan {
    pub rows: usize,
    pub cols: usize,
    pub patch_size: usize,
    pub stride: usize,
    pub coords: Vec<PatchCoord>,
}

impl TilingPlan {
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    /// True when every cell lies inside at least one patch's clipped extent.
    pub fn covers(&self) -> bool {
        let mut hit = vec![false; self.rows * self.cols];
        for p in &self.coords {
            for r in p.row..p.row + p.height {
                let base = r * self.cols;
                hit[base + p.col..base + p.col + p.width]
                    .iter_mut()
                    .for_each(|h| *h = true);
            }
        }
        hit.into_iter().all(|h| h)
    }
}

// ---------------------------------------------------------------------------
// Stride
// ---------------------------------------------------------------------------

/// Stride for a fractional overlap: `max(1, round(patch_size * (1 - overlap)))`.
pub fn stride_for(patch_size: usize, overlap: f64) -> Result<usize> {
    if patch_size == 0 {
        return Err(RecoveryError::InvalidPatchSize);
    }
    if !(0.0..1.0).contains(&overlap) {
        return Err(RecoveryError::InvalidOverlap { overlap });
    }
    let stride = (patch_size as f64 * (1.0 - overlap)).round() as usize;
    Ok(stride.max(1))
}

// ---------------------------------------------------------------------------
// Planner
// ---------------------------------------------------------------------------

/// Plan patch placements over a `rows x cols` array.
///
/// Each axis walks `0, stride, 2*stride, ...` below
/// `max(1, extent - patch_size + 1)`; if the last step does not reach the far
/// edge, one extra start anchored at `extent - patch_size` is appended. Axes
/// shorter than the patch get a single start at 0. A stride wider than the
/// patch is clamped to `patch_size`, so neighbouring patches always touch.
pub fn plan(rows: usize, cols: usize, patch_size: usize, stride: usize) -> Result<TilingPlan> {
    if patch_size == 0 {
        return Err(RecoveryError::InvalidPatchSize);
    }
    if stride == 0 {
        return Err(RecoveryError::InvalidParameter {
            name: "stride",
            value: 0.0,
        });
    }

    let stride = stride.min(patch_size);
    let row_starts = axis_starts(rows, patch_size, stride);
    let col_starts = axis_starts(cols, patch_size, stride);

    let mut coords = Vec::with_capacity(row_starts.len() * col_starts.len());
    for &r in &row_starts {
        let height = patch_size.min(rows - r);
        for &c in &col_starts {
            coords.push(PatchCoord {
                row: r,
                col: c,
                height,
                width: patch_size.min(cols - c),
            });
        }
    }

    Ok(TilingPlan {
        rows,
        cols,
        patch_size,
        stride,
        coords,
    })
}

fn axis_starts(extent: usize, patch_size: usize, stride: usize) -> Vec<usize> {
    let last = extent.saturating_sub(patch_size);
    let mut starts: Vec<usize> = (0..=last).step_by(stride).collect();
    if starts.last() != Some(&last) {
        starts.push(last);
    }
    starts
}

// ===========================================================================
// Tests
// ===========================================================================
