// SeisRecover — Precomputed orthonormal DCT basis
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use std::f64::consts::PI;

/// Precomputed orthonormal DCT-II basis.
///
/// Stores `s(k) * cos(PI * (2*n + 1) * k / (2*N))` in row-major layout
/// `table[n * size + k]`, where `s(0) = sqrt(1/N)` and `s(k) = sqrt(2/N)`
/// otherwise. With this scaling the basis matrix is orthogonal, so the
/// forward transform is its product and the inverse its transpose.
pub(crate) struct CosineTable {
    /// Table size (N).
    pub size: usize,
    /// Flat row-major storage: table[n * size + k].
    pub table: Vec<f64>,
}

impl CosineTable {
    pub fn new(size: usize) -> Self {
        if size == 0 {
            return Self {
                size: 0,
                table: Vec::new(),
            };
        }

        let rcp_2n = 1.0 / (2.0 * size as f64);
        let dc_scale = (1.0 / size as f64).sqrt();
        let ac_scale = (2.0 / size as f64).sqrt();
        let mut table = Vec::with_capacity(size * size);

        for n in 0..size {
            let base = PI * (2 * n + 1) as f64 * rcp_2n;
            for k in 0..size {
                let scale = if k == 0 { dc_scale } else { ac_scale };
                table.push(scale * (base * k as f64).cos());
            }
        }

        Self { size, table }
    }

    /// Lookup the scaled basis value for spatial index `n`, frequency `k`.
    #[inline]
    pub fn get(&self, n: usize, k: usize) -> f64 {
        self.table[n * self.size + k]
    }
}

// ===========================================================================
// Tests
// ===========================================================================
