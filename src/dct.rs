// SeisRecover — Orthonormal DCT-II / DCT-III
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use crate::cosine_table::CosineTable;

// ---------------------------------------------------------------------------
// 1D transforms
// ---------------------------------------------------------------------------

/// Forward orthonormal DCT-II of a 1D signal.
///
/// X[k] = s(k) * sum_n x[n] * cos(pi * (2n+1) * k / (2N))
pub(crate) fn dct2_1d(input: &[f64], output: &mut [f64], table: &CosineTable) {
    debug_assert_eq!(input.len(), table.size);
    debug_assert_eq!(output.len(), table.size);
    for (k, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (n, &inp) in input.iter().enumerate() {
            sum += inp * table.get(n, k);
        }
        *out = sum;
    }
}

/// Inverse orthonormal DCT (type III), exact inverse of [`dct2_1d`].
///
/// x[n] = sum_k s(k) * X[k] * cos(pi * (2n+1) * k / (2N))
pub(crate) fn dct3_1d(input: &[f64], output: &mut [f64], table: &CosineTable) {
    debug_assert_eq!(input.len(), table.size);
    debug_assert_eq!(output.len(), table.size);
    for (n, out) in output.iter_mut().enumerate() {
        let mut sum = 0.0;
        for (k, &inp) in input.iter().enumerate() {
            sum += inp * table.get(n, k);
        }
        *out = sum;
    }
}

// ---------------------------------------------------------------------------
// Separable 2D transform
// ---------------------------------------------------------------------------

/// Separable 2D orthonormal DCT over a row-major `rows x cols` buffer.
///
/// The forward transform runs DCT-II along every column (axis 0) then every
/// row (axis 1); the inverse undoes it with DCT-III in reverse order.
pub struct Dct2d {
    rows: usize,
    cols: usize,
    /// Table of length `cols`, used along each row.
    row_table: CosineTable,
    /// Table of length `rows`, used along each column.
    col_table: CosineTable,
}

impl Dct2d {
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            row_table: CosineTable::new(cols),
            col_table: CosineTable::new(rows),
        }
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    /// Forward 2D DCT-II.
    pub fn forward(&self, input: &[f64], output: &mut [f64]) {
        self.separable(input, output, dct2_1d);
    }

    /// Inverse 2D DCT-III.
    pub fn inverse(&self, input: &[f64], output: &mut [f64]) {
        self.separable(input, output, dct3_1d);
    }

    fn separable(
        &self,
        input: &[f64],
        output: &mut [f64],
        transform: fn(&[f64], &mut [f64], &CosineTable),
    ) {
        let (rows, cols) = (self.rows, self.cols);
        debug_assert_eq!(input.len(), rows * cols);
        debug_assert_eq!(output.len(), rows * cols);
        if rows == 0 || cols == 0 {
            return;
        }

        // Axis 0: each column of length rows
        let mut temp = vec![0.0; rows * cols];
        let mut col_in = vec![0.0; rows];
        let mut col_out = vec![0.0; rows];
        for c in 0..cols {
            for r in 0..rows {
                col_in[r] = input[r * cols + c];
            }
            transform(&col_in, &mut col_out, &self.col_table);
            for r in 0..rows {
                temp[r * cols + c] = col_out[r];
            }
        }

        // Axis 1: each row of length cols
        for r in 0..rows {
            let base = r * cols;
            transform(
                &temp[base..base + cols],
                &mut output[base..base + cols],
                &self.row_table,
            );
        }
    }
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dct_roundtrip_1d_identity() {
        let signal = vec![1.0, -3.0, 2.5, 8.0, 0.0, -1.25, 4.0];
        let table = CosineTable::new(signal.len());
        let mut coeffs = vec![0.0; signal.len()];
        let mut back = vec![0.0; signal.len()];
        dct2_1d(&signal, &mut coeffs, &table);
        dct3_1d(&coeffs, &mut back, &table);
        for (a, b) in signal.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-12, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_dct_1d_constant_signal_energy_in_dc() {
        let n = 8;
        let table = CosineTable::new(n);
        let mut coeffs = vec![0.0; n];
        dct2_1d(&vec![3.0; n], &mut coeffs, &table);
        // Orthonormal DC = sum / sqrt(N)
        assert!((coeffs[0] - 3.0 * (n as f64).sqrt()).abs() < 1e-12);
        for &c in &coeffs[1..] {
            assert!(c.abs() < 1e-12, "AC coefficient should vanish: {}", c);
        }
    }

    #[test]
    fn test_dct_1d_preserves_energy() {
        let signal = vec![0.5, 1.5, -2.0, 3.0, 7.0];
        let table = CosineTable::new(signal.len());
        let mut coeffs = vec![0.0; signal.len()];
        dct2_1d(&signal, &mut coeffs, &table);
        let e_sig: f64 = signal.iter().map(|v| v * v).sum();
        let e_coef: f64 = coeffs.iter().map(|v| v * v).sum();
        assert!((e_sig - e_coef).abs() < 1e-10);
    }

    #[test]
    fn test_dct_roundtrip_2d_non_square() {
        let (rows, cols) = (3, 5);
        let input: Vec<f64> = (0..rows * cols).map(|i| ((i * 7) % 11) as f64 - 4.0).collect();
        let dct = Dct2d::new(rows, cols);
        let mut coeffs = vec![0.0; rows * cols];
        let mut back = vec![0.0; rows * cols];
        dct.forward(&input, &mut coeffs);
        dct.inverse(&coeffs, &mut back);
        for (a, b) in input.iter().zip(back.iter()) {
            assert!((a - b).abs() < 1e-11);
        }
    }

    #[test]
    fn test_dct_2d_1x1_is_identity() {
        let dct = Dct2d::new(1, 1);
        let mut out = vec![0.0];
        dct.forward(&[42.0], &mut out);
        assert!((out[0] - 42.0).abs() < 1e-12);
    }

    #[test]
    fn test_dct_2d_empty_is_noop() {
        let dct = Dct2d::new(0, 4);
        let mut out: Vec<f64> = Vec::new();
        dct.forward(&[], &mut out);
        assert_eq!(dct.shape(), (0, 4));
    }
}
