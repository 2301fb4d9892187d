// SeisRecover — Reconstruction quality metrics
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use rustfft::num_complex::Complex;
use rustfft::FftPlanner;
use serde::Serialize;

use crate::grid::Array2D;

/// Noise powers below this count as a perfect reconstruction.
const PERFECT_EPS: f64 = 1e-10;

/// Default SSIM window edge.
pub const SSIM_WINDOW: usize = 7;

fn check_shapes(original: &Array2D, reconstructed: &Array2D) {
    assert_eq!(
        original.shape(),
        reconstructed.shape(),
        "metric inputs must share a shape"
    );
}

fn mean_of(values: impl Iterator<Item = f64>, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        values.sum::<f64>() * (n as f64).recip()
    }
}

/// `mean((original - reconstructed)^2)`.
///
/// # Panics
/// Panics if the shapes differ.
pub fn mean_squared_error(original: &Array2D, reconstructed: &Array2D) -> f64 {
    check_shapes(original, reconstructed);
    mean_of(
        original
            .data
            .iter()
            .zip(&reconstructed.data)
            .map(|(a, b)| (a - b) * (a - b)),
        original.len(),
    )
}

/// Signal-to-noise ratio in dB, `+inf` for a (numerically) exact match.
///
/// # Panics
/// Panics if the shapes differ.
pub fn signal_to_noise_ratio(original: &Array2D, reconstructed: &Array2D) -> f64 {
    let noise_power = mean_squared_error(original, reconstructed);
    if noise_power < PERFECT_EPS {
        return f64::INFINITY;
    }
    let signal_power = mean_of(original.data.iter().map(|v| v * v), original.len());
    10.0 * (signal_power / (noise_power + PERFECT_EPS)).log10()
}

/// Peak signal-to-noise ratio in dB.
///
/// `data_range` defaults to `max(original) - min(original)`.
///
/// # Panics
/// Panics if the shapes differ.
pub fn peak_signal_to_noise_ratio(
    original: &Array2D,
    reconstructed: &Array2D,
    data_range: Option<f64>,
) -> f64 {
    let mse = mean_squared_error(original, reconstructed);
    if mse < PERFECT_EPS {
        return f64::INFINITY;
    }
    let range = data_range.unwrap_or_else(|| default_range(original));
    10.0 * (range * range / (mse + PERFECT_EPS)).log10()
}

fn default_range(original: &Array2D) -> f64 {
    let (lo, hi) = original
        .data
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    if original.is_empty() {
        0.0
    } else {
        hi - lo
    }
}

// ---------------------------------------------------------------------------
// Structural similarity
// ---------------------------------------------------------------------------

/// Box mean over a `k x k` window at stride 1, zero padded by `k / 2` on
/// every side. Every window divides by `k * k`, padding included, so the
/// output is `(rows + 2p - k + 1) x (cols + 2p - k + 1)`.
fn box_mean(values: &[f64], rows: usize, cols: usize, k: usize) -> (Vec<f64>, usize, usize) {
    let pad = k / 2;
    let out_rows = rows + 2 * pad + 1 - k;
    let out_cols = cols + 2 * pad + 1 - k;
    let inv = ((k * k) as f64).recip();
    let mut out = vec![0.0; out_rows * out_cols];
    for (i, row) in out.chunks_mut(out_cols).enumerate() {
        for (j, cell) in row.iter_mut().enumerate() {
            let mut acc = 0.0;
            for di in 0..k {
                let r = (i + di).wrapping_sub(pad);
                if r >= rows {
                    continue;
                }
                for dj in 0..k {
                    let c = (j + dj).wrapping_sub(pad);
                    if c < cols {
                        acc += values[r * cols + c];
                    }
                }
            }
            *cell = acc * inv;
        }
    }
    (out, out_rows, out_cols)
}

/// Mean structural similarity over sliding `window x window` patches.
///
/// The window is clamped to the array's smaller side and never drops below
/// 3. Constants are `C1 = (0.01 R)^2`, `C2 = (0.03 R)^2` with `R` the data
/// range (default `max(original) - min(original)`). A window whose
/// numerator and denominator are both zero counts as identical.
///
/// # Panics
/// Panics if the shapes differ.
pub fn structural_similarity_index(
    original: &Array2D,
    reconstructed: &Array2D,
    window: usize,
    data_range: Option<f64>,
) -> f64 {
    check_shapes(original, reconstructed);
    if original.is_empty() {
        return 1.0;
    }
    let (rows, cols) = original.shape();
    let range = data_range.unwrap_or_else(|| default_range(original));
    let c1 = (0.01 * range).powi(2);
    let c2 = (0.03 * range).powi(2);
    let k = window.min(rows).min(cols).max(3);

    let x = reconstructed.data.as_slice();
    let y = original.data.as_slice();
    let squares = |v: &[f64]| v.iter().map(|a| a * a).collect::<Vec<_>>();
    let cross: Vec<f64> = x.iter().zip(y).map(|(a, b)| a * b).collect();

    let (mu_x, out_rows, out_cols) = box_mean(x, rows, cols, k);
    let (mu_y, ..) = box_mean(y, rows, cols, k);
    let (ex2, ..) = box_mean(&squares(x), rows, cols, k);
    let (ey2, ..) = box_mean(&squares(y), rows, cols, k);
    let (exy, ..) = box_mean(&cross, rows, cols, k);

    let total: f64 = (0..out_rows * out_cols)
        .map(|i| {
            let (mx, my) = (mu_x[i], mu_y[i]);
            let var_x = ex2[i] - mx * mx;
            let var_y = ey2[i] - my * my;
            let cov = exy[i] - mx * my;
            let num = (2.0 * mx * my + c1) * (2.0 * cov + c2);
            let den = (mx * mx + my * my + c1) * (var_x + var_y + c2);
            if den == 0.0 && num == 0.0 {
                1.0
            } else {
                num / den
            }
        })
        .sum();
    total / (out_rows * out_cols) as f64
}

// ---------------------------------------------------------------------------
// Spectral metrics
// ---------------------------------------------------------------------------

type Spectrum = Vec<Complex<f64>>;

/// Forward FFT of both inputs flattened in row-major order.
fn spectra(original: &Array2D, reconstructed: &Array2D) -> (Spectrum, Spectrum) {
    let n = original.len();
    let fft = FftPlanner::<f64>::new().plan_fft_forward(n);
    let transform = |a: &Array2D| {
        let mut buf: Spectrum = a.data.iter().map(|&v| Complex::new(v, 0.0)).collect();
        fft.process(&mut buf);
        buf
    };
    (transform(original), transform(reconstructed))
}

fn pearson(a: &[f64], b: &[f64]) -> f64 {
    let n = a.len() as f64;
    let mean_a = a.iter().sum::<f64>() / n;
    let mean_b = b.iter().sum::<f64>() / n;
    let (mut cov, mut var_a, mut var_b) = (0.0, 0.0, 0.0);
    for (x, y) in a.iter().zip(b) {
        let (da, db) = (x - mean_a, y - mean_b);
        cov += da * db;
        var_a += da * da;
        var_b += db * db;
    }
    cov / (var_a * var_b).sqrt()
}

/// Pearson correlation of the amplitude spectra over the first `n / 2`
/// bins of the flattened data. Undefined correlations (flat spectra, too
/// few bins) report `0.0`.
///
/// # Panics
/// Panics if the shapes differ.
pub fn frequency_domain_correlation(original: &Array2D, reconstructed: &Array2D) -> f64 {
    check_shapes(original, reconstructed);
    let half = original.len() / 2;
    if half == 0 {
        return 0.0;
    }
    let (orig, recon) = spectra(original, reconstructed);
    let amp = |s: &[Complex<f64>]| s[..half].iter().map(|z| z.norm()).collect::<Vec<_>>();
    let corr = pearson(&amp(&orig[..]), &amp(&recon[..]));
    if corr.is_nan() {
        0.0
    } else {
        corr
    }
}

/// Mean cosine of the per-bin phase difference, mapped to `[0, 1]`.
///
/// Bins with zero energy have phase 0. Empty inputs report `0.0`.
///
/// # Panics
/// Panics if the shapes differ.
pub fn phase_coherence(original: &Array2D, reconstructed: &Array2D) -> f64 {
    check_shapes(original, reconstructed);
    if original.is_empty() {
        return 0.0;
    }
    let (orig, recon) = spectra(original, reconstructed);
    let mean_cos = mean_of(
        orig.iter().zip(&recon).map(|(a, b)| (a.arg() - b.arg()).cos()),
        orig.len(),
    );
    (mean_cos + 1.0) * 0.5
}

// ---------------------------------------------------------------------------
// Summary
// ---------------------------------------------------------------------------

/// Metric bundle for one reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ReconstructionMetrics {
    pub mse: f64,
    pub snr_db: f64,
    pub psnr_db: f64,
    pub ssim: f64,
    pub freq_correlation: f64,
    pub phase_coherence: f64,
}

/// Compute every metric against `original`.
///
/// # Panics
/// Panics if the shapes differ.
pub fn evaluate(original: &Array2D, reconstructed: &Array2D) -> ReconstructionMetrics {
    evaluate_with_range(original, reconstructed, None)
}

/// [`evaluate`] with an explicit data range for PSNR and SSIM.
///
/// # Panics
/// Panics if the shapes differ.
pub fn evaluate_with_range(
    original: &Array2D,
    reconstructed: &Array2D,
    data_range: Option<f64>,
) -> ReconstructionMetrics {
    ReconstructionMetrics {
        mse: mean_squared_error(original, reconstructed),
        snr_db: signal_to_noise_ratio(original, reconstructed),
        psnr_db: peak_signal_to_noise_ratio(original, reconstructed, data_range),
        ssim: structural_similarity_index(original, reconstructed, SSIM_WINDOW, data_range),
        freq_correlation: frequency_domain_correlation(original, reconstructed),
        phase_coherence: phase_coherence(original, reconstructed),
    }
}

// ===========================================================================
// Tests
// ===========================================================================
