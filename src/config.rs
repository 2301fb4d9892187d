// SeisRecover — Inference configuration and presets
// SPDX-License-Identifier: AGPL-3.0-or-later
// Copyright (C) 2026 Moroya Sakamoto

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RecoveryError, Result};
use crate::tiling::stride_for;

// ---------------------------------------------------------------------------
// InferenceConfig
// ---------------------------------------------------------------------------

/// Patch geometry and batching for tiled reconstruction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceConfig {
    pub patch_size: usize,
    /// Fractional overlap between neighbouring patches, in `[0, 1)`.
    pub overlap: f64,
    pub batch_size: usize,
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            patch_size: 128,
            overlap: 0.25,
            batch_size: 8,
        }
    }
}

/// Named inference presets.
const PRESETS: [(&str, InferenceConfig); 3] = [
    (
        "unet_denoise_v1",
        InferenceConfig {
            patch_size: 128,
            overlap: 0.25,
            batch_size: 8,
        },
    ),
    (
        "unet_reconstruction_v1",
        InferenceConfig {
            patch_size: 256,
            overlap: 0.5,
            batch_size: 4,
        },
    ),
    (
        "autoencoder_denoise_v1",
        InferenceConfig {
            patch_size: 64,
            overlap: 0.25,
            batch_size: 16,
        },
    ),
];

impl InferenceConfig {
    /// Reject non-positive sizes and overlaps outside `[0, 1)`.
    pub fn validate(&self) -> Result<()> {
        if self.patch_size == 0 {
            return Err(RecoveryError::InvalidPatchSize);
        }
        if !(0.0..1.0).contains(&self.overlap) {
            return Err(RecoveryError::InvalidOverlap {
                overlap: self.overlap,
            });
        }
        if self.batch_size == 0 {
            return Err(RecoveryError::InvalidBatchSize);
        }
        Ok(())
    }

    pub fn stride(&self) -> Result<usize> {
        stride_for(self.patch_size, self.overlap)
    }

    /// Look up a named preset.
    pub fn preset(name: &str) -> Result<Self> {
        PRESETS
            .iter()
            .find(|(n, _)| *n == name)
            .map(|(_, c)| *c)
            .ok_or_else(|| RecoveryError::UnknownPreset(name.to_string()))
    }

    pub fn preset_names() -> impl Iterator<Item = &'static str> {
        PRESETS.iter().map(|(n, _)| *n)
    }

    /// Parse and validate a JSON document; missing fields take defaults.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let config: Self = serde_json::from_reader(std::io::BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }
}

// ===========================================================================
// Tests
// ===========================================================================
