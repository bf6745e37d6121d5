// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Application configuration.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// OCR decoding strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecognitionMode {
    /// Slower, higher-quality decoding. Suits already-captured final scans.
    #[default]
    Accurate,
    /// Greedy decoding for interactive use.
    Fast,
}

/// Text recognition settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionConfig {
    pub mode: RecognitionMode,
    /// Post-correct recognized text (ligatures, hyphenated line breaks).
    pub language_correction: bool,
    /// Threshold pages to black and white before recognition.
    pub binarize: bool,
    /// Upper bound on pages recognized at once. `None` uses available cores.
    pub max_concurrency: Option<usize>,
}

impl Default for RecognitionConfig {
    fn default() -> Self {
        Self {
            mode: RecognitionMode::Accurate,
            language_correction: true,
            binarize: false,
            max_concurrency: None,
        }
    }
}

impl RecognitionConfig {
    /// Resolved worker count, never zero.
    pub fn concurrency(&self) -> usize {
        self.max_concurrency
            .unwrap_or_else(|| {
                std::thread::available_parallelism()
                    .map(|n| n.get())
                    .unwrap_or(2)
            })
            .max(1)
    }
}

/// Thumbnail settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThumbnailConfig {
    /// Fixed output height in pixels.
    pub height: u32,
    /// JPEG quality, 1-100.
    pub quality: u8,
}

impl Default for ThumbnailConfig {
    fn default() -> Self {
        Self {
            height: 100,
            quality: 70,
        }
    }
}

/// Persistent application settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub recognition: RecognitionConfig,
    /// Scale applied to each page's native size before OCR of imported PDFs.
    pub rasterize_scale: f32,
    pub thumbnail: ThumbnailConfig,
    /// Directory holding the OCR models. `None` uses the engine's cache dir.
    pub ocr_model_dir: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recognition: RecognitionConfig::default(),
            rasterize_scale: 2.0,
            thumbnail: ThumbnailConfig::default(),
            ocr_model_dir: None,
        }
    }
}
