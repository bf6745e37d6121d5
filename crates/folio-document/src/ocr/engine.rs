// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// OCR backend using the `ocrs` crate, a pure-Rust OCR engine backed by neural
// network models executed via `rten`.
//
// # Model Setup
//
// The engine needs two model files:
//
// - `text-detection.rten` locates text regions in the image.
// - `text-recognition.rten` decodes characters from detected regions.
//
// Running `ocrs-cli` once downloads both to the default cache directory,
// `$XDG_CACHE_HOME/ocrs` (typically `~/.cache/ocrs`).

use std::path::{Path, PathBuf};

use folio_core::config::RecognitionMode;
use folio_core::error::{FolioError, Result};
use image::DynamicImage;
use ocrs::{DecodeMethod, ImageSource, OcrEngine as OcrsEngine, OcrEngineParams};
use rten::Model;
use tracing::{debug, info, instrument};

use super::OcrBackend;

/// Well-known filenames for the detection and recognition models.
const DETECTION_MODEL_FILENAME: &str = "text-detection.rten";
const RECOGNITION_MODEL_FILENAME: &str = "text-recognition.rten";

/// Beam width for [`RecognitionMode::Accurate`].
const ACCURATE_BEAM_WIDTH: u32 = 100;

/// Default directory for cached OCR model files.
pub fn default_model_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CACHE_HOME") {
        PathBuf::from(xdg).join("ocrs")
    } else if let Ok(home) = std::env::var("HOME") {
        PathBuf::from(home).join(".cache").join("ocrs")
    } else {
        PathBuf::from("ocrs-models")
    }
}

/// Configuration for constructing an [`OcrsBackend`].
#[derive(Debug, Clone)]
pub struct OcrConfig {
    pub detection_model_path: PathBuf,
    pub recognition_model_path: PathBuf,
    pub mode: RecognitionMode,
}

impl Default for OcrConfig {
    fn default() -> Self {
        Self::from_dir(default_model_dir())
    }
}

impl OcrConfig {
    /// Models named `text-detection.rten` and `text-recognition.rten` in `dir`.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        Self {
            detection_model_path: dir.join(DETECTION_MODEL_FILENAME),
            recognition_model_path: dir.join(RECOGNITION_MODEL_FILENAME),
            mode: RecognitionMode::default(),
        }
    }

    pub fn with_mode(mut self, mode: RecognitionMode) -> Self {
        self.mode = mode;
        self
    }

    /// Whether both model files are present.
    pub fn models_available(&self) -> bool {
        self.detection_model_path.exists() && self.recognition_model_path.exists()
    }

    /// Verify that both model files exist.
    pub fn validate(&self) -> Result<()> {
        for (kind, path) in [
            ("detection", &self.detection_model_path),
            ("recognition", &self.recognition_model_path),
        ] {
            if !path.exists() {
                return Err(FolioError::Ocr(format!(
                    "{kind} model not found at {}; run `ocrs-cli` once to download models",
                    path.display()
                )));
            }
        }
        Ok(())
    }
}

fn decode_method(mode: RecognitionMode) -> DecodeMethod {
    match mode {
        RecognitionMode::Accurate => DecodeMethod::BeamSearch {
            width: ACCURATE_BEAM_WIDTH,
        },
        RecognitionMode::Fast => DecodeMethod::Greedy,
    }
}

/// [`OcrBackend`] running the `ocrs` engine.
///
/// Model loading is the expensive step; build one backend and share it.
/// `ocrs` and `rten` are very slow in debug builds.
pub struct OcrsBackend {
    engine: OcrsEngine,
}

impl OcrsBackend {
    #[instrument(skip_all, fields(
        detection = %config.detection_model_path.display(),
        recognition = %config.recognition_model_path.display(),
        mode = ?config.mode,
    ))]
    pub fn new(config: OcrConfig) -> Result<Self> {
        config.validate()?;

        info!("Loading OCR detection model");
        let detection_model = Model::load_file(&config.detection_model_path).map_err(|err| {
            FolioError::Ocr(format!(
                "failed to load detection model from {}: {err}",
                config.detection_model_path.display()
            ))
        })?;

        info!("Loading OCR recognition model");
        let recognition_model = Model::load_file(&config.recognition_model_path).map_err(|err| {
            FolioError::Ocr(format!(
                "failed to load recognition model from {}: {err}",
                config.recognition_model_path.display()
            ))
        })?;

        let engine = OcrsEngine::new(OcrEngineParams {
            detection_model: Some(detection_model),
            recognition_model: Some(recognition_model),
            decode_method: decode_method(config.mode),
            ..Default::default()
        })
        .map_err(|err| FolioError::Ocr(format!("failed to initialise OCR engine: {err}")))?;

        info!("OCR engine initialised");
        Ok(Self { engine })
    }
}

impl OcrBackend for OcrsBackend {
    fn recognize_text(&self, image: &DynamicImage) -> Result<String> {
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();

        let source = ImageSource::from_bytes(rgb.as_raw(), (width, height)).map_err(|err| {
            FolioError::Recognition(format!(
                "failed to create image source ({width}x{height}): {err}"
            ))
        })?;
        let input = self
            .engine
            .prepare_input(source)
            .map_err(|err| FolioError::Recognition(format!("preprocessing failed: {err}")))?;
        let text = self
            .engine
            .get_text(&input)
            .map_err(|err| FolioError::Recognition(format!("text decoding failed: {err}")))?;

        debug!(lines = text.lines().count(), chars = text.len(), "OCR page done");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn config_from_dir() {
        let config = OcrConfig::from_dir("/tmp/my-models");
        assert_eq!(
            config.detection_model_path,
            PathBuf::from("/tmp/my-models/text-detection.rten")
        );
        assert_eq!(
            config.recognition_model_path,
            PathBuf::from("/tmp/my-models/text-recognition.rten")
        );
        assert_eq!(config.mode, RecognitionMode::Accurate);
    }

    #[test]
    fn missing_models_fail_validation() {
        let config = OcrConfig::from_dir("/nonexistent/path/ocr-models");
        assert!(!config.models_available());
        assert!(matches!(config.validate(), Err(FolioError::Ocr(_))));
        assert!(OcrsBackend::new(config).is_err());
    }

    #[test]
    fn modes_pick_decoders() {
        assert!(matches!(decode_method(RecognitionMode::Fast), DecodeMethod::Greedy));
        assert!(matches!(
            decode_method(RecognitionMode::Accurate),
            DecodeMethod::BeamSearch { width: ACCURATE_BEAM_WIDTH }
        ));
    }

    #[test]
    fn blank_page_has_no_text_when_models_present() {
        let config = OcrConfig::default();
        if !config.models_available() {
            return;
        }
        let backend =
            OcrsBackend::new(config.with_mode(RecognitionMode::Fast)).expect("load models");
        let blank = DynamicImage::ImageRgb8(RgbImage::from_pixel(200, 200, Rgb([255, 255, 255])));
        let text = backend.recognize_text(&blank).expect("recognize");
        assert!(text.trim().is_empty(), "got {text:?}");
    }
}
