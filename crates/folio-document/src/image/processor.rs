// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Image processor — resizing, OCR binarisation, and preview encoding for page
// images. Operates on in-memory images using the `image` and `imageproc`
// crates.

use folio_core::error::{FolioError, Result};
use image::{DynamicImage, GrayImage, Luma};
use imageproc::contrast::otsu_level;
use tracing::{debug, instrument};

/// Image processing pipeline operating on a single in-memory image.
///
/// Each transformation consumes `self` and returns a new `ImageProcessor`,
/// enabling method chaining:
///
/// ```ignore
/// let preview = ImageProcessor::from_dynamic(page)
///     .resize_exact(77, 100)
///     .to_jpeg_bytes(70)?;
/// ```
pub struct ImageProcessor {
    /// The current working image.
    image: DynamicImage,
}

impl ImageProcessor {
    /// Wrap an already-decoded `DynamicImage`.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self { image }
    }

    /// Create a processor from raw encoded bytes (JPEG, PNG, etc.).
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let img = image::load_from_memory(data)
            .map_err(|err| FolioError::Image(format!("failed to decode image: {err}")))?;
        Ok(Self { image: img })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn as_dynamic(&self) -> &DynamicImage {
        &self.image
    }

    pub fn into_dynamic(self) -> DynamicImage {
        self.image
    }

    /// Resize to exactly `width` x `height` with Lanczos3 filtering.
    pub fn resize_exact(self, width: u32, height: u32) -> Self {
        let resized =
            self.image
                .resize_exact(width, height, image::imageops::FilterType::Lanczos3);
        Self { image: resized }
    }

    /// Global black/white threshold at the Otsu level of the image.
    ///
    /// Helps recognition on unevenly lit phone captures; a uniform image stays
    /// uniform.
    #[instrument(skip(self), fields(width = self.image.width(), height = self.image.height()))]
    pub fn binarize_otsu(self) -> Self {
        let gray = self.image.to_luma8();
        let threshold = otsu_level(&gray);
        debug!(threshold, "Otsu threshold computed");

        let (width, height) = gray.dimensions();
        let binary = GrayImage::from_fn(width, height, |x, y| {
            let val = gray.get_pixel(x, y).0[0];
            // Strictly below the level is ink; an all-white page maps to white.
            if val < threshold { Luma([0u8]) } else { Luma([255u8]) }
        });

        Self {
            image: DynamicImage::ImageLuma8(binary),
        }
    }

    /// Encode the current image as JPEG bytes with the given quality (1-100).
    pub fn to_jpeg_bytes(&self, quality: u8) -> Result<Vec<u8>> {
        let mut buffer = Vec::new();
        let rgb = self.image.to_rgb8();
        let encoder =
            image::codecs::jpeg::JpegEncoder::new_with_quality(&mut buffer, quality.clamp(1, 100));
        rgb.write_with_encoder(encoder)
            .map_err(|err| FolioError::Image(format!("JPEG encoding failed: {err}")))?;
        Ok(buffer)
    }
}
