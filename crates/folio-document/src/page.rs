// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Captured page images — the unit a scan is made of.

use std::sync::Arc;

use folio_core::error::{FolioError, Result};
use image::DynamicImage;
use tracing::{debug, instrument};

/// One captured page: a decoded raster image plus its pixel size.
///
/// The pixels are shared behind an `Arc` so the renderer and the recognizer
/// can both read a page without copying it. Nothing mutates a page after
/// capture.
#[derive(Debug, Clone)]
pub struct PageImage {
    image: Arc<DynamicImage>,
}

impl PageImage {
    /// Wrap an already-decoded image.
    pub fn from_dynamic(image: DynamicImage) -> Self {
        Self {
            image: Arc::new(image),
        }
    }

    /// Decode a captured page from encoded bytes (JPEG, PNG, ...).
    ///
    /// A page that cannot be decoded is corrupt scan data, so this fails with
    /// [`FolioError::Render`].
    #[instrument(skip(data), fields(data_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let image = image::load_from_memory(data)
            .map_err(|err| FolioError::Render(format!("page image could not be decoded: {err}")))?;
        debug!(width = image.width(), height = image.height(), "Page decoded");
        Ok(Self::from_dynamic(image))
    }

    /// Decode a captured page from an image file.
    #[instrument(skip_all, fields(path = %path.as_ref().display()))]
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self> {
        let path = path.as_ref();
        let image = image::open(path).map_err(|err| {
            FolioError::Render(format!("failed to open page {}: {err}", path.display()))
        })?;
        Ok(Self::from_dynamic(image))
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

    /// A shared handle to the pixels, for handing to OCR workers.
    pub fn shared(&self) -> Arc<DynamicImage> {
        Arc::clone(&self.image)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};

    #[test]
    fn decodes_png_bytes() {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(12, 34, Rgb([255, 255, 255])));
        let mut encoded = Vec::new();
        img.write_to(&mut std::io::Cursor::new(&mut encoded), ImageFormat::Png)
            .expect("encode");

        let page = PageImage::from_bytes(&encoded).expect("decode");
        assert_eq!((page.width(), page.height()), (12, 34));
    }

    #[test]
    fn corrupt_bytes_are_a_render_failure() {
        let err = PageImage::from_bytes(b"definitely not an image").unwrap_err();
        assert!(matches!(err, FolioError::Render(_)), "got {err:?}");
    }
}
