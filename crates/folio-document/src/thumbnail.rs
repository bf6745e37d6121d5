// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Thumbnail generator — a fixed-height JPEG preview of a PDF's first page.

use std::sync::Arc;

use folio_core::config::ThumbnailConfig;
use folio_core::error::{FolioError, Result};
use folio_core::types::Thumbnail;
use tracing::{debug, instrument, warn};

use crate::image::ImageProcessor;
use crate::pdf::PdfRasterizer;

/// Previews the first page of a PDF at a fixed height, keeping the page's
/// aspect ratio.
#[derive(Clone)]
pub struct ThumbnailGenerator {
    rasterizer: Arc<dyn PdfRasterizer>,
    config: ThumbnailConfig,
}

impl ThumbnailGenerator {
    pub fn new(rasterizer: Arc<dyn PdfRasterizer>, config: ThumbnailConfig) -> Self {
        Self { rasterizer, config }
    }

    /// Preview of the first page, or `None` when the document has no pages
    /// or cannot be rasterised. A missing preview never fails ingestion.
    pub fn generate(&self, pdf: &[u8]) -> Option<Thumbnail> {
        match self.try_generate(pdf) {
            Ok(thumbnail) => Some(thumbnail),
            Err(err) => {
                warn!(%err, "No thumbnail for document");
                None
            }
        }
    }

    /// Like [`generate`](Self::generate) but reports why no preview was made.
    #[instrument(skip_all, fields(bytes_len = pdf.len()))]
    pub fn try_generate(&self, pdf: &[u8]) -> Result<Thumbnail> {
        let height = self.config.height.max(1);
        let (page_w, page_h) = self
            .rasterizer
            .page_size(pdf, 0)
            .map_err(|err| FolioError::Thumbnail(format!("first page unavailable: {err}")))?;
        if !(page_w > 0.0 && page_h > 0.0) {
            return Err(FolioError::Thumbnail(format!(
                "first page has no area ({page_w}x{page_h})"
            )));
        }

        let width = ((height as f64 * page_w as f64 / page_h as f64).round() as u32).max(1);
        let scale = height as f32 / page_h;

        let page = self
            .rasterizer
            .rasterize_page(pdf, 0, scale)
            .map_err(|err| FolioError::Thumbnail(format!("first page did not rasterise: {err}")))?;

        let bytes = ImageProcessor::from_dynamic(page)
            .resize_exact(width, height)
            .to_jpeg_bytes(self.config.quality)
            .map_err(|err| FolioError::Thumbnail(err.to_string()))?;

        debug!(width, height, bytes = bytes.len(), "Thumbnail generated");
        Ok(Thumbnail {
            bytes,
            width,
            height,
        })
    }
}
