// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Full-fidelity rasteriser backed by the pdfium library via `pdfium-render`.
// Draws text and vector content as well as images. Needs the pdfium shared
// library at runtime; binding happens per call.

use std::path::PathBuf;

use folio_core::error::{FolioError, Result};
use image::DynamicImage;
use pdfium_render::prelude::*;
use tracing::{debug, instrument};

use crate::pdf::raster::{PdfRasterizer, check_scale, page_px};

/// Rasteriser that drives pdfium.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRasterizer {
    /// Directory holding the pdfium library. `None` searches the system.
    library_dir: Option<PathBuf>,
}

impl PdfiumRasterizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_library_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            library_dir: Some(dir.into()),
        }
    }

    fn bind(&self) -> Result<Pdfium> {
        let bindings = match &self.library_dir {
            Some(dir) => {
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir))
            }
            None => Pdfium::bind_to_system_library(),
        }
        .map_err(|err| FolioError::Pdf(format!("pdfium library unavailable: {err:?}")))?;
        Ok(Pdfium::new(bindings))
    }
}

fn load_err(err: PdfiumError) -> FolioError {
    FolioError::Pdf(format!("pdfium could not load document: {err:?}"))
}

impl PdfRasterizer for PdfiumRasterizer {
    fn page_count(&self, pdf: &[u8]) -> Result<usize> {
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(load_err)?;
        Ok(document.pages().len() as usize)
    }

    fn page_size(&self, pdf: &[u8], index: usize) -> Result<(f32, f32)> {
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(load_err)?;
        let page = document.pages().get(index as u16).map_err(|err| FolioError::Rasterize {
            page: index + 1,
            detail: format!("{err:?}"),
        })?;
        Ok((page.width().value, page.height().value))
    }

    #[instrument(skip(self, pdf), fields(bytes_len = pdf.len()))]
    fn rasterize_page(&self, pdf: &[u8], index: usize, scale: f32) -> Result<DynamicImage> {
        check_scale(scale)?;
        let pdfium = self.bind()?;
        let document = pdfium.load_pdf_from_byte_slice(pdf, None).map_err(load_err)?;
        let page_err = |err: PdfiumError| FolioError::Rasterize {
            page: index + 1,
            detail: format!("{err:?}"),
        };

        let page = document.pages().get(index as u16).map_err(page_err)?;
        let (width, height) = page_px(index, page.width().value, page.height().value, scale)?;
        let config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_target_height(height as i32);
        let bitmap = page.render_with_config(&config).map_err(page_err)?;

        let image = bitmap.as_image();
        debug!(
            page = index + 1,
            width = image.width(),
            height = image.height(),
            "Page rendered by pdfium"
        );
        Ok(image)
    }
}
