// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF renderer — turn an ordered sequence of captured page images into one
// multi-page PDF using `printpdf` 0.8.
//
// printpdf 0.8 uses a data-oriented API: documents are built by constructing
// `PdfPage` structs containing `Vec<Op>` operation lists, then serialised via
// `PdfDocument::save()`.

use folio_core::error::{FolioError, Result};
use printpdf::{
    Mm, Op, PdfDocument, PdfPage, PdfSaveOptions, PdfWarnMsg, Pt, RawImage, RawImageData,
    RawImageFormat, XObjectTransform,
};
use tracing::{debug, info, instrument};

use crate::page::PageImage;

/// One image pixel maps to one PDF point on the page it is drawn on.
const PAGE_DPI: f32 = 72.0;

/// Pixels (at [`PAGE_DPI`]) to millimetres.
fn px_to_mm(px: u32) -> Mm {
    Mm(px as f32 * 25.4 / PAGE_DPI)
}

/// Builds PDFs where every page is exactly the size of its source image.
///
/// No margins, scaling, or centring: a 612x792 image yields a 612x792pt page
/// with the image covering it edge to edge.
#[derive(Debug, Clone, Default)]
pub struct PdfRenderer {
    /// Title metadata embedded in the PDF /Info dictionary.
    title: Option<String>,
}

impl PdfRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use `title` as the PDF's document title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Render `pages` in order, one PDF page per image.
    ///
    /// Fails with [`FolioError::Render`] when there are no pages or a page
    /// has zero width or height.
    #[instrument(skip_all, fields(pages = pages.len()))]
    pub fn render(&self, pages: &[PageImage]) -> Result<Vec<u8>> {
        if pages.is_empty() {
            return Err(FolioError::Render("no pages to render".into()));
        }

        let title = self.title.as_deref().unwrap_or("Folio Document");
        info!(title, "Rendering scan to PDF");

        let mut doc = PdfDocument::new(title);
        let mut pdf_pages: Vec<PdfPage> = Vec::with_capacity(pages.len());

        for (index, page) in pages.iter().enumerate() {
            let (width, height) = (page.width(), page.height());
            if width == 0 || height == 0 {
                return Err(FolioError::Render(format!(
                    "page {} has no pixels ({width}x{height})",
                    index + 1
                )));
            }

            let rgb = page.as_dynamic().to_rgb8();
            let raw = RawImage {
                pixels: RawImageData::U8(rgb.into_raw()),
                width: width as usize,
                height: height as usize,
                data_format: RawImageFormat::RGB8,
                tag: Vec::new(),
            };
            let xobject_id = doc.add_image(&raw);

            let ops = vec![Op::UseXobject {
                id: xobject_id,
                transform: XObjectTransform {
                    translate_x: Some(Pt(0.0)),
                    translate_y: Some(Pt(0.0)),
                    scale_x: Some(1.0),
                    scale_y: Some(1.0),
                    dpi: Some(PAGE_DPI),
                    rotate: None,
                },
            }];

            pdf_pages.push(PdfPage::new(px_to_mm(width), px_to_mm(height), ops));
            debug!(page = index + 1, width, height, "Page placed");
        }

        doc.with_pages(pdf_pages);

        let mut warnings: Vec<PdfWarnMsg> = Vec::new();
        let output = doc.save(&PdfSaveOptions::default(), &mut warnings);
        debug!(
            bytes = output.len(),
            warnings = warnings.len(),
            "PDF serialised"
        );

        Ok(output)
    }
}
