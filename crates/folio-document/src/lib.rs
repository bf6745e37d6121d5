// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// folio-document — Document processing for the Folio ingestion pipeline.
//
// Renders captured page images into PDFs, rasterises PDF pages, makes
// first-page thumbnails, and recognizes text with a pluggable OCR backend.

pub mod image;
pub mod ocr;
pub mod page;
pub mod pdf;
pub mod thumbnail;

// Re-export the primary types so callers can use `folio_document::PdfRenderer` etc.
pub use image::processor::ImageProcessor;
pub use ocr::{OcrBackend, PAGE_BREAK, TextRecognizer, clean_text, join_page_texts};
pub use page::PageImage;
pub use pdf::{ImagePageRasterizer, PdfRasterizer, PdfReader, PdfRenderer, RasterPage};
pub use thumbnail::ThumbnailGenerator;

#[cfg(feature = "ocr")]
pub use ocr::{OcrConfig, OcrsBackend, default_model_dir};
#[cfg(feature = "pdfium")]
pub use pdf::PdfiumRasterizer;
