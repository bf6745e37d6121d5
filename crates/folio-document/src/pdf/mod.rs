// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF module — rendering scans to PDF, reading PDFs, and rasterising pages.

#[cfg(feature = "pdfium")]
pub mod pdfium;
pub mod raster;
pub mod reader;
pub mod writer;

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRasterizer;
pub use raster::{ImagePageRasterizer, PdfRasterizer, RasterPage};
pub use reader::{ImageOrientation, PageGeometry, PdfReader};
pub use writer::PdfRenderer;
