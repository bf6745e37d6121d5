// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF rasteriser — turn PDF pages into raster images for recognition and
// previews.
//
// `ImagePageRasterizer` is pure Rust on top of `lopdf`: it paints the image
// XObjects each page draws onto a white canvas. That is exactly what scanned
// and camera-captured PDFs contain. Vector text and paths are not drawn; the
// `pdfium` feature provides a full renderer for those documents.

use std::borrow::Cow;

use folio_core::error::{FolioError, Result};
use image::imageops::{self, FilterType};
use image::{DynamicImage, GrayImage, ImageFormat, Rgb, RgbImage};
use lopdf::{Dictionary, Object, Stream};
use tracing::{debug, instrument, warn};

use crate::pdf::reader::{ImageOrientation, PageGeometry, PdfReader};

/// One successfully rasterised page, tagged with its zero-based index in the
/// source document.
#[derive(Debug, Clone)]
pub struct RasterPage {
    pub index: usize,
    pub image: DynamicImage,
}

/// Renders PDF pages to raster images.
///
/// `scale` multiplies each page's size in points; 1.0 yields one pixel per
/// point.
pub trait PdfRasterizer: Send + Sync {
    /// Number of pages in `pdf`. Fails when the bytes cannot be parsed.
    fn page_count(&self, pdf: &[u8]) -> Result<usize>;

    /// Display size of page `index` in points, rotation applied.
    fn page_size(&self, pdf: &[u8], index: usize) -> Result<(f32, f32)>;

    /// Rasterise a single page.
    fn rasterize_page(&self, pdf: &[u8], index: usize, scale: f32) -> Result<DynamicImage>;

    /// Rasterise every page in order.
    ///
    /// A page that fails is logged and left out, so the result may be
    /// shorter than the page count. Only an unparseable document fails the
    /// whole call.
    fn rasterize(&self, pdf: &[u8], scale: f32) -> Result<Vec<RasterPage>> {
        check_scale(scale)?;
        let count = self.page_count(pdf)?;
        let mut pages = Vec::with_capacity(count);
        for index in 0..count {
            match self.rasterize_page(pdf, index, scale) {
                Ok(image) => pages.push(RasterPage { index, image }),
                Err(err) => warn!(page = index + 1, %err, "Skipping page that failed to rasterise"),
            }
        }
        Ok(pages)
    }
}

pub(crate) fn check_scale(scale: f32) -> Result<()> {
    if scale.is_finite() && scale > 0.0 {
        Ok(())
    } else {
        Err(FolioError::Pdf(format!("invalid rasterisation scale {scale}")))
    }
}

/// Largest page bitmap either rasteriser will allocate, in pixels. A Letter
/// page at scale 10 is about 48 million.
pub const MAX_PAGE_PIXELS: u64 = 64 * 1024 * 1024;

/// Output pixel size for a page of `points` at `scale`, never zero.
pub(crate) fn scaled_px(points: f32, scale: f32) -> u32 {
    (points * scale).round().max(1.0) as u32
}

/// Bitmap size for page `index` of `width` by `height` points, refusing
/// pages larger than [`MAX_PAGE_PIXELS`].
pub(crate) fn page_px(index: usize, width: f32, height: f32, scale: f32) -> Result<(u32, u32)> {
    let size = (scaled_px(width, scale), scaled_px(height, scale));
    let pixels = u64::from(size.0) * u64::from(size.1);
    if pixels > MAX_PAGE_PIXELS {
        return Err(FolioError::Rasterize {
            page: index + 1,
            detail: format!("{}x{} pixels exceeds the page limit", size.0, size.1),
        });
    }
    Ok(size)
}

/// Rasteriser for image-only PDFs, built on `lopdf`.
///
/// Supports image XObjects that are JPEG (`/DCTDecode`), Flate-compressed, or
/// uncompressed 8-bit DeviceRGB / DeviceGray samples. Other images on a page
/// are skipped with a warning; the rest of the page still renders.
#[derive(Debug, Clone, Copy, Default)]
pub struct ImagePageRasterizer;

impl ImagePageRasterizer {
    pub fn new() -> Self {
        Self
    }

    fn rasterize_loaded(
        &self,
        reader: &PdfReader,
        index: usize,
        scale: f32,
    ) -> Result<DynamicImage> {
        let geometry = reader.page_geometry(index).map_err(|err| rasterize_err(index, err))?;
        let placed = reader.page_images(index).map_err(|err| rasterize_err(index, err))?;

        let (width, height) = page_px(index, geometry.width(), geometry.height(), scale)?;
        let mut canvas = RgbImage::from_pixel(width, height, Rgb([255, 255, 255]));
        let [llx, _, _, ury] = normalised_box(&geometry);

        for image in placed {
            let [x, y, w, h] = image.rect;
            // PDF y grows upwards; raster rows grow downwards.
            let placement = [
                (f64::from(x) - f64::from(llx)) * f64::from(scale),
                (f64::from(ury) - f64::from(y + h)) * f64::from(scale),
                f64::from(w) * f64::from(scale),
                f64::from(h) * f64::from(scale),
            ];
            let Some(visible) = clip_placement(placement, width, height) else {
                continue;
            };

            let decoded = match decode_image_xobject(image.stream) {
                Ok(decoded) => orient(decoded, image.orientation),
                Err(err) => {
                    warn!(page = index + 1, name = %image.name, %err, "Skipping undecodable image");
                    continue;
                }
            };
            let [sx, sy, sw, sh] = visible.source_crop(decoded.width(), decoded.height());
            let [dx, dy, dw, dh] = visible.target;
            let resized = decoded
                .crop_imm(sx, sy, sw, sh)
                .resize_exact(dw, dh, FilterType::Triangle)
                .to_rgb8();
            imageops::overlay(&mut canvas, &resized, i64::from(dx), i64::from(dy));
        }

        let page = DynamicImage::ImageRgb8(canvas);
        let rotated = match geometry.rotation {
            90 => page.rotate90(),
            180 => page.rotate180(),
            270 => page.rotate270(),
            _ => page,
        };
        debug!(
            page = index + 1,
            width = rotated.width(),
            height = rotated.height(),
            "Page rasterised"
        );
        Ok(rotated)
    }
}

impl PdfRasterizer for ImagePageRasterizer {
    fn page_count(&self, pdf: &[u8]) -> Result<usize> {
        Ok(PdfReader::from_bytes(pdf)?.page_count())
    }

    fn page_size(&self, pdf: &[u8], index: usize) -> Result<(f32, f32)> {
        Ok(PdfReader::from_bytes(pdf)?.page_geometry(index)?.display_size())
    }

    fn rasterize_page(&self, pdf: &[u8], index: usize, scale: f32) -> Result<DynamicImage> {
        check_scale(scale)?;
        let reader = PdfReader::from_bytes(pdf)?;
        self.rasterize_loaded(&reader, index, scale)
    }

    /// Parses the document once for all pages.
    #[instrument(skip_all, fields(bytes_len = pdf.len(), scale))]
    fn rasterize(&self, pdf: &[u8], scale: f32) -> Result<Vec<RasterPage>> {
        check_scale(scale)?;
        let reader = PdfReader::from_bytes(pdf)?;
        let count = reader.page_count();
        let mut pages = Vec::with_capacity(count);
        for index in 0..count {
            match self.rasterize_loaded(&reader, index, scale) {
                Ok(image) => pages.push(RasterPage { index, image }),
                Err(err) => warn!(page = index + 1, %err, "Skipping page that failed to rasterise"),
            }
        }
        debug!(requested = count, rendered = pages.len(), "Rasterisation finished");
        Ok(pages)
    }
}

/// The part of an image placement that lands on the canvas.
#[derive(Debug, Clone, Copy, PartialEq)]
struct VisiblePlacement {
    /// Canvas pixels covered: `[x, y, width, height]`.
    target: [u32; 4],
    /// Covered fraction of the placement along each axis: `[x0, y0, x1, y1]`
    /// in `0.0..=1.0`.
    fraction: [f64; 4],
}

impl VisiblePlacement {
    /// Source pixels behind the visible fraction, at least one in each
    /// direction: `[x, y, width, height]`.
    fn source_crop(&self, width: u32, height: u32) -> [u32; 4] {
        let span = |start: f64, end: f64, size: u32| {
            let size_f = f64::from(size);
            let first = (start * size_f).floor().clamp(0.0, size_f - 1.0) as u32;
            let last = (end * size_f).ceil().clamp(f64::from(first + 1), size_f) as u32;
            (first, last - first)
        };
        let [x0, y0, x1, y1] = self.fraction;
        let (sx, sw) = span(x0, x1, width);
        let (sy, sh) = span(y0, y1, height);
        [sx, sy, sw, sh]
    }
}

/// Intersect a device-space placement `[left, top, width, height]` with a
/// `width` by `height` canvas. `None` when nothing of it would be painted.
fn clip_placement(placement: [f64; 4], width: u32, height: u32) -> Option<VisiblePlacement> {
    let [left, top, w, h] = placement;
    let (x0, x1) = (left.round(), (left + w).round());
    let (y0, y1) = (top.round(), (top + h).round());
    // Negated so NaN edges are rejected too.
    if !(x1 - x0 >= 1.0 && y1 - y0 >= 1.0) {
        return None;
    }

    let (vx0, vx1) = (x0.max(0.0), x1.min(f64::from(width)));
    let (vy0, vy1) = (y0.max(0.0), y1.min(f64::from(height)));
    if vx1 <= vx0 || vy1 <= vy0 {
        return None;
    }

    Some(VisiblePlacement {
        target: [vx0 as u32, vy0 as u32, (vx1 - vx0) as u32, (vy1 - vy0) as u32],
        fraction: [
            (vx0 - x0) / (x1 - x0),
            (vy0 - y0) / (y1 - y0),
            (vx1 - x0) / (x1 - x0),
            (vy1 - y0) / (y1 - y0),
        ],
    })
}

/// Turn decoded samples the way the page places them.
fn orient(image: DynamicImage, orientation: ImageOrientation) -> DynamicImage {
    let mut image = if orientation.transpose {
        image.rotate90().fliph()
    } else {
        image
    };
    if orientation.flip_h {
        image = image.fliph();
    }
    if orientation.flip_v {
        image = image.flipv();
    }
    image
}

fn rasterize_err(index: usize, err: FolioError) -> FolioError {
    FolioError::Rasterize {
        page: index + 1,
        detail: err.to_string(),
    }
}

/// Media box as `[left, bottom, right, top]` regardless of corner order.
fn normalised_box(geometry: &PageGeometry) -> [f32; 4] {
    let [x0, y0, x1, y1] = geometry.media_box;
    [x0.min(x1), y0.min(y1), x0.max(x1), y0.max(y1)]
}

// -- Image XObject decoding ---------------------------------------------------

fn filter_names(dict: &Dictionary) -> Vec<Vec<u8>> {
    match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.clone()],
        Ok(Object::Array(items)) => items
            .iter()
            .filter_map(|item| match item {
                Object::Name(name) => Some(name.clone()),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

fn dict_int(dict: &Dictionary, key: &[u8]) -> Result<i64> {
    dict.get(key).and_then(|obj| obj.as_i64()).map_err(|err| {
        FolioError::Image(format!(
            "image /{} missing or not an integer: {err}",
            String::from_utf8_lossy(key)
        ))
    })
}

/// Decode one image XObject into pixels.
pub(crate) fn decode_image_xobject(stream: &Stream) -> Result<DynamicImage> {
    let dict = &stream.dict;
    let filters = filter_names(dict);

    if filters.len() == 1 && filters[0] == b"DCTDecode" {
        return image::load_from_memory_with_format(&stream.content, ImageFormat::Jpeg)
            .map_err(|err| FolioError::Image(format!("embedded JPEG unreadable: {err}")));
    }

    let samples: Cow<'_, [u8]> = match filters.as_slice() {
        [] => Cow::Borrowed(&stream.content),
        [only] if only == b"FlateDecode" => Cow::Owned(
            stream
                .decompressed_content()
                .map_err(|err| FolioError::Image(format!("image stream did not inflate: {err}")))?,
        ),
        other => {
            let names: Vec<String> = other
                .iter()
                .map(|name| String::from_utf8_lossy(name).into_owned())
                .collect();
            return Err(FolioError::Image(format!(
                "unsupported image filter chain {names:?}"
            )));
        }
    };

    let width = dict_int(dict, b"Width")?;
    let height = dict_int(dict, b"Height")?;
    if width <= 0 || height <= 0 {
        return Err(FolioError::Image(format!("image has no pixels ({width}x{height})")));
    }
    let bpc = dict.get(b"BitsPerComponent").and_then(|obj| obj.as_i64()).unwrap_or(8);
    if bpc != 8 {
        return Err(FolioError::Image(format!("{bpc}-bit samples are not supported")));
    }

    let channels = match dict.get(b"ColorSpace") {
        Ok(Object::Name(name)) if name == b"DeviceGray" => 1usize,
        Ok(Object::Name(name)) if name == b"DeviceRGB" => 3,
        Ok(other) => {
            return Err(FolioError::Image(format!("unsupported colour space {other:?}")));
        }
        Err(_) => 3,
    };

    let (width, height) = (width as u32, height as u32);
    let expected = width as usize * height as usize * channels;
    if samples.len() < expected {
        return Err(FolioError::Image(format!(
            "image data too short: {} bytes, expected {expected}",
            samples.len()
        )));
    }
    let pixels = samples[..expected].to_vec();

    let decoded = if channels == 1 {
        GrayImage::from_raw(width, height, pixels).map(DynamicImage::ImageLuma8)
    } else {
        RgbImage::from_raw(width, height, pixels).map(DynamicImage::ImageRgb8)
    };
    decoded.ok_or_else(|| FolioError::Image("image buffer size mismatch".into()))
}
