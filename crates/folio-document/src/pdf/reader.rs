// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// PDF reader — open existing PDF documents with the `lopdf` crate and inspect
// their pages: count, geometry, and the image XObjects each page paints.

use folio_core::error::{FolioError, Result};
use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, instrument, warn};

/// US Letter, used when a page tree carries no /MediaBox at all.
const DEFAULT_MEDIA_BOX: [f32; 4] = [0.0, 0.0, 612.0, 792.0];

/// Page size and orientation in PDF points.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageGeometry {
    /// `[llx, lly, urx, ury]` as declared (or inherited) by the page.
    pub media_box: [f32; 4],
    /// Clockwise display rotation, normalised to 0, 90, 180, or 270.
    pub rotation: u32,
}

impl PageGeometry {
    /// Unrotated width of the media box.
    pub fn width(&self) -> f32 {
        (self.media_box[2] - self.media_box[0]).abs()
    }

    /// Unrotated height of the media box.
    pub fn height(&self) -> f32 {
        (self.media_box[3] - self.media_box[1]).abs()
    }

    /// Size as a viewer shows it, with width and height swapped for
    /// quarter-turn rotations.
    pub fn display_size(&self) -> (f32, f32) {
        if self.rotation % 180 == 90 {
            (self.height(), self.width())
        } else {
            (self.width(), self.height())
        }
    }
}

/// An image XObject painted by a page's content stream.
#[derive(Debug)]
pub struct PlacedImage<'a> {
    /// XObject resource name, for diagnostics.
    pub name: String,
    /// Bounding box of the image in user space: `[x, y, width, height]`.
    pub rect: [f32; 4],
    /// How the sample grid maps onto `rect`.
    pub orientation: ImageOrientation,
    pub stream: &'a Stream,
}

/// Quarter-turn and mirror placement of an image's samples, read from the
/// transformation matrix that paints it.
///
/// Applied to the decoded image in this order: transpose, then horizontal
/// flip, then vertical flip.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImageOrientation {
    /// Sample rows run along the page's x axis.
    pub transpose: bool,
    pub flip_h: bool,
    pub flip_v: bool,
}

impl ImageOrientation {
    pub fn is_upright(&self) -> bool {
        *self == Self::default()
    }
}

/// Reads existing PDF files.
///
/// Wraps `lopdf::Document`. Pages are addressed by zero-based index in page
/// tree order.
pub struct PdfReader {
    /// The underlying lopdf document.
    document: Document,
    /// Page object IDs in page order.
    page_ids: Vec<ObjectId>,
}

impl PdfReader {
    // -- Construction ---------------------------------------------------------

    /// Create a reader from raw PDF bytes already in memory.
    #[instrument(skip_all, fields(bytes_len = data.len()))]
    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        let document = Document::load_mem(data)
            .map_err(|err| FolioError::Pdf(format!("failed to load PDF from memory: {err}")))?;
        Ok(Self::from_document(document))
    }

    fn from_document(document: Document) -> Self {
        // `get_pages` is keyed by 1-based page number, so values come out in order.
        let page_ids: Vec<ObjectId> = document.get_pages().into_values().collect();
        debug!(pages = page_ids.len(), "PDF loaded");
        Self { document, page_ids }
    }

    // -- Inspection -----------------------------------------------------------

    /// Number of pages in the document.
    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    fn page_id(&self, index: usize) -> Result<ObjectId> {
        self.page_ids.get(index).copied().ok_or_else(|| {
            FolioError::Pdf(format!(
                "page {} out of range (document has {} pages)",
                index + 1,
                self.page_ids.len()
            ))
        })
    }

    /// Media box and rotation of the page at `index`, following the page
    /// tree for inherited values.
    pub fn page_geometry(&self, index: usize) -> Result<PageGeometry> {
        let page_id = self.page_id(index)?;

        let media_box = match self.resolve_inherited(page_id, b"MediaBox")? {
            Some(obj) => rect_from_object(&self.document, obj)?,
            None => {
                warn!(page = index + 1, "No /MediaBox in page tree, assuming Letter");
                DEFAULT_MEDIA_BOX
            }
        };

        let rotation = match self.resolve_inherited(page_id, b"Rotate")? {
            Some(obj) => {
                let degrees = object_to_f32(resolve(&self.document, obj))? as i64;
                if degrees % 90 != 0 {
                    warn!(page = index + 1, degrees, "Ignoring non-quarter /Rotate");
                    0
                } else {
                    degrees.rem_euclid(360) as u32
                }
            }
            None => 0,
        };

        Ok(PageGeometry {
            media_box,
            rotation,
        })
    }

    /// Image XObjects painted directly by the page's content stream, in
    /// painting order, with their placement derived from the current
    /// transformation matrix at each `Do`.
    pub fn page_images(&self, index: usize) -> Result<Vec<PlacedImage<'_>>> {
        let page_id = self.page_id(index)?;

        let xobjects = match self.resolve_inherited(page_id, b"Resources")? {
            Some(resources) => match resolve(&self.document, resources).as_dict() {
                Ok(dict) => dict
                    .get(b"XObject")
                    .ok()
                    .and_then(|obj| resolve(&self.document, obj).as_dict().ok()),
                Err(_) => None,
            },
            None => None,
        };
        let Some(xobjects) = xobjects else {
            return Ok(Vec::new());
        };

        let content_bytes = self.document.get_page_content(page_id).map_err(|err| {
            FolioError::Pdf(format!("page {} content unreadable: {err}", index + 1))
        })?;
        let content = Content::decode(&content_bytes).map_err(|err| {
            FolioError::Pdf(format!("page {} content malformed: {err}", index + 1))
        })?;

        let mut placed = Vec::new();
        let mut ctm = Matrix::IDENTITY;
        let mut saved: Vec<Matrix> = Vec::new();

        for operation in &content.operations {
            match operation.operator.as_str() {
                "q" => saved.push(ctm),
                "Q" => ctm = saved.pop().unwrap_or(Matrix::IDENTITY),
                "cm" => match Matrix::from_operands(&operation.operands) {
                    Some(m) => ctm = m.then(&ctm),
                    None => warn!(page = index + 1, "Skipping malformed cm operator"),
                },
                "Do" => {
                    let Some(Object::Name(name)) = operation.operands.first() else {
                        continue;
                    };
                    let Ok(target) = xobjects.get(name) else {
                        let name = String::from_utf8_lossy(name);
                        warn!(page = index + 1, %name, "Unknown XObject");
                        continue;
                    };
                    let Object::Stream(stream) = resolve(&self.document, target) else {
                        continue;
                    };
                    if !is_image_subtype(&stream.dict) {
                        continue;
                    }
                    let name = String::from_utf8_lossy(name).into_owned();
                    match ctm.orientation() {
                        Some(orientation) => placed.push(PlacedImage {
                            name,
                            rect: ctm.unit_square_bounds(),
                            orientation,
                            stream,
                        }),
                        None => warn!(page = index + 1, %name, "Skipping skewed image"),
                    }
                }
                _ => {}
            }
        }

        debug!(page = index + 1, images = placed.len(), "Page images located");
        Ok(placed)
    }

    // -- Helpers --------------------------------------------------------------

    /// Look up a key in the page dictionary, walking up the page tree via
    /// /Parent when the page does not carry it.
    fn resolve_inherited(&self, page_id: ObjectId, key: &[u8]) -> Result<Option<&Object>> {
        let mut current_id = page_id;
        // Bounded walk guards against /Parent cycles in damaged files.
        for _ in 0..64 {
            let dict = self
                .document
                .get_object(current_id)
                .and_then(|obj| obj.as_dict())
                .map_err(|err| FolioError::Pdf(format!("bad page tree node: {err}")))?;

            if let Ok(value) = dict.get(key) {
                return Ok(Some(value));
            }
            match dict.get(b"Parent").and_then(|obj| obj.as_reference()) {
                Ok(parent) => current_id = parent,
                Err(_) => return Ok(None),
            }
        }
        Err(FolioError::Pdf("page tree too deep or cyclic".into()))
    }
}

/// Follow an indirect reference; non-references and dangling references come
/// back unchanged.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        other => other,
    }
}

pub(crate) fn object_to_f32(obj: &Object) -> Result<f32> {
    match obj {
        Object::Integer(i) => Ok(*i as f32),
        Object::Real(f) => Ok(*f as f32),
        _ => Err(FolioError::Pdf(format!("expected number, got {obj:?}"))),
    }
}

fn rect_from_object(doc: &Document, obj: &Object) -> Result<[f32; 4]> {
    let array = resolve(doc, obj)
        .as_array()
        .map_err(|err| FolioError::Pdf(format!("/MediaBox is not an array: {err}")))?;
    if array.len() != 4 {
        return Err(FolioError::Pdf(format!(
            "/MediaBox has {} entries, expected 4",
            array.len()
        )));
    }
    let mut rect = [0.0f32; 4];
    for (slot, value) in rect.iter_mut().zip(array) {
        *slot = object_to_f32(resolve(doc, value))?;
    }
    Ok(rect)
}

fn is_image_subtype(dict: &Dictionary) -> bool {
    dict.get(b"Subtype")
        .map(|obj| matches!(obj, Object::Name(n) if n == b"Image"))
        .unwrap_or(false)
}

/// 2D affine transform `[a b c d e f]` in PDF row-vector convention.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Matrix([f32; 6]);

impl Matrix {
    const IDENTITY: Matrix = Matrix([1.0, 0.0, 0.0, 1.0, 0.0, 0.0]);

    fn from_operands(operands: &[Object]) -> Option<Self> {
        if operands.len() != 6 {
            return None;
        }
        let mut m = [0.0f32; 6];
        for (slot, operand) in m.iter_mut().zip(operands) {
            *slot = object_to_f32(operand).ok()?;
        }
        Some(Matrix(m))
    }

    /// `self` applied first, then `outer`.
    fn then(&self, outer: &Matrix) -> Matrix {
        let [a1, b1, c1, d1, e1, f1] = self.0;
        let [a2, b2, c2, d2, e2, f2] = outer.0;
        Matrix([
            a1 * a2 + b1 * c2,
            a1 * b2 + b1 * d2,
            c1 * a2 + d1 * c2,
            c1 * b2 + d1 * d2,
            e1 * a2 + f1 * c2 + e2,
            e1 * b2 + f1 * d2 + f2,
        ])
    }

    fn apply(&self, x: f32, y: f32) -> (f32, f32) {
        let [a, b, c, d, e, f] = self.0;
        (a * x + c * y + e, b * x + d * y + f)
    }

    /// Axis-aligned bounds of the unit square under this transform.
    fn unit_square_bounds(&self) -> [f32; 4] {
        let corners = [
            self.apply(0.0, 0.0),
            self.apply(1.0, 0.0),
            self.apply(0.0, 1.0),
            self.apply(1.0, 1.0),
        ];
        let min_x = corners.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
        let max_x = corners.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
        let min_y = corners.iter().map(|p| p.1).fold(f32::INFINITY, f32::min);
        let max_y = corners.iter().map(|p| p.1).fold(f32::NEG_INFINITY, f32::max);
        [min_x, min_y, max_x - min_x, max_y - min_y]
    }

    /// Orientation of the unit square under this transform, or `None` when
    /// the transform skews or rotates by other than a quarter turn.
    fn orientation(&self) -> Option<ImageOrientation> {
        let [a, b, c, d, _, _] = self.0;
        let magnitude = a.abs().max(b.abs()).max(c.abs()).max(d.abs());
        if magnitude == 0.0 || !magnitude.is_finite() {
            return None;
        }
        let zero = |v: f32| v.abs() <= magnitude * 1e-3;

        if zero(b) && zero(c) && !zero(a) && !zero(d) {
            // Sample row 0 sits at the top of the unit square (v = 1).
            Some(ImageOrientation {
                transpose: false,
                flip_h: a < 0.0,
                flip_v: d < 0.0,
            })
        } else if zero(a) && zero(d) && !zero(b) && !zero(c) {
            Some(ImageOrientation {
                transpose: true,
                flip_h: c > 0.0,
                flip_v: b > 0.0,
            })
        } else {
            None
        }
    }
}
