//! Source document loading and page geometry
//!
//! A [`Document`] is the uploaded PDF held as an immutable byte buffer plus
//! everything the pipeline needs to know about it up front: page count,
//! per-page size in points and a content hash used as the document identity.

use std::sync::Arc;

use lopdf::{Dictionary, Object};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::info;

use crate::error::{DocumentError, Result};

/// US Letter, used when neither the page nor its ancestors carry a MediaBox
const DEFAULT_MEDIA_BOX: [f64; 4] = [0.0, 0.0, 612.0, 792.0];

/// Upper bound on `/Parent` hops when resolving inherited attributes
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Geometry of a single page, in PDF points (1 point = 1/72 inch)
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PageGeometry {
    /// Page index (0-indexed)
    pub index: usize,
    /// Normalized MediaBox `[x0, y0, x1, y1]` with x0 <= x1 and y0 <= y1
    pub media_box: [f64; 4],
    /// Page width in points
    pub width_pt: f64,
    /// Page height in points
    pub height_pt: f64,
    /// Page rotation in degrees (0, 90, 180, 270)
    pub rotation: i32,
}

impl PageGeometry {
    /// Width and height as a viewer shows the page, with `/Rotate` applied
    pub fn displayed_size(&self) -> (f64, f64) {
        if self.rotation % 180 == 90 {
            (self.height_pt, self.width_pt)
        } else {
            (self.width_pt, self.height_pt)
        }
    }
}

/// Document summary handed to the UI layer
#[derive(Debug, Clone, Serialize)]
pub struct DocumentInfo {
    pub page_count: usize,
    /// PDF version string (e.g., "1.7")
    pub version: String,
    pub size_bytes: usize,
    /// Hex SHA-256 of the source bytes
    pub content_hash: String,
    pub pages: Vec<PageGeometry>,
}

/// An uploaded PDF. Read-only once created.
#[derive(Debug, Clone)]
pub struct Document {
    bytes: Arc<[u8]>,
    content_hash: String,
    version: String,
    pages: Vec<PageGeometry>,
}

impl Document {
    /// Validate and parse PDF bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        quick_validate(bytes)?;

        let parsed = lopdf::Document::load_mem(bytes)
            .map_err(|e| DocumentError::ParseError(e.to_string()))?;

        let page_ids = parsed.get_pages();
        if page_ids.is_empty() {
            return Err(DocumentError::NoPages.into());
        }

        let mut pages = Vec::with_capacity(page_ids.len());
        for (index, page_id) in page_ids.values().enumerate() {
            let page_dict = parsed
                .get_dictionary(*page_id)
                .map_err(|e| DocumentError::ParseError(format!("page {}: {}", index, e)))?;
            pages.push(page_geometry(&parsed, page_dict, index)?);
        }

        let content_hash = content_hash(bytes);
        info!(
            page_count = pages.len(),
            version = %parsed.version,
            hash = %&content_hash[..12],
            "Loaded PDF document"
        );

        Ok(Self {
            bytes: Arc::from(bytes),
            content_hash,
            version: parsed.version.clone(),
            pages,
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn content_hash(&self) -> &str {
        &self.content_hash
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PageGeometry] {
        &self.pages
    }

    /// Geometry of page `index`, or `PageOutOfRange`
    pub fn page(&self, index: usize) -> Result<&PageGeometry, DocumentError> {
        self.pages
            .get(index)
            .ok_or(DocumentError::PageOutOfRange {
                page: index,
                page_count: self.pages.len(),
            })
    }

    pub fn info(&self) -> DocumentInfo {
        DocumentInfo {
            page_count: self.pages.len(),
            version: self.version.clone(),
            size_bytes: self.bytes.len(),
            content_hash: self.content_hash.clone(),
            pages: self.pages.clone(),
        }
    }
}

/// Hex SHA-256 of a byte slice
pub fn content_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Cheap structural checks before handing bytes to the parser
pub fn quick_validate(bytes: &[u8]) -> Result<(), DocumentError> {
    if bytes.len() < 8 {
        return Err(DocumentError::NotPdf("file too small"));
    }

    if !bytes.starts_with(b"%PDF-") {
        return Err(DocumentError::NotPdf("missing %PDF- header"));
    }

    let tail = if bytes.len() > 1024 {
        &bytes[bytes.len() - 1024..]
    } else {
        bytes
    };

    if !tail.windows(5).any(|w| w == b"%%EOF") {
        return Err(DocumentError::NotPdf("missing %%EOF marker"));
    }

    Ok(())
}

pub(crate) fn page_geometry(
    doc: &lopdf::Document,
    page_dict: &Dictionary,
    index: usize,
) -> Result<PageGeometry, DocumentError> {
    let media_box = match inherited_attribute(doc, page_dict, b"MediaBox") {
        Some(obj) => {
            let array = resolve(doc, obj)
                .as_array()
                .map_err(|_| DocumentError::ParseError(format!("page {}: MediaBox is not an array", index)))?;
            parse_box_array(doc, array)?
        }
        None => DEFAULT_MEDIA_BOX,
    };

    let rotation = inherited_attribute(doc, page_dict, b"Rotate")
        .and_then(|obj| resolve(doc, obj).as_i64().ok())
        .map(|angle| normalize_rotation(angle as i32))
        .unwrap_or(0);

    Ok(PageGeometry {
        index,
        media_box,
        width_pt: media_box[2] - media_box[0],
        height_pt: media_box[3] - media_box[1],
        rotation,
    })
}

/// Look up a page attribute, walking up `/Parent` for inheritable keys
pub(crate) fn inherited_attribute<'a>(
    doc: &'a lopdf::Document,
    page_dict: &'a Dictionary,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = page_dict;
    for _ in 0..MAX_INHERITANCE_DEPTH {
        if let Ok(value) = current.get(key) {
            return Some(value);
        }
        let parent_id = current.get(b"Parent").ok()?.as_reference().ok()?;
        current = doc.get_dictionary(parent_id).ok()?;
    }
    None
}

/// Follow a single indirect reference, returning the object itself otherwise
pub(crate) fn resolve<'a>(doc: &'a lopdf::Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Parse a box array [x1, y1, x2, y2] into normalized corner order
fn parse_box_array(doc: &lopdf::Document, array: &[Object]) -> Result<[f64; 4], DocumentError> {
    if array.len() != 4 {
        return Err(DocumentError::ParseError(
            "MediaBox must have 4 elements".to_string(),
        ));
    }

    let mut values = [0.0; 4];
    for (i, obj) in array.iter().enumerate() {
        values[i] = match resolve(doc, obj) {
            Object::Integer(n) => *n as f64,
            Object::Real(n) => *n as f64,
            _ => {
                return Err(DocumentError::ParseError(format!(
                    "MediaBox element {} is not a number",
                    i
                )))
            }
        };
    }

    let [a, b, c, d] = values;
    Ok([a.min(c), b.min(d), a.max(c), b.max(d)])
}

/// Normalize rotation to 0, 90, 180, or 270. Angles that are not a multiple
/// of 90 are invalid and round down to one.
fn normalize_rotation(angle: i32) -> i32 {
    angle.rem_euclid(360) / 90 * 90
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{create_rotated_test_pdf, create_test_pdf, create_test_pdf_with_sizes};

    #[test]
    fn test_normalize_rotation() {
        assert_eq!(normalize_rotation(0), 0);
        assert_eq!(normalize_rotation(90), 90);
        assert_eq!(normalize_rotation(360), 0);
        assert_eq!(normalize_rotation(450), 90);
        assert_eq!(normalize_rotation(-90), 270);
        assert_eq!(normalize_rotation(45), 0);
    }

    #[test]
    fn test_parse_box_array_normalizes_corners() {
        let doc = lopdf::Document::with_version("1.7");
        let array = vec![
            Object::Integer(612),
            Object::Integer(792),
            Object::Real(0.0),
            Object::Integer(0),
        ];
        let result = parse_box_array(&doc, &array).unwrap();
        assert_eq!(result, [0.0, 0.0, 612.0, 792.0]);
    }

    #[test]
    fn test_from_bytes_reads_page_sizes() {
        let pdf = create_test_pdf_with_sizes(&[(612.0, 792.0), (842.0, 595.0)]);
        let doc = Document::from_bytes(&pdf).unwrap();

        assert_eq!(doc.page_count(), 2);
        assert_eq!(doc.version(), "1.7");
        let landscape = doc.page(1).unwrap();
        assert_eq!(landscape.width_pt, 842.0);
        assert_eq!(landscape.height_pt, 595.0);
        assert_eq!(landscape.index, 1);
    }

    #[test]
    fn test_page_out_of_range() {
        let doc = Document::from_bytes(&create_test_pdf(3)).unwrap();
        assert_eq!(
            doc.page(3).unwrap_err(),
            DocumentError::PageOutOfRange {
                page: 3,
                page_count: 3
            }
        );
    }

    #[test]
    fn test_rejects_non_pdf() {
        let err = Document::from_bytes(b"definitely not a pdf").unwrap_err();
        assert!(matches!(
            err,
            crate::StampError::Document(DocumentError::NotPdf(_))
        ));
    }

    #[test]
    fn test_rejects_truncated_pdf() {
        let pdf = create_test_pdf(1);
        let truncated = &pdf[..pdf.len() / 2];
        assert!(Document::from_bytes(truncated).is_err());
    }

    #[test]
    fn test_same_bytes_same_hash() {
        let pdf = create_test_pdf(2);
        let a = Document::from_bytes(&pdf).unwrap();
        let b = Document::from_bytes(&pdf.clone()).unwrap();
        assert_eq!(a.content_hash(), b.content_hash());
        assert_eq!(a.content_hash().len(), 64);
    }

    #[test]
    fn test_content_hash_known_value() {
        assert_eq!(
            content_hash(b"hello world"),
            "b94d27b9934d3e08a52e52d7da7dabfac484efe37a5380ee9088f7ace2efcde9"
        );
    }

    #[test]
    fn test_media_box_inherited_from_pages_node() {
        use lopdf::{dictionary, Document as LoDocument};

        let mut doc = LoDocument::with_version("1.5");
        let pages_id = doc.new_object_id();
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
        });
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
                "MediaBox" => vec![0.into(), 0.into(), 300.into(), 400.into()],
                "Rotate" => 90,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);
        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).unwrap();

        let parsed = Document::from_bytes(&bytes).unwrap();
        let page = parsed.page(0).unwrap();
        assert_eq!((page.width_pt, page.height_pt), (300.0, 400.0));
        assert_eq!(page.rotation, 90);
        assert_eq!(page.displayed_size(), (400.0, 300.0));
    }

    #[test]
    fn test_displayed_size_follows_rotation() {
        let cases = [
            (0, (612.0, 792.0)),
            (90, (792.0, 612.0)),
            (180, (612.0, 792.0)),
            (270, (792.0, 612.0)),
        ];
        for (rotation, expected) in cases {
            let doc = Document::from_bytes(&create_rotated_test_pdf(rotation)).unwrap();
            let page = doc.page(0).unwrap();
            assert_eq!(page.rotation, rotation as i32);
            assert_eq!(page.displayed_size(), expected, "rotation {}", rotation);
        }
    }
}
