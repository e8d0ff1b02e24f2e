//! Write signatures into the source PDF
//!
//! The signature becomes one image XObject shared by every stamped page. Each
//! stamped page gets its content wrapped as `q <original> Q` followed by a new
//! stream that draws the image, so existing content streams are reused
//! unchanged and their graphics state cannot leak into the stamp.

use std::collections::BTreeMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::Compression;
use image::RgbaImage;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, info, warn};

use crate::coords::{image_matrix, matrix_bounds, PointRect};
use crate::document::{inherited_attribute, page_geometry, resolve};
use crate::error::{DocumentError, ImageError, Result};
use crate::placement::Placement;

/// Base resource name of the signature image
const XOBJECT_NAME: &str = "SigStamp";

/// Stamp the signature in `signature_png` onto every page in `placement`.
///
/// Works on a private parse of `pdf_bytes`. Identical inputs give identical
/// output bytes. An empty placement returns the input unchanged.
pub fn stamp_pdf(pdf_bytes: &[u8], placement: &Placement, signature_png: &[u8]) -> Result<Vec<u8>> {
    if placement.is_empty() {
        return Ok(pdf_bytes.to_vec());
    }

    let signature = image::load_from_memory(signature_png)
        .map_err(|e| ImageError::DecodeError(e.to_string()))?
        .to_rgba8();

    let mut doc =
        Document::load_mem(pdf_bytes).map_err(|e| DocumentError::ParseError(e.to_string()))?;
    let pages: BTreeMap<u32, ObjectId> = doc.get_pages();

    // Resolve every target before touching the document
    let mut targets = Vec::with_capacity(placement.len());
    for (index, rect) in placement.iter() {
        let page_id = u32::try_from(index + 1)
            .ok()
            .and_then(|number| pages.get(&number))
            .copied()
            .ok_or(DocumentError::PageOutOfRange {
                page: index,
                page_count: pages.len(),
            })?;
        targets.push((index, page_id, *rect));
    }

    let image_id = add_signature_xobject(&mut doc, &signature)?;

    for (index, page_id, rect) in targets {
        stamp_page(&mut doc, index, page_id, &rect, image_id)?;
    }

    let mut output = Vec::new();
    doc.save_to(&mut output)
        .map_err(|e| DocumentError::OperationError(e.to_string()))?;

    info!(
        pages = ?placement.pages(),
        input_bytes = pdf_bytes.len(),
        output_bytes = output.len(),
        "Stamped signature into PDF"
    );
    Ok(output)
}

/// Add the signature as a Flate-compressed RGB image, with a DeviceGray soft
/// mask when any pixel is not fully opaque
fn add_signature_xobject(doc: &mut Document, signature: &RgbaImage) -> Result<ObjectId> {
    let (width, height) = signature.dimensions();
    let mut rgb = Vec::with_capacity((width * height * 3) as usize);
    let mut alpha = Vec::with_capacity((width * height) as usize);
    for pixel in signature.pixels() {
        rgb.extend_from_slice(&pixel.0[..3]);
        alpha.push(pixel.0[3]);
    }

    let mut image_dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => width as i64,
        "Height" => height as i64,
        "ColorSpace" => "DeviceRGB",
        "BitsPerComponent" => 8,
        "Filter" => "FlateDecode",
    };

    if alpha.iter().any(|&a| a < u8::MAX) {
        let smask = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => width as i64,
                "Height" => height as i64,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            flate_encode(&alpha)?,
        );
        let smask_id = doc.add_object(smask);
        image_dict.set("SMask", Object::Reference(smask_id));
    }

    let image_id = doc.add_object(Stream::new(image_dict, flate_encode(&rgb)?));
    debug!(
        size = format!("{}x{}", width, height),
        object = ?image_id,
        "Added signature image XObject"
    );
    Ok(image_id)
}

fn stamp_page(
    doc: &mut Document,
    index: usize,
    page_id: ObjectId,
    rect: &PointRect,
    image_id: ObjectId,
) -> Result<()> {
    let operation_error = |e: lopdf::Error| DocumentError::OperationError(e.to_string());

    let page_dict = doc.get_dictionary(page_id).map_err(operation_error)?;
    let geometry = page_geometry(doc, page_dict, index)?;
    let mut resources = page_local_resources(doc, page_dict);
    let original_contents = content_references(doc, page_dict);

    let mut xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| obj.as_dict().ok())
        .cloned()
        .unwrap_or_default();
    let name = unique_name(&xobjects);
    xobjects.set(name.clone(), Object::Reference(image_id));
    resources.set("XObject", Object::Dictionary(xobjects));

    let matrix = image_matrix(rect, geometry.media_box, geometry.rotation);
    debug!(
        page = index,
        rect = ?rect,
        rotation = geometry.rotation,
        user_space = ?matrix_bounds(matrix),
        "Stamping page"
    );

    let save = Content {
        operations: vec![Operation::new("q", vec![])],
    };
    let stamp = Content {
        operations: vec![
            Operation::new("Q", vec![]),
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                matrix.iter().map(|&v| Object::Real(v as f32)).collect(),
            ),
            Operation::new("Do", vec![Object::Name(name)]),
            Operation::new("Q", vec![]),
        ],
    };

    let save_id = doc.add_object(Stream::new(
        Dictionary::new(),
        save.encode().map_err(operation_error)?,
    ));
    let stamp_id = doc.add_object(Stream::new(
        Dictionary::new(),
        stamp.encode().map_err(operation_error)?,
    ));

    let mut contents = Vec::with_capacity(original_contents.len() + 2);
    contents.push(Object::Reference(save_id));
    for content in original_contents {
        match content {
            ContentRef::Reference(id) => contents.push(Object::Reference(id)),
            ContentRef::Inline(stream) => {
                contents.push(Object::Reference(doc.add_object(stream)));
            }
        }
    }
    contents.push(Object::Reference(stamp_id));

    let page = doc
        .get_object_mut(page_id)
        .and_then(Object::as_dict_mut)
        .map_err(operation_error)?;
    page.set("Contents", Object::Array(contents));
    page.set("Resources", Object::Dictionary(resources));
    Ok(())
}

/// A page's content stream, either shared by reference or stored inline
enum ContentRef {
    Reference(ObjectId),
    Inline(Stream),
}

/// The page's content streams in drawing order. `/Contents` may be a stream,
/// an array of streams, or a reference to either; an indirect array is
/// flattened so the new array only ever holds stream references.
fn content_references(doc: &Document, page_dict: &Dictionary) -> Vec<ContentRef> {
    let to_ref = |obj: &Object| match obj {
        Object::Reference(id) => match doc.get_object(*id) {
            Ok(Object::Stream(_)) => Some(ContentRef::Reference(*id)),
            _ => {
                warn!(object = ?id, "Skipping content entry that is not a stream");
                None
            }
        },
        Object::Stream(stream) => Some(ContentRef::Inline(stream.clone())),
        _ => None,
    };
    match page_dict.get(b"Contents").map(|obj| (obj, resolve(doc, obj))) {
        Ok((_, Object::Array(items))) => items.iter().filter_map(to_ref).collect(),
        Ok((obj, _)) => to_ref(obj).into_iter().collect(),
        Err(_) => Vec::new(),
    }
}

/// The page's effective resources (own or inherited) as an inline copy, with
/// the XObject sub-dictionary dereferenced so it can be extended safely
fn page_local_resources(doc: &Document, page_dict: &Dictionary) -> Dictionary {
    let mut resources = inherited_attribute(doc, page_dict, b"Resources")
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned()
        .unwrap_or_default();

    let xobjects = resources
        .get(b"XObject")
        .ok()
        .and_then(|obj| resolve(doc, obj).as_dict().ok())
        .cloned();
    if let Some(xobjects) = xobjects {
        resources.set("XObject", Object::Dictionary(xobjects));
    }
    resources
}

fn unique_name(xobjects: &Dictionary) -> Vec<u8> {
    let mut name = XOBJECT_NAME.as_bytes().to_vec();
    let mut suffix = 1;
    while xobjects.has(&name) {
        name = format!("{}{}", XOBJECT_NAME, suffix).into_bytes();
        suffix += 1;
    }
    name
}

fn flate_encode(data: &[u8]) -> Result<Vec<u8>> {
    let encode_error = |e: std::io::Error| ImageError::EncodeError(format!("Flate encode error: {}", e));
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data).map_err(encode_error)?;
    Ok(encoder.finish().map_err(encode_error)?)
}
