//! Fixtures for the pipeline integration tests

use std::sync::Once;

use image::{Rgba, RgbaImage};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, Stream};

static TRACING: Once = Once::new();

/// Install a test subscriber once; filter with `RUST_LOG=pdfstamp_core=debug`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// A US Letter PDF where every page has its own resources and content that
/// leaves the CTM scaled when it ends
pub fn letter_pdf(num_pages: usize) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
    });

    let mut kids = Vec::new();
    for i in 0..num_pages {
        let content = Content {
            operations: vec![
                Operation::new(
                    "cm",
                    vec![2.into(), 0.into(), 0.into(), 2.into(), 0.into(), 0.into()],
                ),
                Operation::new("BT", vec![]),
                Operation::new("Tf", vec!["F1".into(), 10.into()]),
                Operation::new("Td", vec![36.into(), 300.into()]),
                Operation::new(
                    "Tj",
                    vec![Object::string_literal(format!("Contract page {}", i + 1))],
                ),
                Operation::new("ET", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(
            Dictionary::new(),
            content.encode().expect("encode content"),
        ));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font_id },
            },
        });
        kids.push(Object::Reference(page_id));
    }

    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Count" => kids.len() as i64,
            "Kids" => kids,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes).expect("save fixture");
    bytes
}

/// A scanned-looking signature: a dark diagonal stroke on off-white paper
pub fn signature_png(width: u32, height: u32) -> Vec<u8> {
    let image = RgbaImage::from_fn(width, height, |x, y| {
        let on_stroke = (x * height).abs_diff(y * width) < width.max(height) * 2;
        if on_stroke {
            Rgba([15, 25, 90, 255])
        } else {
            Rgba([246, 244, 241, 255])
        }
    });
    let mut bytes = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut bytes), image::ImageFormat::Png)
        .expect("encode png");
    bytes
}

/// Raw bytes of every content stream referenced by page `index` (0-based)
pub fn page_content_streams(pdf: &[u8], index: usize) -> Vec<Vec<u8>> {
    let doc = Document::load_mem(pdf).expect("parse pdf");
    let page_id = doc.get_pages()[&(index as u32 + 1)];
    doc.get_page_contents(page_id)
        .into_iter()
        .map(|id| {
            doc.get_object(id)
                .and_then(Object::as_stream)
                .expect("content stream")
                .content
                .clone()
        })
        .collect()
}
