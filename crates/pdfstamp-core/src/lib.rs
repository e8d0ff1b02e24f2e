//! Signature stamping for PDF documents
//!
//! This crate renders PDF pages to bitmaps, turns an uploaded signature image
//! into a transparent overlay, previews it on the page and writes it into the
//! PDF as an image XObject, leaving the rest of the document untouched.
//!
//! Pipeline:
//! - [`raster`]: page → bitmap at a DPI or zoom
//! - [`background`]: signature upload → RGBA asset with the paper removed
//! - [`composite`]: asset over page bitmap for previews
//! - [`coords`]: display ↔ raster ↔ point space
//! - [`reassemble`]: asset + placements → new PDF bytes
//!
//! [`session::SessionState`] ties these together for one editing session.

pub mod background;
pub mod cache;
pub mod composite;
pub mod config;
pub mod coords;
pub mod document;
pub mod error;
pub mod export;
pub mod placement;
pub mod raster;
pub mod reassemble;
pub mod session;

#[cfg(test)]
mod fixtures;

pub use background::{strip_background, SignatureAsset};
pub use cache::{RasterCache, RasterKey};
pub use composite::composite;
pub use config::{RenderSettings, SignatureSize, SizeUnit, StampConfig, TransparencySettings};
pub use coords::PointRect;
pub use document::{Document, DocumentInfo, PageGeometry};
pub use error::{ConfigError, DocumentError, ImageError, PlacementError, Result, StampError};
pub use placement::{Anchor, Placement};
pub use raster::{rasterize, BlankPageRenderer, PageRaster, PageRenderer, Resolution};
pub use reassemble::stamp_pdf;
pub use session::SessionState;

#[cfg(feature = "pdfium")]
pub use raster::PdfiumRenderer;

/// Parse PDF bytes and return page count
pub fn get_page_count(bytes: &[u8]) -> Result<usize> {
    Ok(Document::from_bytes(bytes)?.page_count())
}
