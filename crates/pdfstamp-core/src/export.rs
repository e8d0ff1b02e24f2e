//! Raster previews and single-page PNG export

use image::DynamicImage;
use tracing::debug;

use crate::background::{encode_png, SignatureAsset};
use crate::composite::composite;
use crate::coords::{points_rect_to_raster, PointRect};
use crate::error::Result;
use crate::raster::PageRaster;

/// Pixel size and offset of a point-space rectangle on a raster with
/// `scale_px_per_pt`. Sizes are at least 1x1.
pub fn overlay_geometry(rect: &PointRect, scale_px_per_pt: f64) -> ((u32, u32), (i64, i64)) {
    let (x, y, width, height) = points_rect_to_raster(rect, scale_px_per_pt);
    (
        (
            (width.round() as u32).max(1),
            (height.round() as u32).max(1),
        ),
        (x.round() as i64, y.round() as i64),
    )
}

/// The page raster with the signature composited at `rect`, or a copy of the
/// raster when nothing is given
pub fn render_preview(
    raster: &PageRaster,
    signature: Option<(&SignatureAsset, &PointRect)>,
) -> Result<DynamicImage> {
    match signature {
        Some((asset, rect)) => {
            let (size, offset) = overlay_geometry(rect, raster.scale_px_per_pt);
            debug!(
                page = raster.page_index,
                size = format!("{}x{}", size.0, size.1),
                offset = format!("({}, {})", offset.0, offset.1),
                "Compositing preview"
            );
            composite(&raster.image, asset.image(), size, offset)
        }
        None => Ok(raster.image.clone()),
    }
}

/// PNG of one page with its signature (RGB, no alpha)
pub fn page_png(
    raster: &PageRaster,
    signature: Option<(&SignatureAsset, &PointRect)>,
) -> Result<Vec<u8>> {
    let preview = render_preview(raster, signature)?;
    encode_png(&DynamicImage::ImageRgb8(preview.to_rgb8()))
}
