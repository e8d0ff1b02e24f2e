//! Coordinate transformation between display, raster and PDF point space
//!
//! Every space the pipeline stores uses a top-left origin with Y increasing
//! downward: the on-screen display canvas, the rendered page raster and the
//! point-space rectangles kept in a [`crate::placement::Placement`]. All of
//! them describe the page as displayed, with `/Rotate` applied. The only
//! conversions to PDF user space (bottom-left origin, Y up, offset by the
//! MediaBox origin, unrotated) are [`to_pdf_user_space`] and
//! [`image_matrix`], called by the re-assembler.

use serde::{Deserialize, Serialize};

use crate::error::PlacementError;

/// PDF user space unit: 72 points per inch
pub const POINTS_PER_INCH: f64 = 72.0;

/// Rectangle in PDF points, top-left origin, Y down
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct PointRect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl PointRect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }
}

/// Pixels per point for a render resolution in DPI
pub fn scale_px_per_pt(dpi: f64) -> f64 {
    dpi / POINTS_PER_INCH
}

/// Map a point on the display canvas to the underlying raster.
///
/// X and Y are scaled independently; keeping the display canvas at the
/// raster's aspect ratio is the caller's job.
pub fn display_to_raster(
    display_x: f64,
    display_y: f64,
    display_w: f64,
    display_h: f64,
    raster_w: f64,
    raster_h: f64,
) -> Result<(f64, f64), PlacementError> {
    if !(display_w > 0.0 && display_h > 0.0) || !display_w.is_finite() || !display_h.is_finite() {
        return Err(PlacementError::InvalidDisplaySize {
            width: display_w,
            height: display_h,
        });
    }
    if !display_x.is_finite() || !display_y.is_finite() {
        return Err(PlacementError::NonFiniteCoordinate {
            x: display_x,
            y: display_y,
        });
    }

    Ok((
        display_x * raster_w / display_w,
        display_y * raster_h / display_h,
    ))
}

/// Raster pixels to PDF points
pub fn raster_to_pdf_points(px_raster: f64, scale_px_per_pt: f64) -> f64 {
    px_raster / scale_px_per_pt
}

/// PDF points to raster pixels
pub fn pdf_points_to_raster(pt: f64, scale_px_per_pt: f64) -> f64 {
    pt * scale_px_per_pt
}

/// Convert a raster-space rectangle (pixels) into point space
pub fn raster_rect_to_points(
    x_px: f64,
    y_px: f64,
    width_px: f64,
    height_px: f64,
    scale_px_per_pt: f64,
) -> PointRect {
    PointRect {
        x: raster_to_pdf_points(x_px, scale_px_per_pt),
        y: raster_to_pdf_points(y_px, scale_px_per_pt),
        width: raster_to_pdf_points(width_px, scale_px_per_pt),
        height: raster_to_pdf_points(height_px, scale_px_per_pt),
    }
}

/// Convert a stored point-space rectangle into `(x, y, width, height)` pixels
/// of a raster rendered at `scale_px_per_pt`
pub fn points_rect_to_raster(rect: &PointRect, scale_px_per_pt: f64) -> (f64, f64, f64, f64) {
    (
        pdf_points_to_raster(rect.x, scale_px_per_pt),
        pdf_points_to_raster(rect.y, scale_px_per_pt),
        pdf_points_to_raster(rect.width, scale_px_per_pt),
        pdf_points_to_raster(rect.height, scale_px_per_pt),
    )
}

/// Clamp an integer overlay offset so the overlay stays inside its container.
///
/// An overlay larger than the container along an axis is pinned to 0.
pub fn clamp_offset(
    x: i64,
    y: i64,
    overlay_w: u32,
    overlay_h: u32,
    container_w: u32,
    container_h: u32,
) -> (u32, u32) {
    let max_x = container_w.saturating_sub(overlay_w) as i64;
    let max_y = container_h.saturating_sub(overlay_h) as i64;
    (x.clamp(0, max_x) as u32, y.clamp(0, max_y) as u32)
}

/// Clamp a point-space rectangle into `[0, page_w] x [0, page_h]`.
///
/// The size is clipped to the page first, then the origin is pulled inside.
pub fn clamp_rect(rect: &PointRect, page_w: f64, page_h: f64) -> PointRect {
    let width = rect.width.clamp(0.0, page_w.max(0.0));
    let height = rect.height.clamp(0.0, page_h.max(0.0));
    PointRect {
        x: rect.x.clamp(0.0, (page_w - width).max(0.0)),
        y: rect.y.clamp(0.0, (page_h - height).max(0.0)),
        width,
        height,
    }
}

/// Convert a top-left point-space rectangle into PDF user space corners
/// `[x0, y0, x1, y1]` (bottom-left origin) for a page with `media_box`.
pub fn to_pdf_user_space(rect: &PointRect, media_box: [f64; 4]) -> [f64; 4] {
    let [mb_x, _, _, mb_top] = media_box;
    let x0 = mb_x + rect.x;
    let y1 = mb_top - rect.y;
    [x0, y1 - rect.height, x0 + rect.width, y1]
}

/// `cm` matrix `[a, b, c, d, e, f]` that draws an image (the unit square)
/// upright into `rect`, given in displayed point space of a page with
/// `media_box` and `/Rotate rotation`.
///
/// With no rotation this is the plain Y-flip of [`to_pdf_user_space`]. For a
/// rotated page the rectangle is first carried back through the rotation, and
/// the image is turned against it so it reads upright once the viewer
/// applies `/Rotate`.
pub fn image_matrix(rect: &PointRect, media_box: [f64; 4], rotation: i32) -> [f64; 6] {
    let [mb_x0, mb_y0, mb_x1, mb_y1] = media_box;
    let PointRect {
        x,
        y,
        width: w,
        height: h,
    } = *rect;
    match rotation.rem_euclid(360) {
        90 => [0.0, w, -h, 0.0, mb_x0 + y + h, mb_y0 + x],
        180 => [-w, 0.0, 0.0, -h, mb_x1 - x, mb_y0 + y + h],
        270 => [0.0, -w, h, 0.0, mb_x1 - y - h, mb_y1 - x],
        _ => {
            let [x0, y0, _, _] = to_pdf_user_space(rect, media_box);
            [w, 0.0, 0.0, h, x0, y0]
        }
    }
}

/// User space bounds `[x0, y0, x1, y1]` of the unit square under `matrix`
pub fn matrix_bounds(matrix: [f64; 6]) -> [f64; 4] {
    let [a, b, c, d, e, f] = matrix;
    let corners = [(e, f), (a + e, b + f), (c + e, d + f), (a + c + e, b + d + f)];
    corners.iter().fold(
        [f64::INFINITY, f64::INFINITY, f64::NEG_INFINITY, f64::NEG_INFINITY],
        |[x0, y0, x1, y1], &(x, y)| [x0.min(x), y0.min(y), x1.max(x), y1.max(y)],
    )
}

/// Inverse of [`to_pdf_user_space`]
pub fn from_pdf_user_space(corners: [f64; 4], media_box: [f64; 4]) -> PointRect {
    let [x0, y0, x1, y1] = corners;
    let [mb_x, _, _, mb_top] = media_box;
    PointRect {
        x: x0 - mb_x,
        y: mb_top - y1,
        width: x1 - x0,
        height: y1 - y0,
    }
}
