//! Signature placements
//!
//! A [`Placement`] maps page indices to rectangles in point space of the page
//! as displayed (top-left origin, Y down, `/Rotate` applied). At most one
//! rectangle per page; inserting again replaces.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::coords::{clamp_offset, clamp_rect, PointRect};
use crate::document::PageGeometry;

/// Gap between a corner anchor and the page edge, in raster pixels
pub const ANCHOR_MARGIN_PX: u32 = 10;

/// Offset used for a page that has no stored placement yet, in raster pixels
pub const DEFAULT_OFFSET_PX: (u32, u32) = (50, 50);

/// Signature rectangles keyed by page index
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Placement {
    rects: BTreeMap<usize, PointRect>,
}

impl Placement {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `rect` for `page`, clamped into the page bounds.
    /// Returns the rectangle actually stored.
    pub fn insert(&mut self, page: &PageGeometry, rect: PointRect) -> PointRect {
        let (page_w, page_h) = page.displayed_size();
        let clamped = clamp_rect(&rect, page_w, page_h);
        if clamped != rect {
            warn!(
                page = page.index,
                requested = ?rect,
                stored = ?clamped,
                "Placement clamped to page bounds"
            );
        }
        self.rects.insert(page.index, clamped);
        clamped
    }

    pub fn remove(&mut self, page_index: usize) -> Option<PointRect> {
        self.rects.remove(&page_index)
    }

    pub fn get(&self, page_index: usize) -> Option<&PointRect> {
        self.rects.get(&page_index)
    }

    pub fn contains(&self, page_index: usize) -> bool {
        self.rects.contains_key(&page_index)
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn len(&self) -> usize {
        self.rects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    /// Placements in ascending page order
    pub fn iter(&self) -> impl Iterator<Item = (usize, &PointRect)> {
        self.rects.iter().map(|(page, rect)| (*page, rect))
    }

    /// Placed page indices in ascending order
    pub fn pages(&self) -> Vec<usize> {
        self.rects.keys().copied().collect()
    }
}

/// Quick-position corners
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Anchor {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
}

impl Anchor {
    /// Raster offset of an `overlay_w` x `overlay_h` signature at this corner,
    /// [`ANCHOR_MARGIN_PX`] from the edges and clamped into the raster
    pub fn offset_px(
        &self,
        overlay_w: u32,
        overlay_h: u32,
        raster_w: u32,
        raster_h: u32,
    ) -> (u32, u32) {
        let margin = ANCHOR_MARGIN_PX as i64;
        let far_x = raster_w as i64 - overlay_w as i64 - margin;
        let far_y = raster_h as i64 - overlay_h as i64 - margin;
        let (x, y) = match self {
            Anchor::TopLeft => (margin, margin),
            Anchor::TopRight => (far_x, margin),
            Anchor::BottomLeft => (margin, far_y),
            Anchor::BottomRight => (far_x, far_y),
        };
        clamp_offset(x, y, overlay_w, overlay_h, raster_w, raster_h)
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "top-left" => Some(Anchor::TopLeft),
            "top-right" => Some(Anchor::TopRight),
            "bottom-left" => Some(Anchor::BottomLeft),
            "bottom-right" => Some(Anchor::BottomRight),
            _ => None,
        }
    }
}
