//! Page rasterization
//!
//! The rasterizer owns the geometry contract (pixel size = points x DPI / 72,
//! rounded, taken from the page as displayed with `/Rotate` applied) and
//! delegates drawing to a [`PageRenderer`]. Two renderers ship:
//! [`BlankPageRenderer`] always, and `PdfiumRenderer` behind the `pdfium`
//! feature.

use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::coords::{scale_px_per_pt, POINTS_PER_INCH};
use crate::document::{Document, PageGeometry};
use crate::error::{DocumentError, Result};

/// Target resolution for a render
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Resolution {
    /// Dots per inch
    Dpi(f64),
    /// Linear zoom relative to 72 DPI (2.0 = 144 DPI)
    Zoom(f64),
}

impl Resolution {
    pub fn dpi(&self) -> f64 {
        match *self {
            Resolution::Dpi(dpi) => dpi,
            Resolution::Zoom(zoom) => zoom * POINTS_PER_INCH,
        }
    }

    pub fn scale_px_per_pt(&self) -> f64 {
        scale_px_per_pt(self.dpi())
    }

    fn check(&self) -> Result<(), DocumentError> {
        let dpi = self.dpi();
        if dpi.is_finite() && dpi > 0.0 {
            Ok(())
        } else {
            Err(DocumentError::OperationError(format!(
                "invalid render resolution {} dpi",
                dpi
            )))
        }
    }
}

/// A bitmap of one page at a known scale
#[derive(Debug, Clone)]
pub struct PageRaster {
    pub page_index: usize,
    pub image: DynamicImage,
    /// Pixels per PDF point
    pub scale_px_per_pt: f64,
}

impl PageRaster {
    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Draws page content into a bitmap of a requested size
pub trait PageRenderer {
    fn render_page(
        &self,
        document: &Document,
        page: &PageGeometry,
        width_px: u32,
        height_px: u32,
    ) -> Result<DynamicImage>;
}

/// Paper-white page at the contract size. Used when page content is drawn
/// elsewhere (PDF.js in the browser) and in tests.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlankPageRenderer;

impl PageRenderer for BlankPageRenderer {
    fn render_page(
        &self,
        _document: &Document,
        _page: &PageGeometry,
        width_px: u32,
        height_px: u32,
    ) -> Result<DynamicImage> {
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(
            width_px,
            height_px,
            Rgb([255, 255, 255]),
        )))
    }
}

/// Pixel dimensions of the displayed page at `resolution`, rounded to
/// nearest, at least 1x1. A page with `/Rotate 90` or `270` is landscape.
pub fn raster_dimensions(page: &PageGeometry, resolution: Resolution) -> (u32, u32) {
    let scale = resolution.scale_px_per_pt();
    let (width_pt, height_pt) = page.displayed_size();
    let width = (width_pt * scale).round().max(1.0) as u32;
    let height = (height_pt * scale).round().max(1.0) as u32;
    (width, height)
}

/// Render page `page_index` of `document` at `resolution`
pub fn rasterize(
    renderer: &dyn PageRenderer,
    document: &Document,
    page_index: usize,
    resolution: Resolution,
) -> Result<PageRaster> {
    resolution.check()?;
    let page = document.page(page_index)?;
    let (width, height) = raster_dimensions(page, resolution);

    debug!(
        page = page_index,
        dpi = resolution.dpi(),
        page_pts = format!("{:.1}x{:.1}", page.width_pt, page.height_pt),
        rotation = page.rotation,
        raster_px = format!("{}x{}", width, height),
        "Rasterizing page"
    );

    let mut image = renderer.render_page(document, page, width, height)?;
    if image.width() != width || image.height() != height {
        warn!(
            page = page_index,
            rendered = format!("{}x{}", image.width(), image.height()),
            expected = format!("{}x{}", width, height),
            "Renderer returned unexpected size, resizing"
        );
        image = image.resize_exact(width, height, image::imageops::FilterType::Lanczos3);
    }

    Ok(PageRaster {
        page_index,
        image,
        scale_px_per_pt: resolution.scale_px_per_pt(),
    })
}

#[cfg(feature = "pdfium")]
pub use pdfium::PdfiumRenderer;

#[cfg(feature = "pdfium")]
mod pdfium {
    use image::DynamicImage;
    use pdfium_render::prelude::*;

    use super::PageRenderer;
    use crate::document::{Document, PageGeometry};
    use crate::error::{DocumentError, Result};

    /// Renders real page content through a dynamically linked PDFium
    pub struct PdfiumRenderer {
        pdfium: Pdfium,
    }

    impl PdfiumRenderer {
        /// Bind to libpdfium.
        /// Searches for libpdfium in:
        /// 1. Current directory (./libpdfium.so)
        /// 2. vendor/pdfium/lib/
        /// 3. System library paths
        pub fn new() -> Result<Self> {
            let bindings =
                Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
                    .or_else(|_| {
                        Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(
                            "./vendor/pdfium/lib/",
                        ))
                    })
                    .or_else(|_| Pdfium::bind_to_system_library())
                    .map_err(|e| {
                        DocumentError::OperationError(format!(
                            "Failed to load PDFium library: {:?}",
                            e
                        ))
                    })?;
            Ok(Self {
                pdfium: Pdfium::new(bindings),
            })
        }
    }

    impl PageRenderer for PdfiumRenderer {
        fn render_page(
            &self,
            document: &Document,
            page: &PageGeometry,
            width_px: u32,
            height_px: u32,
        ) -> Result<DynamicImage> {
            let render_error = |reason: String| DocumentError::RenderError {
                page: page.index,
                reason,
            };

            let pdf = self
                .pdfium
                .load_pdf_from_byte_slice(document.bytes(), None)
                .map_err(|e| render_error(e.to_string()))?;
            let index = u16::try_from(page.index)
                .map_err(|_| render_error("page index exceeds PDFium limit".to_string()))?;
            let pdf_page = pdf
                .pages()
                .get(index)
                .map_err(|e| render_error(e.to_string()))?;

            let config = PdfRenderConfig::new()
                .set_target_width(width_px as i32)
                .set_target_height(height_px as i32);

            let bitmap = pdf_page
                .render_with_config(&config)
                .map_err(|e| render_error(e.to_string()))?;

            Ok(bitmap.as_image())
        }
    }
}
