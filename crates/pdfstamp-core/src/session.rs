//! Editing session state
//!
//! One [`SessionState`] per user session. It owns the uploaded document, the
//! processed signature, the placements and the raster cache, and is passed
//! around by `&mut`. A failed call leaves the state as it was.

use image::imageops::FilterType;
use image::DynamicImage;
use tracing::{debug, info};

use crate::background::SignatureAsset;
use crate::cache::{RasterCache, RasterKey};
use crate::config::{RenderSettings, SignatureSize, SizeUnit, StampConfig, TransparencySettings};
use crate::coords::{
    clamp_offset, display_to_raster, points_rect_to_raster, raster_rect_to_points,
    raster_to_pdf_points, PointRect,
};
use crate::document::{Document, DocumentInfo, PageGeometry};
use crate::error::{ConfigError, DocumentError, ImageError, PlacementError, Result};
use crate::export;
use crate::placement::{Anchor, Placement, DEFAULT_OFFSET_PX};
use crate::raster::{
    raster_dimensions, rasterize, BlankPageRenderer, PageRaster, PageRenderer, Resolution,
};
use crate::reassemble::stamp_pdf;

pub struct SessionState {
    config: StampConfig,
    renderer: Box<dyn PageRenderer>,
    document: Option<Document>,
    /// Raw upload, kept so the asset can be rebuilt when transparency changes
    signature_source: Option<Vec<u8>>,
    asset: Option<SignatureAsset>,
    placement: Placement,
    cache: RasterCache,
}

impl SessionState {
    pub fn new(config: StampConfig, renderer: Box<dyn PageRenderer>) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self {
            config,
            renderer,
            document: None,
            signature_source: None,
            asset: None,
            placement: Placement::new(),
            cache: RasterCache::new(),
        })
    }

    /// Session whose page rasters are blank unless supplied with
    /// [`Self::supply_page_image`]
    pub fn with_blank_renderer(config: StampConfig) -> Result<Self, ConfigError> {
        Self::new(config, Box::new(BlankPageRenderer))
    }

    pub fn config(&self) -> &StampConfig {
        &self.config
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::Dpi(self.config.render.dpi)
    }

    pub fn document(&self) -> Option<&Document> {
        self.document.as_ref()
    }

    pub fn signature(&self) -> Option<&SignatureAsset> {
        self.asset.as_ref()
    }

    pub fn placements(&self) -> &Placement {
        &self.placement
    }

    pub fn cache(&self) -> &RasterCache {
        &self.cache
    }

    /// Load a PDF. Placements are kept when the same bytes are uploaded again
    /// and cleared otherwise.
    pub fn load_document(&mut self, bytes: &[u8]) -> Result<DocumentInfo> {
        let document = Document::from_bytes(bytes)?;

        if let Some(previous) = &self.document {
            if previous.content_hash() != document.content_hash() {
                self.cache.invalidate_document(previous.content_hash());
                self.placement.clear();
            }
        }

        let info = document.info();
        self.document = Some(document);
        Ok(info)
    }

    /// Decode and process a signature upload with the current transparency
    /// settings
    pub fn load_signature(&mut self, bytes: &[u8]) -> Result<&SignatureAsset> {
        let asset = SignatureAsset::from_image_bytes(bytes, self.config.transparency)?;
        self.signature_source = Some(bytes.to_vec());
        Ok(self.asset.insert(asset))
    }

    /// Change the transparency toggle/threshold, rebuilding the asset
    pub fn set_transparency(&mut self, settings: TransparencySettings) -> Result<()> {
        if let Some(source) = &self.signature_source {
            self.asset = Some(SignatureAsset::from_image_bytes(source, settings)?);
        }
        self.config.transparency = settings;
        Ok(())
    }

    /// Change the render DPI. Stored placements are in points and survive;
    /// rasters cached at the old DPI are dropped.
    pub fn set_render_dpi(&mut self, dpi: f64) -> Result<(), ConfigError> {
        self.config.render = RenderSettings::new(dpi)?;
        let resolution = self.resolution();
        self.cache.retain_resolution(resolution);
        Ok(())
    }

    pub fn set_signature_size(&mut self, size: SignatureSize) -> Result<(), ConfigError> {
        size.validate()?;
        self.config.signature = size;
        Ok(())
    }

    /// Set the signature width and derive the height from the loaded
    /// signature's aspect ratio
    pub fn fit_signature_width(&mut self, width: f64, unit: SizeUnit) -> Result<SignatureSize> {
        let asset = self.asset.as_ref().ok_or(ImageError::NoSignature)?;
        let size = SignatureSize::fit_width(width, unit, asset.aspect_ratio())?;
        self.config.signature = size;
        Ok(size)
    }

    /// Geometry of page `page_index` of the loaded document
    pub fn page(&self, page_index: usize) -> Result<&PageGeometry> {
        let document = self.document.as_ref().ok_or(DocumentError::NotLoaded)?;
        Ok(document.page(page_index)?)
    }

    /// Pixel size of page `page_index` at the current DPI
    pub fn raster_size(&self, page_index: usize) -> Result<(u32, u32)> {
        Ok(raster_dimensions(self.page(page_index)?, self.resolution()))
    }

    /// Render (or fetch from cache) page `page_index` at the current DPI
    pub fn page_raster(&mut self, page_index: usize) -> Result<&PageRaster> {
        let Self {
            config,
            renderer,
            document,
            cache,
            ..
        } = self;
        cached_raster(
            document.as_ref(),
            renderer.as_ref(),
            cache,
            Resolution::Dpi(config.render.dpi),
            page_index,
        )
    }

    /// Cache a page bitmap rendered by the host at the current DPI. The image
    /// is resized to the raster contract size if needed.
    pub fn supply_page_image(&mut self, page_index: usize, image: DynamicImage) -> Result<()> {
        let document = self.document.as_ref().ok_or(DocumentError::NotLoaded)?;
        let resolution = self.resolution();
        let (width, height) = raster_dimensions(document.page(page_index)?, resolution);

        let image = if image.width() != width || image.height() != height {
            debug!(
                page = page_index,
                supplied = format!("{}x{}", image.width(), image.height()),
                expected = format!("{}x{}", width, height),
                "Resizing supplied page image"
            );
            image.resize_exact(width, height, FilterType::Lanczos3)
        } else {
            image
        };

        let key = RasterKey::new(document.content_hash(), page_index, resolution);
        self.cache.insert(
            key,
            PageRaster {
                page_index,
                image,
                scale_px_per_pt: resolution.scale_px_per_pt(),
            },
        );
        Ok(())
    }

    /// Configured signature size in pixels at the current DPI
    pub fn signature_pixel_size(&self) -> (u32, u32) {
        self.config
            .signature
            .to_raster_px(self.resolution().scale_px_per_pt())
    }

    /// Place the signature with its top-left corner at raster pixel
    /// `(x_px, y_px)`, clamped so it stays on the page
    pub fn place_at_raster(&mut self, page_index: usize, x_px: f64, y_px: f64) -> Result<PointRect> {
        if !x_px.is_finite() || !y_px.is_finite() {
            return Err(PlacementError::NonFiniteCoordinate { x: x_px, y: y_px }.into());
        }
        let page = *self.page(page_index)?;
        let resolution = self.resolution();
        let (raster_w, raster_h) = raster_dimensions(&page, resolution);
        let (sig_w, sig_h) = self.signature_pixel_size();

        let (x, y) = clamp_offset(
            x_px.round() as i64,
            y_px.round() as i64,
            sig_w,
            sig_h,
            raster_w,
            raster_h,
        );
        let scale = resolution.scale_px_per_pt();
        let (width_pt, height_pt) = self.config.signature.to_points(scale);
        let rect = PointRect::new(
            raster_to_pdf_points(x as f64, scale),
            raster_to_pdf_points(y as f64, scale),
            width_pt,
            height_pt,
        );

        let stored = self.placement.insert(&page, rect);
        debug!(
            page = page_index,
            requested_px = format!("({}, {})", x_px, y_px),
            offset_px = format!("({}, {})", x, y),
            rect = ?stored,
            "Placed signature"
        );
        Ok(stored)
    }

    /// Place the signature at a point clicked on a display canvas of
    /// `display_w` x `display_h` showing page `page_index`
    pub fn place_at_display(
        &mut self,
        page_index: usize,
        display_x: f64,
        display_y: f64,
        display_w: f64,
        display_h: f64,
    ) -> Result<PointRect> {
        let (raster_w, raster_h) = self.raster_size(page_index)?;
        let (x, y) = display_to_raster(
            display_x,
            display_y,
            display_w,
            display_h,
            raster_w as f64,
            raster_h as f64,
        )?;
        self.place_at_raster(page_index, x, y)
    }

    /// Place the signature in a page corner
    pub fn place_at_anchor(&mut self, page_index: usize, anchor: Anchor) -> Result<PointRect> {
        let (raster_w, raster_h) = self.raster_size(page_index)?;
        let (sig_w, sig_h) = self.signature_pixel_size();
        let (x, y) = anchor.offset_px(sig_w, sig_h, raster_w, raster_h);
        self.place_at_raster(page_index, x as f64, y as f64)
    }

    pub fn remove_placement(&mut self, page_index: usize) -> Option<PointRect> {
        self.placement.remove(page_index)
    }

    /// Raster offset to show for page `page_index`: the stored placement, or
    /// the clamped default for a page without one
    pub fn placement_offset_px(&self, page_index: usize) -> Result<(u32, u32)> {
        let (raster_w, raster_h) = self.raster_size(page_index)?;
        let (sig_w, sig_h) = self.signature_pixel_size();
        let (x, y) = match self.placement.get(page_index) {
            Some(rect) => {
                let (x, y, _, _) =
                    points_rect_to_raster(rect, self.resolution().scale_px_per_pt());
                (x.round() as i64, y.round() as i64)
            }
            None => (DEFAULT_OFFSET_PX.0 as i64, DEFAULT_OFFSET_PX.1 as i64),
        };
        Ok(clamp_offset(x, y, sig_w, sig_h, raster_w, raster_h))
    }

    /// Live preview of page `page_index`. Shows the stored placement, or the
    /// signature at the default offset when the page has none yet.
    pub fn preview(&mut self, page_index: usize) -> Result<DynamicImage> {
        let rect = match self.placement.get(page_index) {
            Some(rect) => Some(*rect),
            None if self.asset.is_some() => {
                let (x, y) = self.placement_offset_px(page_index)?;
                let (w, h) = self.signature_pixel_size();
                Some(raster_rect_to_points(
                    x as f64,
                    y as f64,
                    w as f64,
                    h as f64,
                    self.resolution().scale_px_per_pt(),
                ))
            }
            None => None,
        };

        let Self {
            config,
            renderer,
            document,
            cache,
            asset,
            ..
        } = self;
        let raster = cached_raster(
            document.as_ref(),
            renderer.as_ref(),
            cache,
            Resolution::Dpi(config.render.dpi),
            page_index,
        )?;
        export::render_preview(raster, asset.as_ref().zip(rect.as_ref()))
    }

    /// Write every placement into a new PDF
    pub fn export_pdf(&self) -> Result<Vec<u8>> {
        let document = self.document.as_ref().ok_or(DocumentError::NotLoaded)?;
        if self.placement.is_empty() {
            return Err(PlacementError::NothingPlaced.into());
        }
        let asset = self.asset.as_ref().ok_or(ImageError::NoSignature)?;

        let output = stamp_pdf(document.bytes(), &self.placement, asset.png_bytes())?;
        info!(
            pages = ?self.placement.pages(),
            bytes = output.len(),
            "Exported signed PDF"
        );
        Ok(output)
    }

    /// PNG of page `page_index` with its stored placement composited
    pub fn export_page_png(&mut self, page_index: usize) -> Result<Vec<u8>> {
        let rect = self.placement.get(page_index).copied();
        let Self {
            config,
            renderer,
            document,
            cache,
            asset,
            ..
        } = self;
        let raster = cached_raster(
            document.as_ref(),
            renderer.as_ref(),
            cache,
            Resolution::Dpi(config.render.dpi),
            page_index,
        )?;
        export::page_png(raster, asset.as_ref().zip(rect.as_ref()))
    }
}

impl Default for SessionState {
    /// Default configuration with [`BlankPageRenderer`]
    fn default() -> Self {
        Self {
            config: StampConfig::default(),
            renderer: Box::new(BlankPageRenderer),
            document: None,
            signature_source: None,
            asset: None,
            placement: Placement::new(),
            cache: RasterCache::new(),
        }
    }
}

fn cached_raster<'a>(
    document: Option<&Document>,
    renderer: &dyn PageRenderer,
    cache: &'a mut RasterCache,
    resolution: Resolution,
    page_index: usize,
) -> Result<&'a PageRaster> {
    let document = document.ok_or(DocumentError::NotLoaded)?;
    let key = RasterKey::new(document.content_hash(), page_index, resolution);
    cache.get_or_render(key, || {
        rasterize(renderer, document, page_index, resolution)
    })
}
