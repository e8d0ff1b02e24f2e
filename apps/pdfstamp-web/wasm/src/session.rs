//! Stateful signing session
//!
//! Holds the document, signature and placements in Rust. JavaScript renders
//! pages with PDF.js, hands the bitmaps over with `setPageImage`, and only
//! deals with DOM events and file I/O.

use image::{DynamicImage, RgbaImage};
use pdfstamp_core::background::{clamp_threshold, encode_png};
use pdfstamp_core::{
    Anchor, DocumentInfo, PointRect, SessionState, SignatureSize, SizeUnit, StampConfig,
    TransparencySettings,
};
use serde::Serialize;
use wasm_bindgen::prelude::*;

/// One placement as handed to JavaScript
#[derive(Debug, Clone, Serialize)]
struct PlacementJs {
    page: usize,
    #[serde(flatten)]
    rect: PointRect,
}

#[wasm_bindgen]
pub struct StampSession {
    state: SessionState,
}

#[wasm_bindgen]
impl StampSession {
    /// Create a session with default settings (150 DPI, 150x75 px signature,
    /// background removal at 240)
    #[wasm_bindgen(constructor)]
    pub fn new() -> Self {
        Self {
            state: SessionState::default(),
        }
    }

    /// Create a session from a TOML settings string
    #[wasm_bindgen(js_name = withConfig)]
    pub fn with_config(toml: &str) -> Result<StampSession, JsValue> {
        Self::with_config_internal(toml).map_err(|e| JsValue::from_str(&e))
    }

    fn with_config_internal(toml: &str) -> Result<Self, String> {
        let config = StampConfig::from_toml_str(toml).map_err(|e| e.to_string())?;
        let state = SessionState::with_blank_renderer(config).map_err(|e| e.to_string())?;
        Ok(Self { state })
    }

    fn load_document_internal(&mut self, bytes: &[u8]) -> Result<DocumentInfo, String> {
        self.state.load_document(bytes).map_err(|e| e.to_string())
    }

    /// Load the PDF to sign. Returns document info as JSON.
    #[wasm_bindgen(js_name = loadDocument)]
    pub fn load_document(&mut self, bytes: &[u8]) -> Result<JsValue, JsValue> {
        let info = self
            .load_document_internal(bytes)
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&info)
    }

    /// Load a PNG or JPEG signature image
    #[wasm_bindgen(js_name = loadSignature)]
    pub fn load_signature(&mut self, bytes: &[u8]) -> Result<(), JsValue> {
        self.state
            .load_signature(bytes)
            .map(|_| ())
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = hasSignature)]
    pub fn has_signature(&self) -> bool {
        self.state.signature().is_some()
    }

    /// Toggle background removal. `threshold` is clamped to 0..=255.
    #[wasm_bindgen(js_name = setTransparency)]
    pub fn set_transparency(&mut self, enabled: bool, threshold: i32) -> Result<(), JsValue> {
        let settings = TransparencySettings {
            enabled,
            threshold: clamp_threshold(threshold as i64),
        };
        self.state
            .set_transparency(settings)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    #[wasm_bindgen(js_name = setRenderDpi)]
    pub fn set_render_dpi(&mut self, dpi: f64) -> Result<(), JsValue> {
        self.state
            .set_render_dpi(dpi)
            .map_err(|e| JsValue::from_str(&e.to_string()))
    }

    fn set_signature_size_internal(
        &mut self,
        width: f64,
        height: f64,
        unit: &str,
    ) -> Result<(), String> {
        let size = SignatureSize::new(width, height, parse_unit(unit)?).map_err(|e| e.to_string())?;
        self.state
            .set_signature_size(size)
            .map_err(|e| e.to_string())
    }

    /// Set the signature size; `unit` is "px" or "pt"
    #[wasm_bindgen(js_name = setSignatureSize)]
    pub fn set_signature_size(&mut self, width: f64, height: f64, unit: &str) -> Result<(), JsValue> {
        self.set_signature_size_internal(width, height, unit)
            .map_err(|e| JsValue::from_str(&e))
    }

    fn fit_signature_width_internal(&mut self, width: f64, unit: &str) -> Result<f64, String> {
        let unit = parse_unit(unit)?;
        self.state
            .fit_signature_width(width, unit)
            .map(|size| size.height)
            .map_err(|e| e.to_string())
    }

    /// Set the signature width and keep its aspect ratio. Returns the height.
    #[wasm_bindgen(js_name = fitSignatureWidth)]
    pub fn fit_signature_width(&mut self, width: f64, unit: &str) -> Result<f64, JsValue> {
        self.fit_signature_width_internal(width, unit)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Pixel size `[width, height]` of a page at the current DPI
    #[wasm_bindgen(js_name = getRasterSize)]
    pub fn get_raster_size(&self, page: usize) -> Result<Vec<u32>, JsValue> {
        let (width, height) = self
            .state
            .raster_size(page)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(vec![width, height])
    }

    /// Signature size in pixels `[width, height]` at the current DPI
    #[wasm_bindgen(js_name = getSignaturePixelSize)]
    pub fn get_signature_pixel_size(&self) -> Vec<u32> {
        let (width, height) = self.state.signature_pixel_size();
        vec![width, height]
    }

    fn set_page_image_internal(
        &mut self,
        page: usize,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), String> {
        let image = RgbaImage::from_raw(width, height, rgba.to_vec()).ok_or_else(|| {
            format!(
                "Page image data has {} bytes, expected {} for {}x{} RGBA",
                rgba.len(),
                width as usize * height as usize * 4,
                width,
                height
            )
        })?;
        self.state
            .supply_page_image(page, DynamicImage::ImageRgba8(image))
            .map_err(|e| e.to_string())
    }

    /// Hand over a page rendered by PDF.js (canvas `ImageData.data`)
    #[wasm_bindgen(js_name = setPageImage)]
    pub fn set_page_image(
        &mut self,
        page: usize,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), JsValue> {
        self.set_page_image_internal(page, width, height, rgba)
            .map_err(|e| JsValue::from_str(&e))
    }

    /// Place the signature where the user clicked on a `display_w` x
    /// `display_h` canvas. Returns the stored rectangle in points.
    #[wasm_bindgen(js_name = placeAtDisplay)]
    pub fn place_at_display(
        &mut self,
        page: usize,
        x: f64,
        y: f64,
        display_w: f64,
        display_h: f64,
    ) -> Result<JsValue, JsValue> {
        let rect = self
            .state
            .place_at_display(page, x, y, display_w, display_h)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&rect)
    }

    /// Place the signature at a raster pixel offset (slider input)
    #[wasm_bindgen(js_name = placeAtRaster)]
    pub fn place_at_raster(&mut self, page: usize, x: f64, y: f64) -> Result<JsValue, JsValue> {
        let rect = self
            .state
            .place_at_raster(page, x, y)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        to_js(&rect)
    }

    fn place_at_anchor_internal(&mut self, page: usize, anchor: &str) -> Result<PointRect, String> {
        let anchor =
            Anchor::parse(anchor).ok_or_else(|| format!("Unknown position: {}", anchor))?;
        self.state
            .place_at_anchor(page, anchor)
            .map_err(|e| e.to_string())
    }

    /// Quick position: "top-left", "top-right", "bottom-left", "bottom-right"
    #[wasm_bindgen(js_name = placeAtAnchor)]
    pub fn place_at_anchor(&mut self, page: usize, anchor: &str) -> Result<JsValue, JsValue> {
        let rect = self
            .place_at_anchor_internal(page, anchor)
            .map_err(|e| JsValue::from_str(&e))?;
        to_js(&rect)
    }

    #[wasm_bindgen(js_name = removePlacement)]
    pub fn remove_placement(&mut self, page: usize) -> bool {
        self.state.remove_placement(page).is_some()
    }

    /// Raster offset `[x, y]` to show for a page: its placement or the default
    #[wasm_bindgen(js_name = getPlacementOffset)]
    pub fn get_placement_offset(&self, page: usize) -> Result<Vec<u32>, JsValue> {
        let (x, y) = self
            .state
            .placement_offset_px(page)
            .map_err(|e| JsValue::from_str(&e.to_string()))?;
        Ok(vec![x, y])
    }

    fn placements_internal(&self) -> Vec<PlacementJs> {
        self.state
            .placements()
            .iter()
            .map(|(page, rect)| PlacementJs { page, rect: *rect })
            .collect()
    }

    /// All placements in page order as `[{page, x, y, width, height}]`
    #[wasm_bindgen(js_name = getPlacements)]
    pub fn get_placements(&self) -> Result<JsValue, JsValue> {
        to_js(&self.placements_internal())
    }

    /// Indices of pages that have a signature
    #[wasm_bindgen(js_name = getSignedPages)]
    pub fn get_signed_pages(&self) -> Vec<u32> {
        self.state
            .placements()
            .pages()
            .into_iter()
            .map(|page| page as u32)
            .collect()
    }

    #[wasm_bindgen(js_name = canExport)]
    pub fn can_export(&self) -> bool {
        self.state.document().is_some()
            && self.state.signature().is_some()
            && !self.state.placements().is_empty()
    }

    fn preview_internal(&mut self, page: usize) -> Result<Vec<u8>, String> {
        let preview = self.state.preview(page).map_err(|e| e.to_string())?;
        encode_png(&preview).map_err(|e| e.to_string())
    }

    /// PNG preview of a page with the signature composited
    #[wasm_bindgen(js_name = renderPreview)]
    pub fn render_preview(&mut self, page: usize) -> Result<js_sys::Uint8Array, JsValue> {
        let png = self
            .preview_internal(page)
            .map_err(|e| JsValue::from_str(&e))?;
        Ok(js_sys::Uint8Array::from(&png[..]))
    }

    fn thumbnail_internal(&self, max_width: u32, max_height: u32) -> Result<Vec<u8>, String> {
        let asset = self
            .state
            .signature()
            .ok_or_else(|| "No signature image loaded".to_string())?;
        let thumbnail = asset
            .thumbnail(max_width, max_height)
            .map_err(|e| e.to_string())?;
        encode_png(&DynamicImage::ImageRgba8(thumbnail)).map_err(|e| e.to_string())
    }

    /// PNG of the processed signature scaled to fit the given box
    #[wasm_bindgen(js_name = getSignatureThumbnail)]
    pub fn get_signature_thumbnail(
        &self,
        max_width: u32,
        max_height: u32,
    ) -> Result<js_sys::Uint8Array, JsValue> {
        let png = self
            .thumbnail_internal(max_width, max_height)
            .map_err(|e| JsValue::from_str(&e))?;
        Ok(js_sys::Uint8Array::from(&png[..]))
    }

    fn export_pdf_internal(&self) -> Result<Vec<u8>, String> {
        self.state.export_pdf().map_err(|e| e.to_string())
    }

    /// Signed PDF bytes
    #[wasm_bindgen(js_name = exportPdf)]
    pub fn export_pdf(&self) -> Result<js_sys::Uint8Array, JsValue> {
        let pdf = self
            .export_pdf_internal()
            .map_err(|e| JsValue::from_str(&e))?;
        Ok(js_sys::Uint8Array::from(&pdf[..]))
    }

    fn export_page_png_internal(&mut self, page: usize) -> Result<Vec<u8>, String> {
        self.state.export_page_png(page).map_err(|e| e.to_string())
    }

    /// Single page as PNG with its signature
    #[wasm_bindgen(js_name = exportPagePng)]
    pub fn export_page_png(&mut self, page: usize) -> Result<js_sys::Uint8Array, JsValue> {
        let png = self
            .export_page_png_internal(page)
            .map_err(|e| JsValue::from_str(&e))?;
        Ok(js_sys::Uint8Array::from(&png[..]))
    }
}

impl Default for StampSession {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_unit(unit: &str) -> Result<SizeUnit, String> {
    match unit.trim().to_ascii_lowercase().as_str() {
        "px" | "pixels" => Ok(SizeUnit::Pixels),
        "pt" | "points" => Ok(SizeUnit::Points),
        other => Err(format!("Unknown size unit: {}", other)),
    }
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, JsValue> {
    serde_wasm_bindgen::to_value(value)
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}
