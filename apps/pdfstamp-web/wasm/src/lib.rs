//! WASM bindings for signature stamping
//!
//! This module provides a stateful, session-based API for placing a
//! signature image on PDF pages. All state is held in Rust, minimizing
//! JavaScript complexity.
//!
//! ## Architecture
//!
//! - State management in Rust via `StampSession`
//! - PDF validation, placement mapping and export in `pdfstamp-core`
//! - JavaScript renders pages with PDF.js, handles DOM events and file I/O
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { StampSession } from './pkg/pdfstamp_wasm.js';
//!
//! await init();
//!
//! const session = new StampSession();
//! const info = session.loadDocument(pdfBytes);
//! session.loadSignature(signatureBytes);
//! session.setTransparency(true, 240);
//!
//! // page 0 rendered by PDF.js at the session DPI
//! const [w, h] = session.getRasterSize(0);
//! session.setPageImage(0, w, h, ctx.getImageData(0, 0, w, h).data);
//!
//! session.placeAtDisplay(0, event.offsetX, event.offsetY, canvas.width, canvas.height);
//! previewImg.src = URL.createObjectURL(new Blob([session.renderPreview(0)]));
//!
//! downloadBlob(session.exportPdf(), "signed.pdf");
//! ```

pub mod session;

use wasm_bindgen::prelude::*;

// Re-export main types for JavaScript
pub use session::StampSession;

/// Initialize the WASM module
/// Called automatically by wasm-bindgen
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Get the library version
#[wasm_bindgen]
pub fn get_version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}

/// Quick validation check for a PDF file
/// Returns Ok(()) if valid, Err with message if not
#[wasm_bindgen]
pub fn quick_validate(bytes: &[u8]) -> Result<(), JsValue> {
    pdfstamp_core::document::quick_validate(bytes).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Get PDF info (page count, version, page sizes) without creating a session
#[wasm_bindgen]
pub fn get_document_info(bytes: &[u8]) -> Result<JsValue, JsValue> {
    let document =
        pdfstamp_core::Document::from_bytes(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;

    serde_wasm_bindgen::to_value(&document.info())
        .map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

/// Get page count from PDF bytes (convenience function)
#[wasm_bindgen]
pub fn get_page_count(bytes: &[u8]) -> Result<u32, JsValue> {
    let count =
        pdfstamp_core::get_page_count(bytes).map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(count as u32)
}
