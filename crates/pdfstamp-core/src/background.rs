//! Signature background removal and the signature asset
//!
//! Scanned or photographed signatures usually sit on white paper. Stripping
//! turns every pixel whose R, G and B are all at or above a threshold into
//! transparent white, leaving only the ink.

use std::io::Cursor;

use image::imageops::FilterType;
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use tracing::debug;

use crate::config::TransparencySettings;
use crate::error::{ImageError, Result};

/// The value stripped pixels are rewritten to
pub const TRANSPARENT_WHITE: Rgba<u8> = Rgba([255, 255, 255, 0]);

/// Clamp a raw threshold into the valid `0..=255` range
pub fn clamp_threshold(raw: i64) -> u8 {
    raw.clamp(0, 255) as u8
}

/// Make near-white pixels transparent.
///
/// Sources without an alpha channel come out fully opaque apart from the
/// stripped pixels. Idempotent for a given threshold.
pub fn strip_background(image: &DynamicImage, threshold: u8) -> RgbaImage {
    let mut rgba = image.to_rgba8();
    for pixel in rgba.pixels_mut() {
        let [r, g, b, _] = pixel.0;
        if r >= threshold && g >= threshold && b >= threshold {
            *pixel = TRANSPARENT_WHITE;
        }
    }
    rgba
}

/// The processed signature, ready for compositing and PDF insertion
#[derive(Debug, Clone)]
pub struct SignatureAsset {
    image: RgbaImage,
    png: Vec<u8>,
    settings: TransparencySettings,
}

impl SignatureAsset {
    /// Decode a PNG/JPEG upload and apply `settings`
    pub fn from_image_bytes(bytes: &[u8], settings: TransparencySettings) -> Result<Self> {
        let decoded =
            image::load_from_memory(bytes).map_err(|e| ImageError::DecodeError(e.to_string()))?;
        Self::from_image(&decoded, settings)
    }

    pub fn from_image(source: &DynamicImage, settings: TransparencySettings) -> Result<Self> {
        if source.width() == 0 || source.height() == 0 {
            return Err(ImageError::DecodeError("image has no pixels".to_string()).into());
        }

        let image = if settings.enabled {
            strip_background(source, settings.threshold)
        } else {
            source.to_rgba8()
        };
        let png = encode_png(&DynamicImage::ImageRgba8(image.clone()))?;

        debug!(
            size = format!("{}x{}", image.width(), image.height()),
            transparent = settings.enabled,
            threshold = settings.threshold,
            png_bytes = png.len(),
            "Prepared signature asset"
        );

        Ok(Self {
            image,
            png,
            settings,
        })
    }

    pub fn image(&self) -> &RgbaImage {
        &self.image
    }

    /// PNG encoding of [`Self::image`]
    pub fn png_bytes(&self) -> &[u8] {
        &self.png
    }

    pub fn settings(&self) -> TransparencySettings {
        self.settings
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Source width / height
    pub fn aspect_ratio(&self) -> f64 {
        self.image.width() as f64 / self.image.height() as f64
    }

    /// Largest copy fitting in `max_width` x `max_height` with the aspect ratio kept
    pub fn thumbnail(&self, max_width: u32, max_height: u32) -> Result<RgbaImage> {
        if max_width == 0 || max_height == 0 {
            return Err(ImageError::InvalidResizeTarget {
                width: max_width,
                height: max_height,
            }
            .into());
        }
        let ratio = f64::min(
            max_width as f64 / self.image.width() as f64,
            max_height as f64 / self.image.height() as f64,
        );
        let width = ((self.image.width() as f64 * ratio) as u32).max(1);
        let height = ((self.image.height() as f64 * ratio) as u32).max(1);
        Ok(image::imageops::resize(
            &self.image,
            width,
            height,
            FilterType::Lanczos3,
        ))
    }
}

/// PNG-encode an image
pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .map_err(|e| ImageError::EncodeError(e.to_string()))?;
    Ok(bytes)
}
