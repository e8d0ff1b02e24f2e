//! Typed session configuration
//!
//! Everything the UI layer can tune (render DPI, signature size, background
//! transparency) lives in [`StampConfig`]. Values are range-checked when the
//! record is built, so pipeline code can trust them.

use serde::{Deserialize, Serialize};

use crate::coords::{pdf_points_to_raster, raster_to_pdf_points};
use crate::error::ConfigError;

pub const MIN_DPI: f64 = 36.0;
pub const MAX_DPI: f64 = 600.0;
pub const DEFAULT_DPI: f64 = 150.0;

/// Largest signature edge accepted, in either unit
pub const MAX_SIGNATURE_EDGE: f64 = 4000.0;

pub const DEFAULT_THRESHOLD: u8 = 240;

/// Complete configuration for an editing session
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StampConfig {
    #[serde(default)]
    pub render: RenderSettings,
    #[serde(default)]
    pub signature: SignatureSize,
    #[serde(default)]
    pub transparency: TransparencySettings,
}

impl StampConfig {
    /// Parse configuration from a TOML string and validate it
    ///
    /// ```
    /// use pdfstamp_core::config::StampConfig;
    ///
    /// let config = StampConfig::from_toml_str(r#"
    ///     [render]
    ///     dpi = 200
    ///
    ///     [transparency]
    ///     threshold = 230
    /// "#).unwrap();
    /// assert_eq!(config.render.dpi, 200.0);
    /// ```
    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(s).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.render.validate()?;
        self.signature.validate()
    }
}

/// Page render settings
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    /// Render resolution in dots per inch
    #[serde(default = "default_dpi")]
    pub dpi: f64,
}

fn default_dpi() -> f64 {
    DEFAULT_DPI
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self { dpi: DEFAULT_DPI }
    }
}

impl RenderSettings {
    pub fn new(dpi: f64) -> Result<Self, ConfigError> {
        let settings = Self { dpi };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("render.dpi", self.dpi, MIN_DPI, MAX_DPI)
    }
}

/// Unit a signature size is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SizeUnit {
    /// Pixels of the rendered page raster
    #[default]
    Pixels,
    /// PDF points
    Points,
}

/// Size of the signature on the page
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SignatureSize {
    #[serde(default = "default_signature_width")]
    pub width: f64,
    #[serde(default = "default_signature_height")]
    pub height: f64,
    #[serde(default)]
    pub unit: SizeUnit,
}

fn default_signature_width() -> f64 {
    150.0
}

fn default_signature_height() -> f64 {
    75.0
}

impl Default for SignatureSize {
    fn default() -> Self {
        Self {
            width: default_signature_width(),
            height: default_signature_height(),
            unit: SizeUnit::Pixels,
        }
    }
}

impl SignatureSize {
    pub fn new(width: f64, height: f64, unit: SizeUnit) -> Result<Self, ConfigError> {
        let size = Self {
            width,
            height,
            unit,
        };
        size.validate()?;
        Ok(size)
    }

    /// Size with a fixed width and a height that keeps `aspect_ratio`
    /// (source width / source height)
    pub fn fit_width(width: f64, unit: SizeUnit, aspect_ratio: f64) -> Result<Self, ConfigError> {
        check_range("signature.aspect_ratio", aspect_ratio, f64::MIN_POSITIVE, f64::MAX)?;
        Self::new(width, width / aspect_ratio, unit)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range("signature.width", self.width, f64::MIN_POSITIVE, MAX_SIGNATURE_EDGE)?;
        check_range("signature.height", self.height, f64::MIN_POSITIVE, MAX_SIGNATURE_EDGE)
    }

    /// Whole-pixel size on a raster with `scale_px_per_pt`, at least 1x1
    pub fn to_raster_px(&self, scale_px_per_pt: f64) -> (u32, u32) {
        let (w, h) = match self.unit {
            SizeUnit::Pixels => (self.width, self.height),
            SizeUnit::Points => (
                pdf_points_to_raster(self.width, scale_px_per_pt),
                pdf_points_to_raster(self.height, scale_px_per_pt),
            ),
        };
        ((w.round() as u32).max(1), (h.round() as u32).max(1))
    }

    /// Size in points for a raster with `scale_px_per_pt`
    pub fn to_points(&self, scale_px_per_pt: f64) -> (f64, f64) {
        match self.unit {
            SizeUnit::Points => (self.width, self.height),
            SizeUnit::Pixels => (
                raster_to_pdf_points(self.width, scale_px_per_pt),
                raster_to_pdf_points(self.height, scale_px_per_pt),
            ),
        }
    }
}

/// Background transparency for the uploaded signature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransparencySettings {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    /// Pixels with R, G and B all at or above this value become transparent
    #[serde(default = "default_threshold")]
    pub threshold: u8,
}

fn default_enabled() -> bool {
    true
}

fn default_threshold() -> u8 {
    DEFAULT_THRESHOLD
}

impl Default for TransparencySettings {
    fn default() -> Self {
        Self {
            enabled: true,
            threshold: DEFAULT_THRESHOLD,
        }
    }
}

impl TransparencySettings {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ..Self::default()
        }
    }
}

fn check_range(field: &'static str, value: f64, min: f64, max: f64) -> Result<(), ConfigError> {
    if value.is_finite() && value >= min && value <= max {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = StampConfig::default();
        assert_eq!(config.render.dpi, 150.0);
        assert_eq!(config.signature.width, 150.0);
        assert_eq!(config.signature.height, 75.0);
        assert_eq!(config.signature.unit, SizeUnit::Pixels);
        assert!(config.transparency.enabled);
        assert_eq!(config.transparency.threshold, 240);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_empty_toml_uses_defaults() {
        let config = StampConfig::from_toml_str("").unwrap();
        assert_eq!(config, StampConfig::default());
    }

    #[test]
    fn test_toml_points_signature() {
        let config = StampConfig::from_toml_str(
            r#"
            [signature]
            width = 100
            height = 40
            unit = "points"

            [transparency]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.signature.unit, SizeUnit::Points);
        assert_eq!(config.signature.width, 100.0);
        assert!(!config.transparency.enabled);
        assert_eq!(config.transparency.threshold, 240);
    }

    #[test]
    fn test_toml_rejects_out_of_range_dpi() {
        let err = StampConfig::from_toml_str("[render]\ndpi = 5000").unwrap_err();
        assert!(matches!(
            err,
            ConfigError::OutOfRange {
                field: "render.dpi",
                ..
            }
        ));
    }

    #[test]
    fn test_toml_rejects_threshold_over_255() {
        let err = StampConfig::from_toml_str("[transparency]\nthreshold = 300").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn test_render_settings_rejects_nan() {
        assert!(RenderSettings::new(f64::NAN).is_err());
        assert!(RenderSettings::new(0.0).is_err());
        assert!(RenderSettings::new(72.0).is_ok());
    }

    #[test]
    fn test_signature_size_rejects_zero() {
        assert!(SignatureSize::new(0.0, 10.0, SizeUnit::Pixels).is_err());
        assert!(SignatureSize::new(10.0, -1.0, SizeUnit::Points).is_err());
    }

    #[test]
    fn test_fit_width_keeps_aspect() {
        let size = SignatureSize::fit_width(100.0, SizeUnit::Points, 2.5).unwrap();
        assert_eq!(size.height, 40.0);
    }

    #[test]
    fn test_pixel_size_to_points_at_150_dpi() {
        let size = SignatureSize::default();
        let (w, h) = size.to_points(150.0 / 72.0);
        assert!((w - 72.0).abs() < 1e-9);
        assert!((h - 36.0).abs() < 1e-9);
        assert_eq!(size.to_raster_px(150.0 / 72.0), (150, 75));
    }

    #[test]
    fn test_point_size_to_raster_px() {
        let size = SignatureSize::new(72.0, 36.0, SizeUnit::Points).unwrap();
        assert_eq!(size.to_raster_px(2.0), (144, 72));
    }
}
