use thiserror::Error;

/// Failures while reading, rendering or rewriting the source PDF.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DocumentError {
    #[error("Failed to parse PDF: {0}")]
    ParseError(String),

    #[error("Not a valid PDF file: {0}")]
    NotPdf(&'static str),

    #[error("PDF has no pages")]
    NoPages,

    #[error("Page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("No document loaded")]
    NotLoaded,

    #[error("Page {page} could not be rendered: {reason}")]
    RenderError { page: usize, reason: String },

    #[error("PDF operation failed: {0}")]
    OperationError(String),
}

/// Failures while decoding, resizing or encoding raster images.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ImageError {
    #[error("Failed to decode image: {0}")]
    DecodeError(String),

    #[error("Failed to encode image: {0}")]
    EncodeError(String),

    #[error("Invalid resize target {width}x{height}")]
    InvalidResizeTarget { width: u32, height: u32 },

    #[error("No signature image loaded")]
    NoSignature,
}

/// Failures while mapping or storing a signature position.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlacementError {
    #[error("No signature placement selected")]
    NothingPlaced,

    #[error("Invalid display size {width}x{height}")]
    InvalidDisplaySize { width: f64, height: f64 },

    #[error("Coordinate is not a finite number: ({x}, {y})")]
    NonFiniteCoordinate { x: f64, y: f64 },
}

/// Configuration values rejected at construction time.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("{field} = {value} is outside the allowed range {min}..={max}")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StampError {
    #[error(transparent)]
    Document(#[from] DocumentError),

    #[error(transparent)]
    Image(#[from] ImageError),

    #[error(transparent)]
    Placement(#[from] PlacementError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub type Result<T, E = StampError> = std::result::Result<T, E>;
