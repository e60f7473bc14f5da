//! Error types for the viewer core

use thiserror::Error;

/// Usage errors raised by geometry math, parsing and the measurement session.
///
/// Data-quality findings (out-of-range coordinates, suspicious CRS) are not
/// errors; they are reported through the validator result types instead.
#[derive(Error, Debug)]
pub enum GeometryError {
    #[error("{operation} requires at least {required} points, got {actual}")]
    TooFewPoints {
        operation: &'static str,
        required: usize,
        actual: usize,
    },

    #[error("Geometry is empty")]
    EmptyGeometry,

    #[error("Invalid position: {0}")]
    InvalidPosition(String),

    #[error("Bearing is undefined between identical points")]
    DegenerateBearing,

    #[error("Unsupported geometry: {0}")]
    UnsupportedGeometry(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid measurement session state: {0}")]
    InvalidSession(String),

    #[error("Failed to parse GeoJSON: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Result type alias for viewer core operations
pub type Result<T> = std::result::Result<T, GeometryError>;
