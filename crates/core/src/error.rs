//! Error types for SiteSim

use thiserror::Error;

/// Main error type for SiteSim operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Empty extent: ({min_x}, {min_y}) - ({max_x}, {max_y})")]
    EmptyExtent {
        min_x: f64,
        min_y: f64,
        max_x: f64,
        max_y: f64,
    },

    #[error("Layer not found: {0}")]
    LayerNotFound(String),

    #[error("Layer '{name}' is not a {expected} layer")]
    LayerKind { name: String, expected: &'static str },

    #[error("Band {band} out of range (image has {bands} band(s))")]
    BandOutOfRange { band: usize, bands: usize },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for SiteSim operations
pub type Result<T> = std::result::Result<T, Error>;
