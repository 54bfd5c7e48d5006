//! Error types for the DSWE workspace

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for DSWE operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TIFF error in {path}: {reason}")]
    Tiff { path: String, reason: String },

    #[error("Invalid raster dimensions: {width}x{height}")]
    InvalidDimensions { width: usize, height: usize },

    #[error("Index out of bounds: ({row}, {col}) in raster of size ({rows}, {cols})")]
    IndexOutOfBounds {
        row: usize,
        col: usize,
        rows: usize,
        cols: usize,
    },

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Geotransform mismatch for {what}: {expected:?} vs {actual:?}")]
    TransformMismatch {
        what: String,
        expected: [f64; 6],
        actual: [f64; 6],
    },

    #[error("{what} is not north-up: {transform:?}")]
    RotatedGrid { what: String, transform: [f64; 6] },

    #[error("{0} carries no georeferencing tags")]
    MissingGeoreference(String),

    #[error("Projection mismatch: {0} vs {1}")]
    ProjectionMismatch(String, String),

    #[error("Fill value mismatch for {what}: {expected} vs {actual}")]
    FillMismatch {
        what: String,
        expected: f64,
        actual: f64,
    },

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("No data value not set for {0}")]
    NoDataNotSet(String),

    #[error("Scene {scene}: missing {band} band")]
    MissingBand { scene: String, band: &'static str },

    #[error("Cannot determine acquisition date from '{0}'")]
    SceneDate(String),

    #[error("Configuration error in {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

/// Result type alias for DSWE operations
pub type Result<T> = std::result::Result<T, Error>;
