//! Error types for CCM

use thiserror::Error;

/// Main error type for CCM operations
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

    #[error("Raster size mismatch: expected ({er}, {ec}), got ({ar}, {ac})")]
    SizeMismatch { er: usize, ec: usize, ar: usize, ac: usize },

    #[error("Raster grids are not aligned: {0}")]
    GridMismatch(String),

    #[error("CRS mismatch: {0} vs {1}")]
    CrsMismatch(String, String),

    #[error("Unsupported data type: {0}")]
    UnsupportedDataType(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("No row in parameter table '{table}' matches {criteria}")]
    ParameterNotFound { table: String, criteria: String },

    #[error("Parameter lookup {criteria} is ambiguous: {matches} rows match")]
    AmbiguousParameter { criteria: String, matches: usize },

    #[error("Wrong number of factors: got {count} ({factors:?}), expected 2 to 5")]
    InvalidFactorCount { count: usize, factors: Vec<String> },

    #[error("{operation} failed: {detail}")]
    ExternalOperation {
        operation: &'static str,
        detail: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Shorthand for a collaborator failure (clip, join, rasterize, decode).
    pub fn external(operation: &'static str, detail: impl Into<String>) -> Self {
        Error::ExternalOperation {
            operation,
            detail: detail.into(),
        }
    }

    /// Shorthand for a run configuration error.
    pub fn config(msg: impl Into<String>) -> Self {
        Error::Configuration(msg.into())
    }
}

/// Result type alias for CCM operations
pub type Result<T> = std::result::Result<T, Error>;
