//! Error types for cumulo.

use thiserror::Error;

/// The main error type for cumulo operations.
#[derive(Error, Debug)]
pub enum CumuloError {
    /// Cumulo has not been initialized.
    #[error("cumulo not initialized - call cumulo::init() first")]
    NotInitialized,

    /// Cumulo has already been initialized.
    #[error("cumulo already initialized")]
    AlreadyInitialized,

    /// A primitive with the given name already exists.
    #[error("primitive '{0}' already exists")]
    PrimitiveExists(String),

    /// A primitive with the given name was not found.
    #[error("primitive '{0}' not found")]
    PrimitiveNotFound(String),

    /// A scalar field was requested with a zero dimension.
    #[error("scalar field size must be positive, got {0}")]
    InvalidFieldSize(u32),

    /// Data size mismatch.
    #[error("data size mismatch: expected {expected}, got {actual}")]
    SizeMismatch { expected: usize, actual: usize },

    /// Rendering error.
    #[error("render error: {0}")]
    RenderError(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// A specialized Result type for cumulo operations.
pub type Result<T> = std::result::Result<T, CumuloError>;
