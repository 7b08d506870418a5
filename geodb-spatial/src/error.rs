//! Error types for the spatial index.

use thiserror::Error;

/// Spatial index errors.
#[derive(Error, Debug)]
pub enum SpatialError {
    /// Unsupported index configuration (rejected at construction).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Operation on an index, map or store that has already been closed.
    #[error("Resource closed: {0}")]
    Closed(String),

    /// The index and its table disagree about a row.
    ///
    /// Not retryable: the caller should abort the enclosing transaction.
    #[error("Integrity error: {0}")]
    Integrity(String),

    /// Malformed, truncated or unsupported geometry encoding.
    #[error("Geometry decode error: {0}")]
    Decode(String),

    /// Table lookup for a row id found nothing.
    #[error("Row not found: {0}")]
    RowNotFound(i64),

    /// Internal error (should not happen).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl SpatialError {
    /// Create a configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        SpatialError::Config(msg.into())
    }

    /// Create a closed-resource error
    pub fn closed(msg: impl Into<String>) -> Self {
        SpatialError::Closed(msg.into())
    }

    /// Create an integrity error
    pub fn integrity(msg: impl Into<String>) -> Self {
        SpatialError::Integrity(msg.into())
    }

    /// Create a decode error
    pub fn decode(msg: impl Into<String>) -> Self {
        SpatialError::Decode(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        SpatialError::Internal(msg.into())
    }
}

/// Result type for spatial operations.
pub type Result<T> = std::result::Result<T, SpatialError>;
