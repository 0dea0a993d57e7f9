//! Error types for Lineage core operations.

use thiserror::Error;

/// Errors from pure core operations.
///
/// Missing data is NOT an error anywhere in the core: lookups resolve to
/// `None` and relationship queries over disconnected graphs return `None`.
/// These variants cover genuinely invalid input only.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid cursor: {reason}")]
    InvalidCursor { reason: String },

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
