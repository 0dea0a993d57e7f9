//! Error types for the storage layer.

use thiserror::Error;

/// Storage layer errors.
///
/// `Clone` is load-bearing: when a bulk fetch fails, the batch loader
/// fans the same error out to every pending requester of that relation,
/// so the error must be duplicable.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Connection failed: {reason}")]
    Connection { reason: String },

    #[error("Query failed: {reason}")]
    Query { reason: String },

    #[error("Invalid row for {entity}: {reason}")]
    InvalidRow { entity: String, reason: String },

    #[error("Batch function returned {got} results for {expected} keys")]
    BatchShapeMismatch { expected: usize, got: usize },

    #[error("Loader dropped before the batch completed")]
    LoaderDropped,
}

/// Result alias for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

impl From<tokio_postgres::Error> for StoreError {
    fn from(e: tokio_postgres::Error) -> Self {
        StoreError::Query {
            reason: e.to_string(),
        }
    }
}

impl From<deadpool_postgres::PoolError> for StoreError {
    fn from(e: deadpool_postgres::PoolError) -> Self {
        StoreError::Connection {
            reason: e.to_string(),
        }
    }
}
