//! Projection error types.

use thiserror::Error;

/// Errors that can occur while computing a projection.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// An error occurred in the store.
    #[error("Store error: {0}")]
    Store(#[from] store::StoreError),

    /// A query failed or returned an undecodable row.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
