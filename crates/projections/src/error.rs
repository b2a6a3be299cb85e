//! Projection error types.

use common::AggregateId;
use thiserror::Error;

/// Errors that can occur when reading or writing the projection table.
#[derive(Debug, Error)]
pub enum ProjectionError {
    /// A record with this key already exists.
    #[error("Duplicate projection record: {0}")]
    DuplicateKey(AggregateId),

    /// No record exists for this key.
    #[error("Projection record not found: {0}")]
    NotFound(AggregateId),

    /// The configured table name is not a plain SQL identifier.
    #[error("Invalid projection table name: {0:?}")]
    InvalidTableName(String),

    /// The store is temporarily unable to serve the request.
    #[error("Projection store unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl ProjectionError {
    pub fn is_duplicate_key(&self) -> bool {
        matches!(self, ProjectionError::DuplicateKey(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, ProjectionError::NotFound(_))
    }
}

/// Result type for projection operations.
pub type Result<T> = std::result::Result<T, ProjectionError>;
