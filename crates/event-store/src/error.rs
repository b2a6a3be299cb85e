use thiserror::Error;

/// Errors that can occur when reading from or appending to the event log.
#[derive(Debug, Error)]
pub enum EventStoreError {
    /// The event was rejected before reaching storage.
    #[error("Invalid event: {0}")]
    InvalidEvent(String),

    /// The log is temporarily unable to serve the request.
    #[error("Event log unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Result type for event log operations.
pub type Result<T> = std::result::Result<T, EventStoreError>;
