//! Host process error type.

use event_store::EventStoreError;
use projections::ProjectionError;
use reactor::ReactorError;
use thiserror::Error;

/// Errors that stop the notifier process.
#[derive(Debug, Error)]
pub enum NotifierError {
    /// Connecting to PostgreSQL failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Migrating or reading the event log failed.
    #[error("Event log error: {0}")]
    EventLog(#[from] EventStoreError),

    /// Preparing the projection table failed.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// The reactor halted.
    #[error("Reactor error: {0}")]
    Reactor(#[from] ReactorError),

    /// Installing the Prometheus exporter failed.
    #[error("Metrics exporter error: {0}")]
    Metrics(String),

    /// Installing a signal handler failed.
    #[error("Signal handler error: {0}")]
    Signal(#[from] std::io::Error),
}
