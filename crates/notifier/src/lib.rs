//! Host process for the todo completion reactor.
//!
//! Wires the PostgreSQL event log and projection table, the logging
//! notifier and the system clock into a [`ReactorLoop`], with structured
//! logging (tracing) and Prometheus metrics.

pub mod config;
pub mod error;

use common::SystemClock;
use event_store::PostgresEventLog;
use projections::PostgresProjectionStore;
use reactor::{LoggingNotifier, ReactorLoop, TodoCompletedNotifier};
use sqlx::PgPool;

pub use config::{Config, LogFormat};
pub use error::NotifierError;

/// The handler as deployed.
pub type Notifier =
    TodoCompletedNotifier<PostgresProjectionStore, LoggingNotifier, PostgresEventLog, SystemClock>;

/// The loop as deployed.
pub type NotifierLoop = ReactorLoop<PostgresEventLog, Notifier>;

/// Applies the event log migrations and creates the projection table.
///
/// Runs once at startup, before the loop polls.
#[tracing::instrument(skip(pool))]
pub async fn prepare_schema(
    pool: &PgPool,
    projection_table: &str,
) -> Result<(PostgresEventLog, PostgresProjectionStore), NotifierError> {
    let log = PostgresEventLog::new(pool.clone());
    log.run_migrations().await?;

    let store = PostgresProjectionStore::with_table(pool.clone(), projection_table)?;
    store.ensure_schema().await?;

    tracing::info!(table = %store.table(), "schema ready");
    Ok((log, store))
}

/// Builds the reactor loop from `config` over an existing pool.
pub async fn build_reactor(pool: &PgPool, config: &Config) -> Result<NotifierLoop, NotifierError> {
    let (log, store) = prepare_schema(pool, &config.projection_table).await?;
    let handler = TodoCompletedNotifier::new(store, LoggingNotifier, log.clone(), SystemClock)?;
    Ok(ReactorLoop::new(log, handler, config.reactor_config()))
}
