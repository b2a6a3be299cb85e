//! Projection table for the reactor's derived state.
//!
//! This crate provides:
//! - [`ProjectionRecord`] and [`RecordChanges`], the row and its partial update
//! - [`ProjectionStore`], keyed point operations over those rows
//! - [`InMemoryProjectionStore`] and [`PostgresProjectionStore`]

pub mod error;
pub mod memory;
pub mod postgres;
pub mod record;
pub mod store;

pub use error::{ProjectionError, Result};
pub use memory::InMemoryProjectionStore;
pub use postgres::{DEFAULT_TABLE, PostgresProjectionStore};
pub use record::{ProjectionRecord, RecordChanges};
pub use store::{ProjectionStore, ProjectionStoreExt};
