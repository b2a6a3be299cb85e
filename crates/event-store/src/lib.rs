//! The reactor's view of the event log.
//!
//! - [`EventLog`]: a resumable, ordered read cursor plus per-processor checkpoints
//! - [`EventSink`]: append-only destination for events a reactor emits
//! - [`InMemoryEventLog`] for tests, [`PostgresEventLog`] for production

pub mod error;
pub mod event;
pub mod log;
pub mod memory;
pub mod postgres;

pub use common::AggregateId;
pub use error::{EventStoreError, Result};
pub use event::{EventIdentity, InboundEvent, OutboundEvent, SequenceNumber};
pub use log::{AppendOutcome, EventLog, EventSink};
pub use memory::InMemoryEventLog;
pub use postgres::PostgresEventLog;
