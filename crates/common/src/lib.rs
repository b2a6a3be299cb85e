//! Shared identifiers and injected capabilities.

pub mod clock;
pub mod types;

pub use clock::{Clock, FixedClock, SystemClock};
pub use types::AggregateId;
