use async_trait::async_trait;

use crate::{InboundEvent, OutboundEvent, Result, SequenceNumber};

/// The upstream event log as a reactor sees it.
///
/// Implementations deliver events at least once and never reorder events
/// within the log. All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait EventLog: Send + Sync {
    /// Reads up to `limit` events positioned strictly after `after`, in
    /// ascending sequence order. `None` reads from the start of the log.
    async fn read_after(
        &self,
        after: Option<SequenceNumber>,
        limit: usize,
    ) -> Result<Vec<InboundEvent>>;

    /// Returns the last committed position for a processor, if any.
    async fn load_checkpoint(&self, processor: &str) -> Result<Option<SequenceNumber>>;

    /// Durably records that `processor` has finished with every event up to
    /// and including `position`.
    ///
    /// Checkpoints never move backwards; committing a lower position than
    /// the stored one leaves the stored one in place.
    async fn commit_checkpoint(&self, processor: &str, position: SequenceNumber) -> Result<()>;
}

/// Result of appending a reaction to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    /// The event was recorded at this position.
    Appended(SequenceNumber),

    /// An event of the same type caused by the same inbound event was
    /// already recorded; nothing was written.
    AlreadyRecorded,
}

impl AppendOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, AppendOutcome::Appended(_))
    }
}

/// Append-only destination for events a reactor produces.
#[async_trait]
pub trait EventSink: Send + Sync {
    /// Appends one event. A second append of the same reaction (same type,
    /// same `caused_by`) succeeds with [`AppendOutcome::AlreadyRecorded`].
    async fn append(&self, event: OutboundEvent) -> Result<AppendOutcome>;
}
