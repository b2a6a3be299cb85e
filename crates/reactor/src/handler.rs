//! Handler trait and reaction outcomes.

use async_trait::async_trait;
use event_store::{AppendOutcome, InboundEvent};

use crate::Result;

/// What a handler did with one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reaction {
    /// A projection record was created.
    Inserted,

    /// A projection record was changed.
    Updated,

    /// A projection record was removed without further effect.
    Deleted,

    /// The stakeholder was notified, the follow-up event appended, and the
    /// record removed.
    Notified {
        address: String,
        emission: AppendOutcome,
    },

    /// A completed todo had no contact address; the record was removed and
    /// nothing was sent.
    SkippedNoContact,

    /// The projection already reflects this event (a replay).
    AlreadyApplied,

    /// No handler is registered for the event type.
    Ignored,
}

impl Reaction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reaction::Inserted => "inserted",
            Reaction::Updated => "updated",
            Reaction::Deleted => "deleted",
            Reaction::Notified { .. } => "notified",
            Reaction::SkippedNoContact => "skipped_no_contact",
            Reaction::AlreadyApplied => "already_applied",
            Reaction::Ignored => "ignored",
        }
    }
}

impl std::fmt::Display for Reaction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reacts to events pulled by a [`ReactorLoop`](crate::ReactorLoop).
///
/// Handlers must tolerate seeing the same event more than once: the loop
/// redelivers any event whose checkpoint commit did not happen.
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// Returns the name of this handler.
    fn name(&self) -> &'static str;

    /// Handles one event. An `Err` leaves the checkpoint where it was.
    async fn handle(&self, event: &InboundEvent) -> Result<Reaction>;
}
