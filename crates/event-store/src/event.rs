use serde::{Deserialize, Serialize};

use crate::AggregateId;

/// Position of an event in the log.
///
/// Sequence numbers start at 1 and increase by one per appended event, across
/// all aggregates. Per-aggregate order follows from the global order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SequenceNumber(i64);

impl SequenceNumber {
    pub fn new(value: i64) -> Self {
        Self(value)
    }

    /// The position of the first event in a log.
    pub fn first() -> Self {
        Self(1)
    }

    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    pub fn as_i64(&self) -> i64 {
        self.0
    }
}

impl std::fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i64> for SequenceNumber {
    fn from(value: i64) -> Self {
        Self(value)
    }
}

impl From<SequenceNumber> for i64 {
    fn from(sequence: SequenceNumber) -> Self {
        sequence.0
    }
}

/// Identity of an inbound event: which aggregate, and where in the log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventIdentity {
    pub aggregate_id: AggregateId,
    pub sequence_number: SequenceNumber,
}

impl std::fmt::Display for EventIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}@{}", self.aggregate_id, self.sequence_number)
    }
}

/// An event read from the upstream log. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundEvent {
    /// The aggregate (todo) this event is about.
    pub aggregate_id: AggregateId,

    /// The type tag, e.g. `todo_added`.
    pub event_type: String,

    /// Event fields as a JSON object.
    pub body: serde_json::Value,

    /// Position in the log.
    pub sequence_number: SequenceNumber,
}

impl InboundEvent {
    pub fn new(
        aggregate_id: AggregateId,
        event_type: impl Into<String>,
        sequence_number: SequenceNumber,
        body: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_id,
            event_type: event_type.into(),
            body,
            sequence_number,
        }
    }

    pub fn identity(&self) -> EventIdentity {
        EventIdentity {
            aggregate_id: self.aggregate_id,
            sequence_number: self.sequence_number,
        }
    }
}

/// An event produced by a reactor in response to an inbound event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutboundEvent {
    pub aggregate_id: AggregateId,
    pub event_type: String,
    pub body: serde_json::Value,

    /// The inbound event this one reacts to. The sink uses it, together with
    /// `event_type`, to refuse a second copy of the same reaction.
    pub caused_by: EventIdentity,
}

impl OutboundEvent {
    /// Creates a reaction to `cause` on the same aggregate.
    pub fn reacting_to(
        cause: &InboundEvent,
        event_type: impl Into<String>,
        body: serde_json::Value,
    ) -> Self {
        Self {
            aggregate_id: cause.aggregate_id,
            event_type: event_type.into(),
            body,
            caused_by: cause.identity(),
        }
    }

    /// Checks the event is fit to append.
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.event_type.trim().is_empty() {
            return Err("event_type must not be empty".to_string());
        }
        if !self.body.is_object() {
            return Err(format!(
                "body of {} must be a JSON object",
                self.event_type
            ));
        }
        Ok(())
    }
}
