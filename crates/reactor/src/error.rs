//! Reactor error types.

use event_store::{EventIdentity, EventStoreError};
use projections::ProjectionError;
use thiserror::Error;

/// The outbound effect that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Effect {
    Notification,
    Emission,
}

impl std::fmt::Display for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Effect::Notification => write!(f, "notification"),
            Effect::Emission => write!(f, "emission"),
        }
    }
}

/// Errors that can occur while reacting to an event.
#[derive(Debug, Error)]
pub enum ReactorError {
    /// The event body is missing a field or has one of the wrong type.
    #[error("Malformed {event_type} event {identity}: {reason}")]
    MalformedEvent {
        identity: EventIdentity,
        event_type: String,
        reason: String,
    },

    /// Notifying the stakeholder or emitting the follow-up event failed.
    /// The projection record is left in place so the unit is retried.
    #[error("{effect} failed for event {identity}: {reason}")]
    EffectFailure {
        effect: Effect,
        identity: EventIdentity,
        reason: String,
    },

    /// Projection store error.
    #[error("Projection error: {0}")]
    Projection(#[from] ProjectionError),

    /// Event log error.
    #[error("Event log error: {0}")]
    EventLog(#[from] EventStoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Two handlers were registered for one event type.
    #[error("Event type '{0}' is already registered")]
    DuplicateRegistration(String),
}

impl ReactorError {
    pub fn is_malformed(&self) -> bool {
        matches!(self, ReactorError::MalformedEvent { .. })
    }

    pub fn is_effect_failure(&self) -> bool {
        matches!(self, ReactorError::EffectFailure { .. })
    }
}

/// Convenience type alias for reactor results.
pub type Result<T> = std::result::Result<T, ReactorError>;
