//! Todo event tags and body decoding.

use chrono::{DateTime, Utc};
use event_store::InboundEvent;
use projections::RecordChanges;
use serde::{Deserialize, Deserializer, Serialize};

use crate::dispatcher::Dispatcher;
use crate::{ReactorError, Result};

pub const TODO_ADDED: &str = "todo_added";
pub const TODO_AMENDED: &str = "todo_amended";
pub const TODO_ABANDONED: &str = "todo_abandoned";
pub const TODO_COMPLETED: &str = "todo_completed";

/// Type tag of the event recorded after a stakeholder is notified.
pub const STAKEHOLDER_NOTIFIED: &str = "stakeholder-notified";

/// The todo events this reactor handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TodoEventKind {
    /// Creates the projection record.
    Added,
    /// Changes title and/or stakeholder address.
    Amended,
    /// Terminal: removes the record silently.
    Abandoned,
    /// Terminal: notifies, emits, removes.
    Completed,
}

impl TodoEventKind {
    /// The default tag for each kind.
    pub fn routes() -> [(&'static str, TodoEventKind); 4] {
        [
            (TODO_ADDED, TodoEventKind::Added),
            (TODO_AMENDED, TodoEventKind::Amended),
            (TODO_ABANDONED, TodoEventKind::Abandoned),
            (TODO_COMPLETED, TodoEventKind::Completed),
        ]
    }

    /// A dispatcher over [`TodoEventKind::routes`].
    pub fn dispatcher() -> Result<Dispatcher<TodoEventKind>> {
        Dispatcher::from_routes(Self::routes())
    }
}

/// A decoded todo event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TodoEvent {
    Added {
        title: Option<String>,
        stakeholder_email: Option<String>,
    },
    Amended(RecordChanges),
    Abandoned,
    Completed,
}

#[derive(Debug, Deserialize)]
struct TodoAddedBody {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    stakeholder_email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TodoAmendedBody {
    #[serde(default, deserialize_with = "present")]
    title: Option<Option<String>>,
    #[serde(default, deserialize_with = "present")]
    stakeholder_email: Option<Option<String>>,
}

/// Distinguishes an explicit `null` from a missing field.
fn present<'de, D, T>(deserializer: D) -> std::result::Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    T::deserialize(deserializer).map(Some)
}

impl TodoEvent {
    /// Decodes the body of `event` as `kind`.
    ///
    /// Terminal events carry nothing the reactor needs, so their bodies are
    /// not inspected.
    pub fn decode(kind: TodoEventKind, event: &InboundEvent) -> Result<Self> {
        match kind {
            TodoEventKind::Added => {
                let body: TodoAddedBody = decode_body(event)?;
                Ok(TodoEvent::Added {
                    title: body.title,
                    stakeholder_email: body.stakeholder_email,
                })
            }
            TodoEventKind::Amended => {
                let body: TodoAmendedBody = decode_body(event)?;
                let mut changes = RecordChanges::new();
                if let Some(title) = body.title {
                    changes = changes.title(title);
                }
                if let Some(stakeholder_email) = body.stakeholder_email {
                    changes = changes.contact_address(stakeholder_email);
                }
                Ok(TodoEvent::Amended(changes))
            }
            TodoEventKind::Abandoned => Ok(TodoEvent::Abandoned),
            TodoEventKind::Completed => Ok(TodoEvent::Completed),
        }
    }
}

fn decode_body<T: for<'de> Deserialize<'de>>(event: &InboundEvent) -> Result<T> {
    if !event.body.is_object() {
        return Err(malformed(event, "body is not a JSON object".to_string()));
    }
    T::deserialize(&event.body).map_err(|e| malformed(event, e.to_string()))
}

fn malformed(event: &InboundEvent, reason: String) -> ReactorError {
    ReactorError::MalformedEvent {
        identity: event.identity(),
        event_type: event.event_type.clone(),
        reason,
    }
}

/// Body of a `stakeholder-notified` event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakeholderNotified {
    pub notified_at: DateTime<Utc>,
}

/// The message sent when a todo is completed.
///
/// An untitled todo gets the message without a name.
pub fn completion_message(title: Option<&str>) -> String {
    match title.map(str::trim).filter(|t| !t.is_empty()) {
        Some(title) => format!("Your todo item {title} has been completed!"),
        None => "Your todo item has been completed!".to_string(),
    }
}
