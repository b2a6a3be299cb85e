//! Event reactor for todo completion notifications.
//!
//! The reactor keeps a small projection of active todos and, when a todo
//! with a stakeholder address is completed, notifies the stakeholder and
//! records a `stakeholder-notified` event.
//!
//! - [`ReactorLoop`] pulls events in order and commits a checkpoint after
//!   each one its handler accepts
//! - [`Dispatcher`] maps event type tags to handler kinds
//! - [`TodoCompletedNotifier`] holds the per-type business rules
//! - [`NotificationPort`] is the outbound delivery seam
//!
//! Delivery is at least once. Handlers are idempotent under replay, and on
//! completion the record is deleted only after the notification and the
//! emitted event have both succeeded, so a crash can repeat a notification
//! but never lose one.

pub mod config;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod notification;
pub mod reactor_loop;
pub mod todo;

pub use config::{ErrorPolicy, ReactorConfig};
pub use dispatcher::Dispatcher;
pub use error::{Effect, ReactorError, Result};
pub use handler::{EventHandler, Reaction};
pub use notification::{
    InMemoryNotifier, LoggingNotifier, NotificationError, NotificationPort, SentNotification,
};
pub use reactor_loop::{PollOutcome, ReactorLoop};
pub use todo::{TodoCompletedNotifier, TodoEvent, TodoEventKind};
