//! Todo completion notifications.

pub mod events;
pub mod notifier;

pub use events::{
    STAKEHOLDER_NOTIFIED, StakeholderNotified, TODO_ABANDONED, TODO_ADDED, TODO_AMENDED,
    TODO_COMPLETED, TodoEvent, TodoEventKind, completion_message,
};
pub use notifier::TodoCompletedNotifier;
