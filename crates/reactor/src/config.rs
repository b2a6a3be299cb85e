//! Reactor loop configuration.

use std::str::FromStr;
use std::time::Duration;

/// What the loop does with an event whose body cannot be decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorPolicy {
    /// Stop the loop and return the error. The checkpoint stays before the
    /// bad event.
    #[default]
    Halt,

    /// Log the event, count it, and move the checkpoint past it.
    Skip,
}

impl ErrorPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorPolicy::Halt => "halt",
            ErrorPolicy::Skip => "skip",
        }
    }
}

impl std::fmt::Display for ErrorPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ErrorPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "halt" => Ok(ErrorPolicy::Halt),
            "skip" => Ok(ErrorPolicy::Skip),
            other => Err(format!("unknown error policy '{other}', expected halt or skip")),
        }
    }
}

/// Configuration for a [`ReactorLoop`](crate::ReactorLoop).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReactorConfig {
    /// Name the checkpoint is stored under.
    pub processor_name: String,

    /// Maximum events fetched per poll.
    pub batch_size: usize,

    /// Pause between polls when the log is drained or a poll stalled.
    pub poll_interval: Duration,

    /// Handling of malformed events.
    pub on_malformed: ErrorPolicy,
}

impl ReactorConfig {
    pub const DEFAULT_PROCESSOR_NAME: &'static str = "todo_completed_notifier";

    pub fn new(processor_name: impl Into<String>) -> Self {
        Self {
            processor_name: processor_name.into(),
            ..Self::default()
        }
    }

    /// Sets the batch size. Zero is raised to one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_error_policy(mut self, on_malformed: ErrorPolicy) -> Self {
        self.on_malformed = on_malformed;
        self
    }
}

impl Default for ReactorConfig {
    fn default() -> Self {
        Self {
            processor_name: Self::DEFAULT_PROCESSOR_NAME.to_string(),
            batch_size: 100,
            poll_interval: Duration::from_millis(500),
            on_malformed: ErrorPolicy::Halt,
        }
    }
}
