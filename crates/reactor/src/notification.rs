//! Notification port and its implementations.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

/// Errors a notification transport can report.
#[derive(Debug, Error)]
pub enum NotificationError {
    /// The address was refused before any delivery attempt.
    #[error("Invalid address: {0:?}")]
    InvalidAddress(String),

    /// Delivery was attempted and failed.
    #[error("Delivery to {address} failed: {reason}")]
    Delivery { address: String, reason: String },
}

/// One-way delivery of a message to an external party.
///
/// Implementations only report success or failure. Avoiding duplicate
/// deliveries is the caller's job.
#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotificationError>;
}

#[async_trait]
impl<T: NotificationPort + ?Sized> NotificationPort for Arc<T> {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotificationError> {
        (**self).send(address, message).await
    }
}

/// Writes each notification to the log instead of delivering it.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingNotifier;

#[async_trait]
impl NotificationPort for LoggingNotifier {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotificationError> {
        if address.trim().is_empty() {
            return Err(NotificationError::InvalidAddress(address.to_string()));
        }
        tracing::info!(to = %address, %message, "email sent");
        Ok(())
    }
}

/// A notification captured by [`InMemoryNotifier`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub address: String,
    pub message: String,
}

#[derive(Debug, Default)]
struct InMemoryNotifierState {
    sent: Vec<SentNotification>,
    fail_on_send: bool,
    attempts: usize,
}

/// In-memory notifier for testing. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct InMemoryNotifier {
    state: Arc<Mutex<InMemoryNotifierState>>,
}

impl InMemoryNotifier {
    /// Creates a new in-memory notifier.
    pub fn new() -> Self {
        Self::default()
    }

    /// Configures the notifier to fail every send until switched off.
    pub fn set_fail_on_send(&self, fail: bool) {
        self.lock().fail_on_send = fail;
    }

    /// Returns the successfully delivered notifications, oldest first.
    pub fn sent(&self) -> Vec<SentNotification> {
        self.lock().sent.clone()
    }

    /// Returns the number of successful deliveries.
    pub fn sent_count(&self) -> usize {
        self.lock().sent.len()
    }

    /// Returns the number of send calls, failed ones included.
    pub fn attempts(&self) -> usize {
        self.lock().attempts
    }

    fn lock(&self) -> MutexGuard<'_, InMemoryNotifierState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl NotificationPort for InMemoryNotifier {
    async fn send(&self, address: &str, message: &str) -> Result<(), NotificationError> {
        let mut state = self.lock();
        state.attempts += 1;

        if state.fail_on_send {
            return Err(NotificationError::Delivery {
                address: address.to_string(),
                reason: "mail relay unavailable".to_string(),
            });
        }

        state.sent.push(SentNotification {
            address: address.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
