//! Transfer notifications.
//!
//! Notifications are fire-and-forget. The service calls [`Notifier::notify`]
//! once per party after a transfer has committed and only logs failures.

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, info};

use crate::storage::{Account, AccountId};

/// A notification could not be delivered.
#[derive(Debug, Error)]
#[error("notification for account {account} not delivered: {reason}")]
pub struct NotifyError {
    /// Account the notification was meant for.
    pub account: AccountId,
    /// What went wrong.
    pub reason: String,
}

impl NotifyError {
    /// Create a delivery error.
    pub fn new(account: &AccountId, reason: impl Into<String>) -> Self {
        Self {
            account: account.clone(),
            reason: reason.into(),
        }
    }
}

/// Something that tells account holders about transfers.
pub trait Notifier: Send + Sync {
    /// Tell the holder of `account` about a transfer.
    fn notify(&self, account: &Account, message: &str) -> Result<(), NotifyError>;
}

/// Writes notifications to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LoggingNotifier;

impl Notifier for LoggingNotifier {
    fn notify(&self, account: &Account, message: &str) -> Result<(), NotifyError> {
        info!(account = %account.account_id, "sending notification: {}", message);
        Ok(())
    }
}

/// Keeps every notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(AccountId, String)>>,
}

impl RecordingNotifier {
    /// Create an empty recorder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of notifications received so far.
    pub fn count(&self) -> usize {
        self.sent.lock().len()
    }

    /// Notifications received for `account`.
    pub fn messages_for(&self, account: &AccountId) -> Vec<String> {
        self.sent
            .lock()
            .iter()
            .filter(|(id, _)| id == account)
            .map(|(_, message)| message.clone())
            .collect()
    }

    /// Everything received, in arrival order.
    pub fn sent(&self) -> Vec<(AccountId, String)> {
        self.sent.lock().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, account: &Account, message: &str) -> Result<(), NotifyError> {
        debug!(account = %account.account_id, "notification recorded");
        self.sent
            .lock()
            .push((account.account_id.clone(), message.to_string()));
        Ok(())
    }
}
