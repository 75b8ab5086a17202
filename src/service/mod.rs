//! Account service layer.
//!
//! This module provides the user-facing API: opening accounts, looking them
//! up and moving money between them. Transfers run through the
//! [`TransactionManager`](crate::transaction::TransactionManager) and notify
//! both account holders once they have committed.

mod accounts;
mod error;
mod notify;

pub use accounts::{AccountsService, TransferReceipt};
pub use error::{TransferError, TransferResult};
pub use notify::{LoggingNotifier, Notifier, NotifyError, RecordingNotifier};
