//! Transfer service error types.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::storage::{AccountId, StorageError};
use crate::transaction::TransactionError;

/// Result type for service operations.
pub type TransferResult<T> = Result<T, TransferError>;

/// Errors surfaced by [`AccountsService`](crate::service::AccountsService).
#[derive(Debug, Error)]
pub enum TransferError {
    /// The transfer request itself is malformed. Raised before any lock is taken.
    #[error("{0}")]
    InvalidTransfer(String),

    /// The debit side cannot cover the amount.
    #[error("insufficient balance in account {account}: balance {balance}, requested {requested}")]
    InsufficientBalance {
        account: AccountId,
        balance: Decimal,
        requested: Decimal,
    },

    /// Transaction layer error.
    #[error(transparent)]
    Transaction(#[from] TransactionError),

    /// Storage layer error.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl TransferError {
    /// Creates the error for a transfer whose two sides are the same account.
    pub fn same_account(from: &AccountId, to: &AccountId) -> Self {
        Self::InvalidTransfer(format!(
            "cannot transfer to same account : FROM_ACCOUNT [{}] TO_ACCOUNT [{}]",
            from, to
        ))
    }

    /// Creates the error for a zero or negative amount.
    pub fn invalid_amount(amount: Decimal) -> Self {
        Self::InvalidTransfer(format!("invalid transfer amount [{}]", amount))
    }

    /// Check if an account involved in the request does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            TransferError::Storage(e) => e.is_not_found(),
            TransferError::Transaction(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Check if an account id was already taken.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, TransferError::Storage(e) if e.is_conflict())
    }
}
