//! Storage layer error types
//!
//! All errors that can occur during account store operations are defined here.

use rust_decimal::Decimal;
use thiserror::Error;

use crate::storage::types::{AccountId, InvalidIdError};

/// the main error type for storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    /// an account with this id already exists
    #[error("account id {0} already exists")]
    DuplicateAccount(AccountId),

    /// the requested account was not found
    #[error("account does not exist for id: {0}")]
    AccountNotFound(AccountId),

    /// accounts cannot be opened with a negative balance
    #[error("account {account} cannot be created with negative balance {balance}")]
    NegativeBalance { account: AccountId, balance: Decimal },

    /// invalid account id
    #[error("invalid account id: {0}")]
    InvalidAccountId(#[from] InvalidIdError),
}

impl StorageError {
    /// check if this error indicates the account doesn't exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, StorageError::AccountNotFound(_))
    }

    /// check if this error is a uniqueness conflict
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::DuplicateAccount(_))
    }
}

/// result type alias for storage operations
pub type StorageResult<T> = Result<T, StorageError>;
