//! Transaction error types.

use thiserror::Error;

use crate::storage::{AccountId, StorageError};

/// Result type for transaction operations.
pub type TransactionResult<T> = Result<T, TransactionError>;

/// Errors that can occur during transaction operations.
#[derive(Debug, Error)]
pub enum TransactionError {
    /// Storage layer error.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The account's lock could not be taken within the configured timeout.
    #[error("timed out after {waited_ms}ms waiting for the lock on account {account}")]
    LockTimeout {
        account: AccountId,
        waited_ms: u128,
    },

    /// A credit or debit would take the balance outside the decimal range.
    #[error("balance of account {account} overflows")]
    BalanceOverflow { account: AccountId },
}

impl TransactionError {
    /// Check if the transaction failed because an account does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, TransactionError::Storage(e) if e.is_not_found())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let account = AccountId::new("Id-1").unwrap();

        let timeout = TransactionError::LockTimeout {
            account: account.clone(),
            waited_ms: 50,
        };
        assert!(!timeout.is_not_found());

        let missing = TransactionError::from(StorageError::AccountNotFound(account.clone()));
        assert!(missing.is_not_found());
        assert_eq!(missing.to_string(), "account does not exist for id: Id-1");

        let overflow = TransactionError::BalanceOverflow { account };
        assert!(!overflow.is_not_found());
        assert_eq!(overflow.to_string(), "balance of account Id-1 overflows");
    }
}
