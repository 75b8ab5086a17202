//! Account repository.
//!
//! The repository is the sole long-term owner of every canonical
//! [`AccountRecord`]. It is a concurrent map and nothing more: it never
//! touches entity locks, that is the transaction manager's job.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use tracing::debug;

use crate::storage::errors::{StorageError, StorageResult};
use crate::storage::record::AccountRecord;
use crate::storage::types::{Account, AccountId};

/// A concurrent store of canonical account records.
pub trait AccountRepository: Send + Sync {
    /// Insert `account` unless its id is already taken.
    fn create(&self, account: Account) -> StorageResult<()>;

    /// Get the canonical record for `id`.
    fn get(&self, id: &AccountId) -> StorageResult<Arc<AccountRecord>>;

    /// Remove every account.
    fn clear(&self);

    /// Number of stored accounts.
    fn len(&self) -> usize;

    /// All stored ids, sorted.
    fn ids(&self) -> Vec<AccountId>;

    /// Current committed state of `id` as a plain value.
    fn account(&self, id: &AccountId) -> StorageResult<Account> {
        self.get(id).map(|record| record.to_account())
    }

    /// Whether the store is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all committed balances, or `None` if it overflows.
    fn total_balance(&self) -> Option<Decimal> {
        self.ids()
            .iter()
            .filter_map(|id| self.get(id).ok())
            .try_fold(Decimal::ZERO, |total, record| {
                total.checked_add(record.balance())
            })
    }
}

/// In-memory repository backed by a `HashMap`.
///
/// Clone this to share across threads - it uses Arc internally.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    accounts: Arc<RwLock<HashMap<AccountId, Arc<AccountRecord>>>>,
}

impl InMemoryRepository {
    /// Create an empty repository.
    pub fn new() -> Self {
        Self::default()
    }
}

impl AccountRepository for InMemoryRepository {
    fn create(&self, account: Account) -> StorageResult<()> {
        if account.balance < Decimal::ZERO {
            return Err(StorageError::NegativeBalance {
                account: account.account_id,
                balance: account.balance,
            });
        }

        let mut accounts = self.accounts.write();
        if accounts.contains_key(&account.account_id) {
            return Err(StorageError::DuplicateAccount(account.account_id));
        }

        debug!(account = %account.account_id, balance = %account.balance, "account created");
        accounts.insert(
            account.account_id.clone(),
            Arc::new(AccountRecord::new(account)),
        );
        Ok(())
    }

    fn get(&self, id: &AccountId) -> StorageResult<Arc<AccountRecord>> {
        self.accounts
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StorageError::AccountNotFound(id.clone()))
    }

    fn clear(&self) {
        self.accounts.write().clear();
    }

    fn len(&self) -> usize {
        self.accounts.read().len()
    }

    fn ids(&self) -> Vec<AccountId> {
        let mut ids: Vec<_> = self.accounts.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl std::fmt::Debug for InMemoryRepository {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryRepository")
            .field("accounts", &self.len())
            .finish()
    }
}
