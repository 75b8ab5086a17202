//! The canonical account record held by the store.
//!
//! A record pairs the authoritative balance with the account's entity lock.
//! The balance sits behind its own short-lived `RwLock` so that plain,
//! non-transactional reads never wait on the entity lock; only a
//! transaction that holds the entity lock ever writes the balance.

use parking_lot::RwLock;
use rust_decimal::Decimal;

use crate::lock::EntityLock;
use crate::storage::types::{Account, AccountId};

/// The single authoritative copy of an account.
#[derive(Debug)]
pub struct AccountRecord {
    id: AccountId,
    balance: RwLock<Decimal>,
    lock: EntityLock,
}

impl AccountRecord {
    /// build the canonical record for a freshly created account
    pub(crate) fn new(account: Account) -> Self {
        Self {
            id: account.account_id,
            balance: RwLock::new(account.balance),
            lock: EntityLock::new(),
        }
    }

    /// the account id
    pub fn id(&self) -> &AccountId {
        &self.id
    }

    /// the committed balance right now
    pub fn balance(&self) -> Decimal {
        *self.balance.read()
    }

    /// copy the current state out as a plain [`Account`]
    pub fn to_account(&self) -> Account {
        Account::with_balance(self.id.clone(), self.balance())
    }

    /// the lock guarding this account
    pub fn lock(&self) -> &EntityLock {
        &self.lock
    }

    /// Overwrite the committed balance.
    ///
    /// Only the commit path calls this, while holding `self.lock`.
    pub(crate) fn store_balance(&self, balance: Decimal) {
        *self.balance.write() = balance;
    }
}
