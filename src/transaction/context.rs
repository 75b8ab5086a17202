//! Transaction context using typestate pattern.
//!
//! A `Transaction` is an explicit value owned by whoever runs it. It holds
//! one save point per account it has read: the transaction-private
//! [`Snapshot`], the canonical record it was taken from, and the guard for
//! that record's lock. The typestate ensures at compile time that:
//! - Only active transactions can read accounts
//! - Committed/aborted transactions cannot be reused
//! - Every lock is released exactly once, on every exit path

use std::marker::PhantomData;
use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, info, warn};

use crate::lock::LockGuard;
use crate::storage::{AccountId, AccountRecord};
use crate::transaction::error::{TransactionError, TransactionResult};
use crate::transaction::manager::TransactionManager;
use crate::transaction::ordering::LockOrder;

/// Marker type for active transactions.
#[derive(Debug)]
pub struct TxActive;

/// Marker type for committed transactions.
#[derive(Debug)]
pub struct TxCommitted;

/// Marker type for aborted transactions.
#[derive(Debug)]
pub struct TxAborted;

/// Transaction metadata stored in the manager.
#[derive(Debug, Clone)]
pub struct TransactionMetadata {
    /// Unique transaction ID.
    pub tx_id: String,
    /// Lock order this transaction uses for `lock_all`.
    pub lock_order: LockOrder,
    /// When the transaction started.
    pub started_at: chrono::DateTime<chrono::Utc>,
}

/// A transaction-private copy of one account's balance.
///
/// Snapshots are handed out by reference and are deliberately not `Clone`:
/// the value that gets committed is the one in the save point, so mutate
/// the snapshot you were given.
#[derive(Debug)]
pub struct Snapshot {
    account_id: AccountId,
    balance: Decimal,
    original: Decimal,
}

impl Snapshot {
    fn of(record: &AccountRecord) -> Self {
        let balance = record.balance();
        Self {
            account_id: record.id().clone(),
            balance,
            original: balance,
        }
    }

    /// The account this snapshot belongs to.
    pub fn id(&self) -> &AccountId {
        &self.account_id
    }

    /// Balance as seen (and modified) by this transaction.
    pub fn balance(&self) -> Decimal {
        self.balance
    }

    /// Balance when the lock was taken.
    pub fn original_balance(&self) -> Decimal {
        self.original
    }

    /// Replace the buffered balance.
    pub fn set_balance(&mut self, balance: Decimal) {
        self.balance = balance;
    }

    /// Add `amount` to the buffered balance.
    ///
    /// On overflow the snapshot is left unchanged.
    pub fn credit(&mut self, amount: Decimal) -> TransactionResult<Decimal> {
        self.apply(self.balance.checked_add(amount))
    }

    /// Subtract `amount` from the buffered balance. No funds check.
    pub fn debit(&mut self, amount: Decimal) -> TransactionResult<Decimal> {
        self.apply(self.balance.checked_sub(amount))
    }

    fn apply(&mut self, balance: Option<Decimal>) -> TransactionResult<Decimal> {
        let balance = balance.ok_or_else(|| TransactionError::BalanceOverflow {
            account: self.account_id.clone(),
        })?;
        self.balance = balance;
        Ok(balance)
    }

    /// Whether this transaction changed the balance.
    pub fn is_dirty(&self) -> bool {
        self.balance != self.original
    }
}

/// One account touched by a transaction.
struct SavePoint {
    snapshot: Snapshot,
    record: Arc<AccountRecord>,
    // Dropped after the write-back on commit, or alone on rollback.
    _guard: LockGuard,
}

/// A transaction with typestate for lifecycle safety.
///
/// The `State` parameter tracks whether the transaction is:
/// - `TxActive`: Can read accounts and buffer changes
/// - `TxCommitted`: Changes applied, locks released
/// - `TxAborted`: Changes discarded, locks released
///
/// Dropping an active transaction rolls it back. Active transactions hold
/// lock guards and therefore stay on the thread that opened them.
pub struct Transaction<State> {
    pub(crate) metadata: TransactionMetadata,
    manager: TransactionManager,
    save_points: Vec<SavePoint>,
    touched: Vec<AccountId>,
    open: bool,
    _state: PhantomData<State>,
}

impl<State> Transaction<State> {
    /// Get the transaction ID.
    pub fn id(&self) -> &str {
        &self.metadata.tx_id
    }

    /// Get the lock order.
    pub fn lock_order(&self) -> LockOrder {
        self.metadata.lock_order
    }

    /// Accounts read by this transaction, in lock acquisition order.
    pub fn touched(&self) -> &[AccountId] {
        &self.touched
    }

    fn finish<Next>(&mut self) -> Transaction<Next> {
        self.open = false;
        self.manager.mark_completed(&self.metadata.tx_id);
        Transaction {
            metadata: self.metadata.clone(),
            manager: self.manager.clone(),
            save_points: Vec::new(),
            touched: std::mem::take(&mut self.touched),
            open: false,
            _state: PhantomData,
        }
    }

    fn discard(&mut self) -> usize {
        let released = self.save_points.len();
        self.save_points.clear();
        released
    }
}

impl Transaction<TxActive> {
    /// Create a new active transaction.
    pub(crate) fn new(manager: TransactionManager, tx_id: String, lock_order: LockOrder) -> Self {
        Self {
            metadata: TransactionMetadata {
                tx_id,
                lock_order,
                started_at: chrono::Utc::now(),
            },
            manager,
            save_points: Vec::new(),
            touched: Vec::new(),
            open: true,
            _state: PhantomData,
        }
    }

    /// Read an account inside this transaction.
    ///
    /// The first read of an account blocks until its lock is free, takes a
    /// snapshot of the committed balance and records a save point. Later
    /// reads of the same account return that same snapshot.
    pub fn read(&mut self, id: &AccountId) -> TransactionResult<&mut Snapshot> {
        let idx = match self.position(id) {
            Some(idx) => idx,
            None => self.open_save_point(id)?,
        };
        Ok(&mut self.save_points[idx].snapshot)
    }

    /// Lock several accounts before reading them.
    ///
    /// With [`LockOrder::ById`] the locks are taken in ascending id order.
    /// Call this before any `read` for that order to be global.
    pub fn lock_all(&mut self, ids: &[AccountId]) -> TransactionResult<()> {
        let mut order: Vec<&AccountId> = ids.iter().collect();
        if self.metadata.lock_order == LockOrder::ById {
            order.sort();
        }

        for id in order {
            if self.position(id).is_none() {
                self.open_save_point(id)?;
            }
        }
        Ok(())
    }

    /// Whether this transaction already holds `id`'s lock.
    pub fn holds(&self, id: &AccountId) -> bool {
        self.position(id).is_some()
    }

    /// Number of save points.
    pub fn save_point_count(&self) -> usize {
        self.save_points.len()
    }

    fn position(&self, id: &AccountId) -> Option<usize> {
        self.save_points
            .iter()
            .position(|sp| sp.snapshot.id() == id)
    }

    fn open_save_point(&mut self, id: &AccountId) -> TransactionResult<usize> {
        let record = self.manager.repo().get(id)?;
        let guard = self.manager.acquire(&record)?;
        // Snapshot only once the lock is ours.
        let snapshot = Snapshot::of(&record);

        debug!(
            tx = %self.metadata.tx_id,
            account = %id,
            balance = %snapshot.balance(),
            "save point opened"
        );

        self.touched.push(id.clone());
        self.save_points.push(SavePoint {
            snapshot,
            record,
            _guard: guard,
        });
        Ok(self.save_points.len() - 1)
    }

    /// Commit the transaction.
    ///
    /// Every snapshot balance is written to its canonical record while all
    /// locks are still held, then all locks are released together.
    pub fn commit(mut self) -> Transaction<TxCommitted> {
        let save_points = std::mem::take(&mut self.save_points);
        for sp in &save_points {
            sp.record.store_balance(sp.snapshot.balance());
        }
        let accounts = save_points.len();
        drop(save_points);

        info!(tx = %self.metadata.tx_id, accounts, "transaction committed");
        self.finish()
    }

    /// Rollback the transaction.
    ///
    /// Locks are released and no snapshot value is written back.
    pub fn rollback(mut self) -> Transaction<TxAborted> {
        let released = self.discard();
        warn!(tx = %self.metadata.tx_id, released, "transaction rolled back");
        self.finish()
    }
}

impl Transaction<TxCommitted> {
    /// Check if the transaction committed.
    pub fn is_committed(&self) -> bool {
        true
    }
}

impl Transaction<TxAborted> {
    /// Check if the transaction was rolled back.
    pub fn was_rolled_back(&self) -> bool {
        true
    }
}

impl<State> Drop for Transaction<State> {
    fn drop(&mut self) {
        if self.open {
            let released = self.discard();
            warn!(
                tx = %self.metadata.tx_id,
                released,
                "active transaction dropped, rolled back"
            );
            self.open = false;
            self.manager.mark_completed(&self.metadata.tx_id);
        }
    }
}

impl<State> std::fmt::Debug for Transaction<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.metadata.tx_id)
            .field("touched", &self.touched)
            .field("open", &self.open)
            .finish()
    }
}
