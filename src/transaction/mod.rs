//! Transaction management for lockbank.
//!
//! This module implements pessimistic, per-account transactions.
//! The first read of an account inside a transaction takes that account's
//! lock and hands back a private snapshot; changes accumulate in the
//! snapshots. On commit the snapshots are written to the canonical records
//! and the locks are released; on rollback the locks are simply released.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   TransactionManager                        │
//! │   (begins transactions, runs bodies, tracks active tx)      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!        ┌─────────────────────┼─────────────────────┐
//!        │                     │                     │
//!        ▼                     ▼                     ▼
//!  ┌─────────────┐       ┌─────────────┐       ┌─────────────┐
//!  │ Transaction │       │  LockOrder  │       │ EntityLock  │
//!  │ (Context +  │       │             │       │ (per record)│
//!  │ save points)│       │             │       │             │
//!  └─────────────┘       └─────────────┘       └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use lockbank::storage::{Account, AccountId, AccountRepository, InMemoryRepository};
//! use lockbank::transaction::{TransactionManager, TransactionResult};
//! use rust_decimal::Decimal;
//!
//! let repo = InMemoryRepository::new();
//! let a = AccountId::new("A").unwrap();
//! repo.create(Account::with_balance(a.clone(), Decimal::from(10))).unwrap();
//!
//! let manager = TransactionManager::new(Arc::new(repo.clone()));
//! let pending = manager
//!     .run(|tx| -> TransactionResult<()> {
//!         tx.read(&a)?.credit(Decimal::from(5))?;
//!         Ok(())
//!     })
//!     .unwrap();
//! pending.commit();
//!
//! assert_eq!(repo.account(&a).unwrap().balance, Decimal::from(15));
//! ```

mod context;
mod error;
mod manager;
mod ordering;

pub use context::{Snapshot, Transaction, TransactionMetadata, TxAborted, TxActive, TxCommitted};
pub use error::{TransactionError, TransactionResult};
pub use manager::{PendingCommit, TransactionManager};
pub use ordering::LockOrder;
