//! lockbank - an in-memory account ledger with per-account locking transactions
//!
//! Every account carries its own lock. A transaction locks each account the
//! first time it reads it, works on a private snapshot, and on commit writes
//! all snapshots back before releasing the locks. Any failure before commit
//! releases the locks and leaves every balance as it was.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use lockbank::service::{AccountsService, LoggingNotifier};
//! use lockbank::storage::{Account, AccountId, InMemoryRepository};
//! use rust_decimal::Decimal;
//!
//! let service = AccountsService::new(
//!     Arc::new(InMemoryRepository::new()),
//!     Arc::new(LoggingNotifier),
//! );
//! let alice = AccountId::new("alice").unwrap();
//! let bob = AccountId::new("bob").unwrap();
//! service.create_account(Account::with_balance(alice.clone(), Decimal::from(100))).unwrap();
//! service.create_account(Account::new(bob.clone())).unwrap();
//!
//! service.transfer(&alice, &bob, Decimal::from(40)).unwrap();
//! assert_eq!(service.get_account(&bob).unwrap().balance, Decimal::from(40));
//! ```

pub mod config;
pub mod lock;
pub mod service;
pub mod storage;
pub mod transaction;

pub use config::Config;
