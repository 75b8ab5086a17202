//! storage layer for lockbank
//!
//! this module holds the canonical account records. The upper layers
//! (transaction manager, transfer service) go through the
//! [`AccountRepository`] trait and never reach into the map directly.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   AccountRepository                         │
//! │        (create-if-absent, get-or-fail, clear)               │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                     ┌─────────────────┐
//!                     │  AccountRecord  │
//!                     │ balance + lock  │
//!                     └─────────────────┘
//! ```
//!
//! # Usage
//!
//! ```
//! use lockbank::storage::{Account, AccountId, AccountRepository, InMemoryRepository};
//! use rust_decimal::Decimal;
//!
//! let repo = InMemoryRepository::new();
//! let id = AccountId::new("Id-123").unwrap();
//! repo.create(Account::with_balance(id.clone(), Decimal::from(1000))).unwrap();
//!
//! assert_eq!(repo.account(&id).unwrap().balance, Decimal::from(1000));
//! ```

mod errors;
mod record;
mod repository;
mod types;

pub use errors::{StorageError, StorageResult};
pub use record::AccountRecord;
pub use repository::{AccountRepository, InMemoryRepository};
pub use types::{Account, AccountId, InvalidIdError};
