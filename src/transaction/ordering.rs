//! Lock acquisition order.
//!
//! lockbank supports two orders for taking several account locks up front:
//! - ById: ascending account id, whatever role the account plays
//! - FirstRead: the order the caller names the accounts in

use std::fmt;

/// Order in which [`Transaction::lock_all`](crate::transaction::Transaction::lock_all)
/// takes account locks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LockOrder {
    /// Global order by account id.
    ///
    /// Two transactions that need the same pair of accounts always queue on
    /// the same account first, so opposite-direction transfers between a
    /// pair cannot deadlock.
    #[default]
    ById,

    /// Caller order (debit side first for transfers).
    ///
    /// Two concurrent transfers in opposite directions between the same
    /// accounts can each hold one lock and wait forever for the other.
    /// Pair it with a lock timeout.
    FirstRead,
}

impl fmt::Display for LockOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LockOrder::ById => write!(f, "by-id"),
            LockOrder::FirstRead => write!(f, "first-read"),
        }
    }
}

impl std::str::FromStr for LockOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "by-id" | "by_id" | "byid" | "id" => Ok(LockOrder::ById),
            "first-read" | "first_read" | "firstread" | "read" => Ok(LockOrder::FirstRead),
            _ => Err(format!("unknown lock order: {}", s)),
        }
    }
}
