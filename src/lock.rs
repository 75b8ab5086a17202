//! Per-account mutual exclusion.
//!
//! Every canonical account record carries exactly one [`EntityLock`]. It is
//! created together with the record and lives as long as the record does.
//! Acquiring it hands back an owned [`LockGuard`]; the only way to release
//! the lock is to drop that guard, so releasing twice or releasing a lock
//! you never held cannot be written.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use tracing::debug;

use crate::storage::AccountId;

/// The lock bound to a single account.
///
/// Cloning shares the same underlying mutex.
#[derive(Clone, Default)]
pub struct EntityLock {
    mutex: Arc<Mutex<()>>,
}

impl EntityLock {
    /// Create a fresh, unheld lock.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is free, then take it.
    pub fn acquire(&self, account: &AccountId) -> LockGuard {
        let raw = self.mutex.lock_arc();
        debug!(account = %account, "lock acquired");
        LockGuard {
            account: account.clone(),
            _raw: raw,
        }
    }

    /// Try to take the lock, giving up after `timeout`.
    pub fn acquire_for(&self, account: &AccountId, timeout: Duration) -> Option<LockGuard> {
        let raw = self.mutex.try_lock_arc_for(timeout)?;
        debug!(account = %account, "lock acquired");
        Some(LockGuard {
            account: account.clone(),
            _raw: raw,
        })
    }

    /// Take the lock only if nobody holds it right now.
    pub fn try_acquire(&self, account: &AccountId) -> Option<LockGuard> {
        let raw = self.mutex.try_lock_arc()?;
        debug!(account = %account, "lock acquired");
        Some(LockGuard {
            account: account.clone(),
            _raw: raw,
        })
    }

    /// Whether some transaction currently holds this lock.
    pub fn is_locked(&self) -> bool {
        self.mutex.is_locked()
    }
}

impl fmt::Debug for EntityLock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityLock")
            .field("locked", &self.is_locked())
            .finish()
    }
}

/// Proof of holding an account's lock. Dropping it releases the lock.
pub struct LockGuard {
    account: AccountId,
    _raw: ArcMutexGuard<RawMutex, ()>,
}

impl LockGuard {
    /// The account this guard locks.
    pub fn account(&self) -> &AccountId {
        &self.account
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        debug!(account = %self.account, "lock released");
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard")
            .field("account", &self.account)
            .finish()
    }
}
