//! Transaction manager configuration.

use std::time::Duration;

use crate::transaction::LockOrder;

/// Configuration for a [`TransactionManager`](crate::transaction::TransactionManager).
#[derive(Debug, Clone)]
pub struct Config {
    /// Commit as soon as a `run` body succeeds instead of handing the
    /// decision back to the caller.
    pub auto_commit: bool,

    /// Order used when a transaction locks several accounts up front.
    pub lock_order: LockOrder,

    /// How long a read waits for an account lock (None = wait forever).
    pub lock_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            auto_commit: false,
            lock_order: LockOrder::default(),
            lock_timeout: None,
        }
    }
}

impl Config {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set auto_commit flag.
    #[must_use]
    pub fn auto_commit(mut self, value: bool) -> Self {
        self.auto_commit = value;
        self
    }

    /// Set the lock acquisition order.
    #[must_use]
    pub fn lock_order(mut self, order: LockOrder) -> Self {
        self.lock_order = order;
        self
    }

    /// Set the lock wait timeout.
    #[must_use]
    pub fn lock_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.lock_timeout = timeout;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(!config.auto_commit);
        assert_eq!(config.lock_order, LockOrder::ById);
        assert!(config.lock_timeout.is_none());
    }

    #[test]
    fn builder_pattern() {
        let config = Config::new()
            .auto_commit(true)
            .lock_order(LockOrder::FirstRead)
            .lock_timeout(Some(Duration::from_millis(250)));

        assert!(config.auto_commit);
        assert_eq!(config.lock_order, LockOrder::FirstRead);
        assert_eq!(config.lock_timeout, Some(Duration::from_millis(250)));
    }
}
