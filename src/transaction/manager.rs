//! Transaction manager - coordinates all transaction operations.
//!
//! The TransactionManager is the main entry point for transactions.
//! It handles:
//! - Transaction creation and lifecycle
//! - Tracking active transactions
//! - Lock acquisition with the configured timeout
//! - Running transaction bodies with rollback on failure

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;
use ulid::Ulid;

use crate::config::Config;
use crate::lock::LockGuard;
use crate::storage::{Account, AccountId, AccountRecord, AccountRepository};
use crate::transaction::context::{Transaction, TransactionMetadata, TxActive};
use crate::transaction::error::{TransactionError, TransactionResult};

/// Transaction manager - coordinates all transaction operations.
///
/// Thread-safe: can be shared across threads via Clone (uses Arc internally).
#[derive(Clone)]
pub struct TransactionManager {
    inner: Arc<TransactionManagerInner>,
}

struct TransactionManagerInner {
    /// The underlying account store.
    repo: Arc<dyn AccountRepository>,
    config: Config,
    /// Active transactions tracked by ID.
    active: RwLock<HashMap<String, TransactionMetadata>>,
}

impl TransactionManager {
    /// Create a new transaction manager with the default configuration.
    pub fn new(repo: Arc<dyn AccountRepository>) -> Self {
        Self::with_config(repo, Config::default())
    }

    /// Create a new transaction manager with the given configuration.
    pub fn with_config(repo: Arc<dyn AccountRepository>, config: Config) -> Self {
        Self {
            inner: Arc::new(TransactionManagerInner {
                repo,
                config,
                active: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Get a reference to the underlying store.
    pub fn repo(&self) -> &dyn AccountRepository {
        self.inner.repo.as_ref()
    }

    /// Get the configuration.
    pub fn config(&self) -> &Config {
        &self.inner.config
    }

    /// Begin a new transaction.
    pub fn begin(&self) -> Transaction<TxActive> {
        let tx_id = Ulid::new().to_string().to_lowercase();
        let tx = Transaction::new(self.clone(), tx_id.clone(), self.inner.config.lock_order);

        debug!(tx = %tx_id, "transaction started");
        self.inner.active.write().insert(tx_id, tx.metadata.clone());
        tx
    }

    /// Plain, non-transactional lookup.
    ///
    /// Returns the committed state without taking the account's lock or
    /// recording a save point. Fine for display, not for read-modify-write.
    pub fn read(&self, id: &AccountId) -> TransactionResult<Account> {
        Ok(self.inner.repo.account(id)?)
    }

    /// Run `body` inside a fresh transaction.
    ///
    /// If `body` fails, every save point it opened is rolled back and the
    /// error is returned unchanged. If it succeeds, the transaction is
    /// committed right away when `auto_commit` is configured; otherwise
    /// the returned [`PendingCommit`] still holds every lock until the
    /// caller commits it (dropping it rolls back).
    pub fn run<F, T, E>(&self, body: F) -> Result<PendingCommit<T>, E>
    where
        F: FnOnce(&mut Transaction<TxActive>) -> Result<T, E>,
        E: From<TransactionError>,
    {
        let mut tx = self.begin();

        match body(&mut tx) {
            Ok(value) => {
                let tx = if self.inner.config.auto_commit {
                    tx.commit();
                    None
                } else {
                    Some(tx)
                };
                Ok(PendingCommit { tx, value })
            }
            Err(e) => {
                tx.rollback();
                Err(e)
            }
        }
    }

    /// Execute a function within a transaction, automatically committing or rolling back.
    ///
    /// If the function returns Ok, the transaction is committed regardless
    /// of `auto_commit`. If it returns Err or panics, it is rolled back.
    pub fn with_transaction<F, T, E>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut Transaction<TxActive>) -> Result<T, E>,
        E: From<TransactionError>,
    {
        Ok(self.run(body)?.commit())
    }

    /// Get the number of active transactions.
    pub fn active_count(&self) -> usize {
        self.inner.active.read().len()
    }

    /// List all active transaction IDs.
    pub fn active_transactions(&self) -> Vec<String> {
        self.inner.active.read().keys().cloned().collect()
    }

    /// Check if a transaction is active.
    pub fn is_active(&self, tx_id: &str) -> bool {
        self.inner.active.read().contains_key(tx_id)
    }

    /// Get metadata for an active transaction.
    pub fn get_transaction_info(&self, tx_id: &str) -> Option<TransactionMetadata> {
        self.inner.active.read().get(tx_id).cloned()
    }

    /// Mark a transaction as completed (committed or aborted).
    ///
    /// Called internally when a transaction commits, rolls back or is dropped.
    pub(crate) fn mark_completed(&self, tx_id: &str) {
        self.inner.active.write().remove(tx_id);
    }

    /// Take `record`'s lock, honouring the configured timeout.
    pub(crate) fn acquire(&self, record: &AccountRecord) -> TransactionResult<LockGuard> {
        match self.inner.config.lock_timeout {
            None => Ok(record.lock().acquire(record.id())),
            Some(timeout) => record
                .lock()
                .acquire_for(record.id(), timeout)
                .ok_or_else(|| TransactionError::LockTimeout {
                    account: record.id().clone(),
                    waited_ms: timeout.as_millis(),
                }),
        }
    }
}

impl std::fmt::Debug for TransactionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransactionManager")
            .field("config", &self.inner.config)
            .field("active_count", &self.active_count())
            .finish()
    }
}

/// The result of a successful [`TransactionManager::run`] that has not
/// been committed yet.
///
/// Holds the body's value and, unless auto-commit already applied it, the
/// still-active transaction with all its locks.
#[must_use = "dropping a PendingCommit rolls the transaction back"]
#[derive(Debug)]
pub struct PendingCommit<T> {
    tx: Option<Transaction<TxActive>>,
    value: T,
}

impl<T> PendingCommit<T> {
    /// Whether auto-commit already applied the transaction.
    pub fn is_committed(&self) -> bool {
        self.tx.is_none()
    }

    /// The value returned by the transaction body.
    pub fn value(&self) -> &T {
        &self.value
    }

    /// Id of the transaction still waiting for a decision.
    pub fn tx_id(&self) -> Option<&str> {
        self.tx.as_ref().map(|tx| tx.id())
    }

    /// Apply every buffered change and release all locks.
    pub fn commit(self) -> T {
        if let Some(tx) = self.tx {
            tx.commit();
        }
        self.value
    }

    /// Discard every buffered change and release all locks.
    ///
    /// Returns false when auto-commit had already applied the transaction.
    pub fn rollback(self) -> bool {
        match self.tx {
            Some(tx) => {
                tx.rollback();
                true
            }
            None => false,
        }
    }
}
