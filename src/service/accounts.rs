//! Accounts service - account creation, lookups and transfers.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{error, info};

use crate::config::Config;
use crate::service::error::{TransferError, TransferResult};
use crate::service::notify::Notifier;
use crate::storage::{Account, AccountId, AccountRepository};
use crate::transaction::{Transaction, TransactionManager, TxActive};

/// Proof that a transfer committed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    /// Transaction that applied the transfer.
    pub tx_id: String,
    pub from: AccountId,
    pub to: AccountId,
    pub amount: Decimal,
    pub completed_at: DateTime<Utc>,
}

/// The high-level handle used by callers.
///
/// Thread-safe: clone it into every worker.
#[derive(Clone)]
pub struct AccountsService {
    repo: Arc<dyn AccountRepository>,
    tx_manager: TransactionManager,
    notifier: Arc<dyn Notifier>,
}

impl AccountsService {
    /// Create a service with the default transaction configuration.
    pub fn new(repo: Arc<dyn AccountRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self::with_config(repo, notifier, Config::default())
    }

    /// Create a service with a specific transaction configuration.
    pub fn with_config(
        repo: Arc<dyn AccountRepository>,
        notifier: Arc<dyn Notifier>,
        config: Config,
    ) -> Self {
        let tx_manager = TransactionManager::with_config(repo.clone(), config);
        Self {
            repo,
            tx_manager,
            notifier,
        }
    }

    /// Get the account store.
    pub fn repository(&self) -> &dyn AccountRepository {
        self.repo.as_ref()
    }

    /// Get the transaction manager.
    pub fn transaction_manager(&self) -> &TransactionManager {
        &self.tx_manager
    }

    /// Open a new account.
    pub fn create_account(&self, account: Account) -> TransferResult<()> {
        Ok(self.repo.create(account)?)
    }

    /// Committed state of an account.
    pub fn get_account(&self, id: &AccountId) -> TransferResult<Account> {
        Ok(self.repo.account(id)?)
    }

    /// Move `amount` from one account to another.
    ///
    /// Both accounts are locked for the whole transaction. On any failure
    /// neither balance changes and nobody is notified. Once the transfer has
    /// committed, both holders are notified; notification failures are
    /// logged and do not affect the result.
    pub fn transfer(
        &self,
        from: &AccountId,
        to: &AccountId,
        amount: Decimal,
    ) -> TransferResult<TransferReceipt> {
        Self::validate(from, to, amount)?;

        let pending = self.tx_manager.run(|tx| -> TransferResult<String> {
            tx.lock_all(&[from.clone(), to.clone()])?;
            Self::debit(tx, from, amount)?;
            Self::credit(tx, to, amount)?;
            Ok(tx.id().to_string())
        })?;
        let tx_id = pending.commit();

        info!(tx = %tx_id, %from, %to, %amount, "transfer committed");
        self.notify_parties(from, to, amount);

        Ok(TransferReceipt {
            tx_id,
            from: from.clone(),
            to: to.clone(),
            amount,
            completed_at: Utc::now(),
        })
    }

    fn validate(from: &AccountId, to: &AccountId, amount: Decimal) -> TransferResult<()> {
        if from == to {
            return Err(TransferError::same_account(from, to));
        }
        // Negative amounts would silently reverse the direction.
        if amount <= Decimal::ZERO {
            return Err(TransferError::invalid_amount(amount));
        }
        Ok(())
    }

    fn debit(
        tx: &mut Transaction<TxActive>,
        id: &AccountId,
        amount: Decimal,
    ) -> TransferResult<()> {
        let snapshot = tx.read(id)?;
        if snapshot.balance() < amount {
            return Err(TransferError::InsufficientBalance {
                account: id.clone(),
                balance: snapshot.balance(),
                requested: amount,
            });
        }
        snapshot.debit(amount)?;
        Ok(())
    }

    fn credit(
        tx: &mut Transaction<TxActive>,
        id: &AccountId,
        amount: Decimal,
    ) -> TransferResult<()> {
        tx.read(id)?.credit(amount)?;
        Ok(())
    }

    fn notify_parties(&self, from: &AccountId, to: &AccountId, amount: Decimal) {
        self.notify(
            from,
            &format!(
                "Amount: {} debited from account: {}, to account: {} .",
                amount, from, to
            ),
        );
        self.notify(
            to,
            &format!(
                "Amount: {} credited to account: {}, from account: {} .",
                amount, to, from
            ),
        );
    }

    fn notify(&self, id: &AccountId, message: &str) {
        let result = self
            .repo
            .account(id)
            .map_err(|e| e.to_string())
            .and_then(|account| {
                self.notifier
                    .notify(&account, message)
                    .map_err(|e| e.to_string())
            });

        if let Err(e) = result {
            error!(account = %id, error = %e, "error sending transfer notification");
        }
    }
}

impl std::fmt::Debug for AccountsService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccountsService")
            .field("accounts", &self.repo.len())
            .field("tx_manager", &self.tx_manager)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use proptest::prelude::*;

    use crate::service::notify::{NotifyError, RecordingNotifier};
    use crate::storage::{InMemoryRepository, StorageError};
    use crate::transaction::{LockOrder, TransactionError};

    fn id(s: &str) -> AccountId {
        AccountId::new(s).unwrap()
    }

    fn dec(n: i64) -> Decimal {
        Decimal::from(n)
    }

    struct Fixture {
        repo: InMemoryRepository,
        notifier: Arc<RecordingNotifier>,
        service: AccountsService,
    }

    fn setup_with(config: Config) -> Fixture {
        let repo = InMemoryRepository::new();
        let notifier = Arc::new(RecordingNotifier::new());
        let service = AccountsService::with_config(Arc::new(repo.clone()), notifier.clone(), config);
        Fixture {
            repo,
            notifier,
            service,
        }
    }

    fn setup() -> Fixture {
        setup_with(Config::default())
    }

    impl Fixture {
        fn open(&self, name: &str, balance: i64) {
            self.service
                .create_account(Account::with_balance(id(name), dec(balance)))
                .unwrap();
        }

        fn balance(&self, name: &str) -> Decimal {
            self.service.get_account(&id(name)).unwrap().balance
        }

        fn no_locks_held(&self) -> bool {
            self.repo
                .ids()
                .iter()
                .all(|id| !self.repo.get(id).unwrap().lock().is_locked())
        }
    }

    /// Fails every notification.
    struct BrokenNotifier {
        attempts: AtomicUsize,
    }

    impl Notifier for BrokenNotifier {
        fn notify(&self, account: &Account, _message: &str) -> Result<(), NotifyError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            Err(NotifyError::new(&account.account_id, "mail server unreachable"))
        }
    }

    #[test]
    fn test_add_account() {
        let f = setup();
        f.open("Id-123", 1000);
        assert_eq!(
            f.service.get_account(&id("Id-123")).unwrap(),
            Account::with_balance(id("Id-123"), dec(1000))
        );
    }

    #[test]
    fn test_add_account_fails_on_duplicate_id() {
        let f = setup();
        f.open("Id-1", 1000);

        let err = f
            .service
            .create_account(Account::new(id("Id-1")))
            .unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(err.to_string(), "account id Id-1 already exists");
        assert_eq!(f.balance("Id-1"), dec(1000));
    }

    #[test]
    fn test_transfer_commit() {
        let f = setup();
        f.open("Id-341", 1000);
        f.open("Id-342", 1000);

        let receipt = f
            .service
            .transfer(&id("Id-341"), &id("Id-342"), dec(1000))
            .unwrap();

        assert_eq!(f.balance("Id-341"), Decimal::ZERO);
        assert_eq!(f.balance("Id-342"), dec(2000));
        assert_eq!(f.notifier.count(), 2);
        assert_eq!(receipt.amount, dec(1000));
        assert_eq!(receipt.from, id("Id-341"));
        assert!(f.no_locks_held());
        assert_eq!(f.service.transaction_manager().active_count(), 0);
    }

    #[test]
    fn test_notification_messages() {
        let f = setup();
        f.open("A", 10);
        f.open("B", 0);

        f.service.transfer(&id("A"), &id("B"), dec(4)).unwrap();

        assert_eq!(
            f.notifier.messages_for(&id("A")),
            ["Amount: 4 debited from account: A, to account: B ."]
        );
        assert_eq!(
            f.notifier.messages_for(&id("B")),
            ["Amount: 4 credited to account: B, from account: A ."]
        );
    }

    #[test]
    fn test_transfer_rollback_on_insufficient_balance() {
        let f = setup();
        f.open("Id-350", 1000);
        f.open("Id-351", 1000);
        f.service
            .transfer(&id("Id-350"), &id("Id-351"), dec(1000))
            .unwrap();

        let err = f
            .service
            .transfer(&id("Id-350"), &id("Id-351"), dec(500))
            .unwrap_err();
        assert!(matches!(
            err,
            TransferError::InsufficientBalance { ref account, balance, requested }
                if account == &id("Id-350") && balance.is_zero() && requested == dec(500)
        ));

        assert_eq!(f.balance("Id-350"), Decimal::ZERO);
        assert_eq!(f.balance("Id-351"), dec(2000));
        // only the first transfer notified
        assert_eq!(f.notifier.count(), 2);
        assert!(f.no_locks_held());
    }

    #[test]
    fn test_insufficient_balance_with_credit_side_locked_first() {
        // "Id-1" sorts before "Id-2", so the credit side is locked first
        let f = setup();
        f.open("Id-1", 0);
        f.open("Id-2", 10);

        let err = f.service.transfer(&id("Id-2"), &id("Id-1"), dec(11)).unwrap_err();
        assert!(matches!(err, TransferError::InsufficientBalance { .. }));
        assert_eq!(f.balance("Id-1"), Decimal::ZERO);
        assert_eq!(f.balance("Id-2"), dec(10));
        assert!(f.no_locks_held());
    }

    #[test]
    fn test_transfer_rollback_on_missing_destination() {
        for order in [LockOrder::ById, LockOrder::FirstRead] {
            let f = setup_with(Config::new().lock_order(order));
            f.open("Id-360", 1000);

            let err = f
                .service
                .transfer(&id("Id-360"), &id("Id-361"), dec(500))
                .unwrap_err();

            assert!(err.is_not_found());
            assert_eq!(err.to_string(), "account does not exist for id: Id-361");
            assert_eq!(f.balance("Id-360"), dec(1000));
            assert_eq!(f.notifier.count(), 0);
            assert!(f.no_locks_held());
            assert_eq!(f.service.transaction_manager().active_count(), 0);
        }
    }

    #[test]
    fn test_transfer_from_missing_source() {
        let f = setup();
        f.open("B", 5);

        let err = f.service.transfer(&id("A"), &id("B"), dec(1)).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Transaction(TransactionError::Storage(StorageError::AccountNotFound(ref missing)))
                if missing == &id("A")
        ));
        assert_eq!(f.balance("B"), dec(5));
        assert!(f.no_locks_held());
    }

    #[test]
    fn test_zero_amount_rejected() {
        let f = setup();
        f.open("Id-341", 1000);
        f.open("Id-342", 1000);

        let err = f
            .service
            .transfer(&id("Id-341"), &id("Id-342"), Decimal::ZERO)
            .unwrap_err();
        assert_eq!(err.to_string(), "invalid transfer amount [0]");
        assert_eq!(f.balance("Id-341"), dec(1000));
        assert_eq!(f.balance("Id-342"), dec(1000));
    }

    #[test]
    fn test_negative_amount_rejected() {
        let f = setup();
        f.open("A", 10);
        f.open("B", 10);

        let err = f.service.transfer(&id("A"), &id("B"), dec(-5)).unwrap_err();
        assert!(matches!(err, TransferError::InvalidTransfer(_)));
        assert_eq!(f.balance("A"), dec(10));
        assert_eq!(f.balance("B"), dec(10));
    }

    #[test]
    fn test_same_account_rejected() {
        let f = setup();
        f.open("Id-341", 1000);

        let err = f
            .service
            .transfer(&id("Id-341"), &id("Id-341"), dec(1000))
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "cannot transfer to same account : FROM_ACCOUNT [Id-341] TO_ACCOUNT [Id-341]"
        );
    }

    #[test]
    fn test_invalid_transfer_takes_no_lock() {
        // a lock held elsewhere would make any acquisition attempt time out
        let f = setup_with(Config::new().lock_timeout(Some(Duration::from_millis(5))));
        f.open("A", 10);
        f.open("B", 10);

        let record = f.repo.get(&id("A")).unwrap();
        let _held = record.lock().acquire(record.id());

        let err = f.service.transfer(&id("A"), &id("A"), dec(1)).unwrap_err();
        assert!(matches!(err, TransferError::InvalidTransfer(_)));
        let err = f.service.transfer(&id("A"), &id("B"), Decimal::ZERO).unwrap_err();
        assert!(matches!(err, TransferError::InvalidTransfer(_)));
        assert_eq!(f.service.transaction_manager().active_count(), 0);
    }

    #[test]
    fn test_fractional_amounts() {
        let f = setup();
        f.service
            .create_account(Account::with_balance(id("A"), Decimal::new(1000, 2)))
            .unwrap();
        f.open("B", 0);

        f.service
            .transfer(&id("A"), &id("B"), Decimal::new(333, 2))
            .unwrap();
        assert_eq!(f.balance("A"), Decimal::new(667, 2));
        assert_eq!(f.balance("B"), Decimal::new(333, 2));
    }

    #[test]
    fn test_notification_failure_does_not_fail_transfer() {
        let repo = InMemoryRepository::new();
        let notifier = Arc::new(BrokenNotifier {
            attempts: AtomicUsize::new(0),
        });
        let service = AccountsService::new(Arc::new(repo.clone()), notifier.clone());
        service
            .create_account(Account::with_balance(id("A"), dec(10)))
            .unwrap();
        service.create_account(Account::new(id("B"))).unwrap();

        service.transfer(&id("A"), &id("B"), dec(10)).unwrap();

        // each party is tried independently
        assert_eq!(notifier.attempts.load(Ordering::SeqCst), 2);
        assert_eq!(repo.account(&id("A")).unwrap().balance, Decimal::ZERO);
        assert_eq!(repo.account(&id("B")).unwrap().balance, dec(10));
    }

    #[test]
    fn test_credit_overflow_rolls_back() {
        let f = setup();
        f.open("A", 1);
        f.service
            .create_account(Account::with_balance(id("B"), Decimal::MAX))
            .unwrap();

        let err = f.service.transfer(&id("A"), &id("B"), dec(1)).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Transaction(TransactionError::BalanceOverflow { ref account })
                if account == &id("B")
        ));

        assert_eq!(f.balance("A"), dec(1));
        assert_eq!(f.balance("B"), Decimal::MAX);
        assert_eq!(f.notifier.count(), 0);
        assert!(f.no_locks_held());
        assert_eq!(f.service.transaction_manager().active_count(), 0);
        assert_eq!(f.repo.total_balance(), None);
    }

    #[test]
    fn test_auto_commit_config() {
        let f = setup_with(Config::new().auto_commit(true));
        f.open("A", 3);
        f.open("B", 0);

        f.service.transfer(&id("A"), &id("B"), dec(3)).unwrap();
        assert_eq!(f.balance("B"), dec(3));
        assert_eq!(f.notifier.count(), 2);
    }

    #[test]
    fn test_multiple_transfers_between_same_accounts() {
        let f = setup();
        f.open("Id-341", 1000);
        f.open("Id-342", 1000);
        f.open("Id-343", 0);

        std::thread::scope(|s| {
            for _ in 0..10 {
                let service = f.service.clone();
                s.spawn(move || {
                    service
                        .transfer(&id("Id-341"), &id("Id-342"), dec(100))
                        .unwrap();
                    service
                        .transfer(&id("Id-342"), &id("Id-343"), dec(200))
                        .unwrap();
                });
            }
        });

        assert_eq!(f.balance("Id-341"), Decimal::ZERO);
        assert_eq!(f.balance("Id-342"), Decimal::ZERO);
        assert_eq!(f.balance("Id-343"), dec(2000));
        assert_eq!(f.notifier.count(), 40);
        assert!(f.no_locks_held());
    }

    #[test]
    fn test_opposite_direction_transfers_do_not_deadlock() {
        let f = setup();
        f.open("X", 10_000);
        f.open("Y", 10_000);

        std::thread::scope(|s| {
            for worker in 0..8 {
                let service = f.service.clone();
                s.spawn(move || {
                    let (from, to) = if worker % 2 == 0 { ("X", "Y") } else { ("Y", "X") };
                    for _ in 0..100 {
                        service.transfer(&id(from), &id(to), dec(1)).unwrap();
                    }
                });
            }
        });

        assert_eq!(f.balance("X"), dec(10_000));
        assert_eq!(f.balance("Y"), dec(10_000));
        assert_eq!(f.notifier.count(), 1600);
    }

    #[test]
    fn test_first_read_order_deadlock_surfaces_as_timeout() {
        let f = setup_with(
            Config::new()
                .lock_order(LockOrder::FirstRead)
                .lock_timeout(Some(Duration::from_millis(50))),
        );
        f.open("X", 100);
        f.open("Y", 100);

        // hold X as if a reverse transfer Y -> X had already locked it
        let manager = f.service.transaction_manager().clone();
        let mut blocker = manager.begin();
        blocker.read(&id("X")).unwrap();

        let err = f.service.transfer(&id("Y"), &id("X"), dec(1)).unwrap_err();
        assert!(matches!(
            err,
            TransferError::Transaction(TransactionError::LockTimeout { ref account, .. })
                if account == &id("X")
        ));
        blocker.rollback();

        assert_eq!(f.balance("X"), dec(100));
        assert_eq!(f.balance("Y"), dec(100));
        assert!(f.no_locks_held());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(24))]

        #[test]
        fn concurrent_transfers_conserve_money(
            transfers in prop::collection::vec((0usize..4, 0usize..4, 1i64..400), 1..40),
        ) {
            let f = setup();
            let names = ["P0", "P1", "P2", "P3"];
            for name in names {
                f.open(name, 500);
            }
            let before = f.repo.total_balance().unwrap();

            let committed = AtomicUsize::new(0);
            std::thread::scope(|s| {
                for chunk in transfers.chunks(10) {
                    let service = f.service.clone();
                    let committed = &committed;
                    s.spawn(move || {
                        for &(from, to, amount) in chunk {
                            if service
                                .transfer(&id(names[from]), &id(names[to]), dec(amount))
                                .is_ok()
                            {
                                committed.fetch_add(1, Ordering::SeqCst);
                            }
                        }
                    });
                }
            });

            prop_assert_eq!(f.repo.total_balance(), Some(before));
            for name in names {
                prop_assert!(f.balance(name) >= Decimal::ZERO);
            }
            prop_assert_eq!(f.notifier.count(), 2 * committed.load(Ordering::SeqCst));
            prop_assert!(f.no_locks_held());
        }
    }
}
