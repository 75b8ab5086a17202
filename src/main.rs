//! lockbank - concurrent transfer simulator
//!
//! Seeds an in-memory ledger, runs the same transfer script on several
//! worker threads at once and reports the final balances.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use lockbank::service::{AccountsService, RecordingNotifier};
use lockbank::storage::{Account, AccountId, AccountRepository, InMemoryRepository};
use lockbank::transaction::LockOrder;
use lockbank::Config;

/// In-memory ledger with per-account locking transactions.
#[derive(Parser)]
#[command(name = "lockbank")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output (lock traffic)
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a transfer script concurrently on several workers
    Simulate {
        /// Opening account, as ID=BALANCE (repeatable)
        #[arg(short, long = "account", value_parser = parse_account)]
        accounts: Vec<Account>,

        /// Transfer each worker performs, as FROM:TO:AMOUNT (repeatable, run in order)
        #[arg(short, long = "transfer", value_parser = parse_transfer)]
        transfers: Vec<TransferSpec>,

        /// Number of concurrent workers
        #[arg(short, long, default_value_t = 10)]
        workers: usize,

        /// Lock acquisition order (by-id, first-read)
        #[arg(long, default_value_t = LockOrder::ById)]
        lock_order: LockOrder,

        /// Give up waiting for an account lock after this many milliseconds
        #[arg(long)]
        lock_timeout_ms: Option<u64>,

        /// Commit as soon as each transfer body succeeds
        #[arg(long)]
        auto_commit: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Debug, Clone)]
struct TransferSpec {
    from: AccountId,
    to: AccountId,
    amount: Decimal,
}

fn parse_account(s: &str) -> Result<Account, String> {
    let (id, balance) = s
        .rsplit_once('=')
        .ok_or_else(|| format!("expected ID=BALANCE, got '{}'", s))?;
    let id = AccountId::new(id).map_err(|e| e.to_string())?;
    let balance: Decimal = balance
        .parse()
        .map_err(|e| format!("invalid balance '{}': {}", balance, e))?;
    Ok(Account::with_balance(id, balance))
}

fn parse_transfer(s: &str) -> Result<TransferSpec, String> {
    let parts: Vec<&str> = s.split(':').collect();
    let [from, to, amount] = parts.as_slice() else {
        return Err(format!("expected FROM:TO:AMOUNT, got '{}'", s));
    };
    Ok(TransferSpec {
        from: AccountId::new(*from).map_err(|e| e.to_string())?,
        to: AccountId::new(*to).map_err(|e| e.to_string())?,
        amount: amount
            .parse()
            .map_err(|e| format!("invalid amount '{}': {}", amount, e))?,
    })
}

/// The A/B/C scenario: A and B start at 1000, every worker moves 100 from
/// A to B and then 200 from B to C.
fn default_script() -> Result<(Vec<Account>, Vec<TransferSpec>), String> {
    let accounts = ["A=1000", "B=1000", "C=0"]
        .iter()
        .map(|s| parse_account(s))
        .collect::<Result<_, _>>()?;
    let transfers = ["A:B:100", "B:C:200"]
        .iter()
        .map(|s| parse_transfer(s))
        .collect::<Result<_, _>>()?;
    Ok((accounts, transfers))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Simulate {
            accounts,
            transfers,
            workers,
            lock_order,
            lock_timeout_ms,
            auto_commit,
            json,
        } => {
            let config = Config::new()
                .lock_order(lock_order)
                .lock_timeout(lock_timeout_ms.map(Duration::from_millis))
                .auto_commit(auto_commit);

            match simulate(accounts, transfers, workers, config, json) {
                Ok(true) => ExitCode::SUCCESS,
                Ok(false) => ExitCode::FAILURE,
                Err(e) => {
                    eprintln!("Error: {}", e);
                    ExitCode::FAILURE
                }
            }
        }
    }
}

/// Returns whether every transfer succeeded.
fn simulate(
    accounts: Vec<Account>,
    transfers: Vec<TransferSpec>,
    workers: usize,
    config: Config,
    json: bool,
) -> Result<bool, Box<dyn std::error::Error>> {
    let (accounts, transfers) = if accounts.is_empty() && transfers.is_empty() {
        default_script()?
    } else {
        (accounts, transfers)
    };

    let repo = InMemoryRepository::new();
    let notifier = Arc::new(RecordingNotifier::new());
    let service = AccountsService::with_config(Arc::new(repo.clone()), notifier.clone(), config);

    for account in accounts {
        service.create_account(account)?;
    }
    let total_before = repo.total_balance().ok_or("opening balances overflow")?;

    let failures: Mutex<Vec<String>> = Mutex::new(Vec::new());
    let started = Instant::now();
    std::thread::scope(|s| {
        for _ in 0..workers {
            let service = service.clone();
            let transfers = &transfers;
            let failures = &failures;
            s.spawn(move || {
                for t in transfers {
                    if let Err(e) = service.transfer(&t.from, &t.to, t.amount) {
                        failures
                            .lock()
                            .push(format!("{} -> {} ({}): {}", t.from, t.to, t.amount, e));
                    }
                }
            });
        }
    });
    let elapsed = started.elapsed();

    let balances = repo
        .ids()
        .iter()
        .map(|id| repo.account(id))
        .collect::<Result<Vec<_>, _>>()?;
    let failures = failures.into_inner();
    let total_after = repo.total_balance().ok_or("closing balances overflow")?;

    if json {
        let report = serde_json::json!({
            "accounts": balances,
            "notifications": notifier.count(),
            "failures": failures,
            "total_before": total_before,
            "total_after": total_after,
            "elapsed_ms": elapsed.as_millis() as u64,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        for account in &balances {
            println!("{}\t{}", account.account_id, account.balance);
        }
        println!("notifications: {}", notifier.count());
        println!("total: {} -> {}", total_before, total_after);
        for failure in &failures {
            println!("failed: {}", failure);
        }
        println!("({} workers, {:?})", workers, elapsed);
    }

    Ok(failures.is_empty())
}
