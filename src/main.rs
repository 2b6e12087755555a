use anyhow::{bail, Context};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use serde::Serialize;
use std::path::PathBuf;
use tracing_subscriber::{filter::EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};
use uuid::Uuid;

use retail_ledger::utils::SqliteStorage;
use retail_ledger::{
    Account, AccountType, DateRange, JournalEntryInput, Ledger, LedgerConfig, NewAccount,
    ReportGenerator, SaleEvent, SaleLedgerStatus,
};

const LOG_ENV: &str = "RETAIL_LEDGER_LOG";

#[derive(Parser)]
#[command(version, about = "Retail point-of-sale ledger", long_about = None)]
struct Cli {
    /// TOML configuration file
    #[arg(short, long, env = "RETAIL_LEDGER_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,
    /// Overrides the configured database path
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,
    /// Emit logs as JSON lines on stderr
    #[arg(long)]
    json_logs: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Insert the standard retail chart of accounts into an empty ledger
    Seed,
    /// List accounts
    Accounts {
        #[arg(long = "type", value_name = "TYPE")]
        account_type: Option<AccountType>,
    },
    /// Create an account
    CreateAccount {
        #[arg(long)]
        code: String,
        #[arg(long)]
        name: String,
        #[arg(long = "type", value_name = "TYPE")]
        account_type: AccountType,
        #[arg(long)]
        subtype: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Code of the parent account
        #[arg(long, value_name = "CODE")]
        parent: Option<String>,
    },
    /// Balance of one account
    Balance {
        code: String,
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Lines posted against one account
    Ledger {
        code: String,
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// List journal entries
    Entries {
        #[arg(long)]
        from: Option<NaiveDate>,
        #[arg(long)]
        to: Option<NaiveDate>,
    },
    /// Show a journal entry with its lines
    Entry { id: Uuid },
    /// Post a manual journal entry read from a JSON file
    Post {
        #[arg(value_name = "FILE")]
        file: PathBuf,
    },
    /// Void a posted journal entry
    Void { id: Uuid },
    /// Record a completed sale
    RecordSale {
        #[arg(long)]
        sale_id: i64,
        #[arg(long)]
        user_id: i64,
        #[arg(long)]
        total: String,
        #[arg(long)]
        cogs: String,
        #[arg(long, default_value = "cash")]
        method: String,
    },
    /// Profit and loss for a period
    Pnl {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Balance sheet as of a date (default today)
    BalanceSheet {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Cash flow statement for a period
    CashFlow {
        #[arg(long)]
        from: NaiveDate,
        #[arg(long)]
        to: NaiveDate,
    },
    /// Trial balance as of a date (default today)
    TrialBalance {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
    /// Check that the books balance
    Integrity {
        #[arg(long)]
        as_of: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs)?;

    let mut config = LedgerConfig::load(cli.config.as_deref().and_then(|path| path.to_str()))
        .context("loading configuration")?;
    if let Some(database) = cli.database {
        config.database_path = database.to_string_lossy().into_owned();
    }

    let storage = SqliteStorage::open(&config.database_path)
        .with_context(|| format!("opening ledger database {}", config.database_path))?
        .with_max_attempts(config.max_posting_attempts);
    let ledger = Ledger::with_config(storage, &config);

    run(&ledger, cli.command).await
}

fn init_tracing(json: bool) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn today() -> NaiveDate {
    Utc::now().date_naive()
}

async fn account_by_code(ledger: &Ledger<SqliteStorage>, code: &str) -> anyhow::Result<Account> {
    match ledger.get_account_by_code(code).await? {
        Some(account) => Ok(account),
        None => bail!("no account with code {code}"),
    }
}

async fn run(ledger: &Ledger<SqliteStorage>, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Seed => {
            let created = ledger.seed_default_chart_of_accounts().await?;
            if created.is_empty() {
                tracing::info!("chart of accounts already present");
            }
            print_json(&created)
        }
        Command::Accounts { account_type } => print_json(&ledger.list_accounts(account_type).await?),
        Command::CreateAccount {
            code,
            name,
            account_type,
            subtype,
            description,
            parent,
        } => {
            let mut new = NewAccount::new(code, name, account_type);
            if let Some(subtype) = subtype {
                new = new.subtype(subtype);
            }
            if let Some(description) = description {
                new = new.description(description);
            }
            if let Some(parent) = parent {
                new = new.parent(account_by_code(ledger, &parent).await?.id);
            }
            print_json(&ledger.create_account(new).await?)
        }
        Command::Balance { code, as_of } => {
            let account = account_by_code(ledger, &code).await?;
            print_json(&ledger.get_account_balance(account.id, as_of).await?)
        }
        Command::Ledger { code, from, to } => {
            let account = account_by_code(ledger, &code).await?;
            print_json(
                &ledger
                    .get_account_ledger(account.id, DateRange::new(from, to))
                    .await?,
            )
        }
        Command::Entries { from, to } => {
            print_json(&ledger.list_journal_entries(DateRange::new(from, to)).await?)
        }
        Command::Entry { id } => match ledger.get_journal_entry(id).await? {
            Some(detail) => print_json(&detail),
            None => bail!("journal entry {id} not found"),
        },
        Command::Post { file } => {
            let raw = std::fs::read_to_string(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let input: JournalEntryInput = serde_json::from_str(&raw)
                .with_context(|| format!("parsing journal entry from {}", file.display()))?;
            print_json(&ledger.post_journal_entry(input).await?)
        }
        Command::Void { id } => print_json(&ledger.void_journal_entry(id).await?),
        Command::RecordSale {
            sale_id,
            user_id,
            total,
            cogs,
            method,
        } => {
            let sale = SaleEvent::parse(sale_id, user_id, &total, &cogs, &method)?;
            let status = ledger.record_sale_or_flag(&sale).await;
            print_json(&status)?;
            if let SaleLedgerStatus::NeedsReconciliation { reason } = status {
                bail!("sale {sale_id} needs reconciliation: {reason}");
            }
            Ok(())
        }
        Command::Pnl { from, to } => print_json(&ledger.generate_profit_and_loss(from, to).await?),
        Command::BalanceSheet { as_of } => print_json(
            &ledger
                .generate_balance_sheet(as_of.unwrap_or_else(today))
                .await?,
        ),
        Command::CashFlow { from, to } => {
            print_json(&ledger.generate_cash_flow_statement(from, to).await?)
        }
        Command::TrialBalance { as_of } => {
            print_json(&ledger.get_trial_balance(as_of.unwrap_or_else(today)).await?)
        }
        Command::Integrity { as_of } => {
            let report = ledger.validate_integrity(as_of.unwrap_or_else(today)).await?;
            print_json(&report)?;
            if !report.is_valid {
                bail!("ledger integrity check failed");
            }
            Ok(())
        }
    }
}
