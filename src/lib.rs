//! # Retail Ledger
//!
//! Double-entry bookkeeping for a retail point of sale: every completed sale and
//! every manual adjustment becomes a balanced journal entry, and financial
//! statements are derived from the posted lines on demand.
//!
//! ## Features
//!
//! - **Chart of accounts**: Assets, Liabilities, Equity, Revenue and Expense accounts with a fixed normal balance side
//! - **Posting engine**: atomic, sequentially numbered journal entries that must balance
//! - **Sale translation**: a completed sale becomes a Cash / Revenue / COGS / Inventory entry
//! - **Financial reporting**: profit and loss, balance sheet, cash flow and trial balance
//! - **Storage abstraction**: in-memory and SQLite backends behind the `LedgerStorage` trait
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use retail_ledger::utils::MemoryStorage;
//! use retail_ledger::{Ledger, SaleEvent};
//!
//! # async fn run() -> retail_ledger::LedgerResult<()> {
//! let ledger = Ledger::new(MemoryStorage::new());
//! ledger.seed_default_chart_of_accounts().await?;
//!
//! let sale = SaleEvent::parse(42, 1, "116.00", "70.00", "cash")?;
//! let posted = ledger.record_sale(&sale).await?;
//! assert_eq!(posted.lines.len(), 4);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod ledger;
pub mod traits;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use crate::config::LedgerConfig;
pub use ledger::*;
pub use traits::*;
pub use types::*;
