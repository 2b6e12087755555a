//! Traits for storage abstraction and extensibility

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::*;
use crate::utils::validation;

/// Storage abstraction for the ledger system
///
/// Implementations own the `accounts`, `journal_entries` and `ledger_entries`
/// collections. Every method takes `&self`; implementations are shared between
/// concurrent requests and synchronize internally.
#[async_trait]
pub trait LedgerStorage: Send + Sync {
    /// Insert a new account. A duplicate code is a validation error.
    async fn insert_account(&self, account: &Account) -> LedgerResult<()>;

    /// Insert all accounts in one unit of work, only if no account exists yet.
    /// Returns whether the accounts were inserted.
    async fn insert_accounts_if_empty(&self, accounts: &[Account]) -> LedgerResult<bool>;

    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Option<Account>>;

    async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>>;

    /// List accounts in creation order
    async fn list_accounts(&self, filter: &AccountFilter) -> LedgerResult<Vec<Account>>;

    /// Replace a stored account. A code collision is a validation error.
    async fn update_account(&self, account: &Account) -> LedgerResult<()>;

    /// Number a journal entry and persist it with its lines as one unit of work.
    ///
    /// The entry number is the highest existing sequence plus one, formatted with
    /// `numbering`. Either the header and every line become visible, or nothing does.
    async fn commit_journal_entry(
        &self,
        header: PendingJournalEntry,
        lines: &[LedgerLine],
        numbering: &EntryNumberFormat,
    ) -> LedgerResult<JournalEntry>;

    async fn get_journal_entry(&self, entry_id: Uuid) -> LedgerResult<Option<JournalEntryDetail>>;

    /// List journal entries dated within `range`, in entry number order
    async fn list_journal_entries(&self, range: &DateRange) -> LedgerResult<Vec<JournalEntry>>;

    /// Change the status of an entry, returning the updated header
    async fn update_journal_status(
        &self,
        entry_id: Uuid,
        status: JournalStatus,
    ) -> LedgerResult<Option<JournalEntry>>;

    /// Ledger lines matching `query`, in entry number then line order
    async fn ledger_postings(&self, query: &LineQuery) -> LedgerResult<Vec<LedgerPosting>>;
}

/// Entry number layout: prefix plus zero-padded sequence, e.g. "JE-0001"
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryNumberFormat {
    pub prefix: String,
    pub width: usize,
}

impl Default for EntryNumberFormat {
    fn default() -> Self {
        Self {
            prefix: "JE-".to_string(),
            width: 4,
        }
    }
}

impl EntryNumberFormat {
    pub fn format(&self, sequence: u64) -> String {
        format!("{}{:0width$}", self.prefix, sequence, width = self.width)
    }

    /// Recover the sequence from a formatted number
    pub fn parse(&self, entry_number: &str) -> Option<u64> {
        entry_number.strip_prefix(&self.prefix)?.parse().ok()
    }
}

/// Trait for implementing custom account validation rules
pub trait AccountValidator: Send + Sync {
    /// Validate an account before saving
    fn validate_account(&self, account: &Account) -> LedgerResult<()>;
}

/// Trait for implementing custom journal entry validation rules
pub trait JournalValidator: Send + Sync {
    /// Validate a posting request before anything is written
    fn validate_entry(&self, input: &JournalEntryInput) -> LedgerResult<()>;
}

/// Default account validator: non-empty well-formed code and name
pub struct DefaultAccountValidator;

impl AccountValidator for DefaultAccountValidator {
    fn validate_account(&self, account: &Account) -> LedgerResult<()> {
        validation::validate_account_code(&account.code)?;
        validation::validate_account_name(&account.name)?;
        if account.parent_id == Some(account.id) {
            return Err(LedgerError::Validation(format!(
                "Account '{}' cannot be its own parent",
                account.code
            )));
        }
        Ok(())
    }
}

/// Default journal validator with the double-entry rules
pub struct DefaultJournalValidator;

impl JournalValidator for DefaultJournalValidator {
    fn validate_entry(&self, input: &JournalEntryInput) -> LedgerResult<()> {
        validation::validate_journal_input(input)
    }
}

/// Trait for report generation
#[async_trait]
pub trait ReportGenerator: Send + Sync {
    /// Generate a profit and loss statement for a date range
    async fn generate_profit_and_loss(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<ProfitAndLoss>;

    /// Generate a balance sheet as of a specific date
    async fn generate_balance_sheet(&self, as_of_date: NaiveDate) -> LedgerResult<BalanceSheet>;

    /// Generate a cash flow statement for a date range
    async fn generate_cash_flow_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<CashFlowStatement>;
}

/// Accounts of one type with their balances and the section total
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatementSection {
    pub accounts: Vec<AccountBalance>,
    pub total: BigDecimal,
}

impl StatementSection {
    pub fn from_balances(accounts: Vec<AccountBalance>) -> Self {
        let total = accounts.iter().map(|ab| &ab.balance).sum();
        Self { accounts, total }
    }
}

/// Profit & Loss structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProfitAndLoss {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub revenue: StatementSection,
    pub expenses: StatementSection,
    /// Always exactly `revenue.total - expenses.total`
    pub net_income: BigDecimal,
}

/// Balance Sheet structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSheet {
    pub as_of_date: NaiveDate,
    pub assets: StatementSection,
    pub liabilities: StatementSection,
    pub equity: StatementSection,
}

impl BalanceSheet {
    /// Assets minus liabilities minus equity. Informational only: undistributed
    /// profit is not closed into retained earnings, so this is usually non-zero.
    pub fn identity_difference(&self) -> BigDecimal {
        &self.assets.total - &self.liabilities.total - &self.equity.total
    }
}

/// Cash Flow Item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowItem {
    pub description: String,
    pub amount: BigDecimal,
}

/// One activity group of the cash flow statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowSection {
    pub items: Vec<CashFlowItem>,
    pub total: BigDecimal,
}

impl CashFlowSection {
    pub fn from_items(items: Vec<CashFlowItem>) -> Self {
        let total = items.iter().map(|item| &item.amount).sum();
        Self { items, total }
    }

    pub fn empty() -> Self {
        Self::from_items(Vec::new())
    }
}

/// Cash Flow Statement structure (simplified indirect method)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CashFlowStatement {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    pub operating_activities: CashFlowSection,
    pub investing_activities: CashFlowSection,
    pub financing_activities: CashFlowSection,
    pub net_cash_flow: BigDecimal,
}

/// Trial Balance - snapshot of all account balances at a point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalance {
    pub as_of_date: NaiveDate,
    pub lines: Vec<TrialBalanceLine>,
    pub total_debits: BigDecimal,
    pub total_credits: BigDecimal,
    /// Totals agree within 0.01 per posted entry counted
    pub is_balanced: bool,
}

/// An account placed in the debit or credit column of the trial balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialBalanceLine {
    pub account: Account,
    pub debit_balance: Option<BigDecimal>,
    pub credit_balance: Option<BigDecimal>,
}

/// Report on ledger integrity and validation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerIntegrityReport {
    pub as_of_date: NaiveDate,
    pub is_valid: bool,
    pub issues: Vec<String>,
    pub trial_balance_total_debits: BigDecimal,
    pub trial_balance_total_credits: BigDecimal,
    pub entries_checked: usize,
}
