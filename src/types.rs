//! Core types and data structures for the ledger engine

use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Account types following standard accounting principles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AccountType {
    /// Assets - what the business owns (Cash, Inventory, Equipment, etc.)
    Asset,
    /// Liabilities - what the business owes (Payables, Tax Payable, etc.)
    Liability,
    /// Equity - owner's interest in the business (Capital, Retained Earnings, etc.)
    Equity,
    /// Revenue - money earned by the business
    Revenue,
    /// Expenses - costs incurred by the business
    Expense,
}

impl AccountType {
    /// Returns the conventional normal balance for this account type.
    /// Assets and Expenses normally have debit balances;
    /// Liabilities, Equity, and Revenue normally have credit balances.
    pub fn normal_balance(&self) -> EntryType {
        match self {
            AccountType::Asset | AccountType::Expense => EntryType::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => {
                EntryType::Credit
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }
}

impl fmt::Display for AccountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            other => Err(LedgerError::Validation(format!(
                "unknown account type '{other}'"
            ))),
        }
    }
}

/// Sides of a double-entry posting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntryType {
    /// Debit - increases Assets and Expenses, decreases Liabilities, Equity, and Revenue
    Debit,
    /// Credit - increases Liabilities, Equity, and Revenue, decreases Assets and Expenses
    Credit,
}

impl EntryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryType::Debit => "debit",
            EntryType::Credit => "credit",
        }
    }

    /// Signed balance from raw totals, following this normal balance side.
    pub fn signed_balance(&self, debit_total: &BigDecimal, credit_total: &BigDecimal) -> BigDecimal {
        match self {
            EntryType::Debit => debit_total - credit_total,
            EntryType::Credit => credit_total - debit_total,
        }
    }
}

impl FromStr for EntryType {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "debit" => Ok(EntryType::Debit),
            "credit" => Ok(EntryType::Credit),
            other => Err(LedgerError::Validation(format!(
                "unknown balance side '{other}'"
            ))),
        }
    }
}

/// An account in the chart of accounts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier for the account
    pub id: Uuid,
    /// Unique short code, e.g. "1000"
    pub code: String,
    /// Human-readable account name
    pub name: String,
    /// Type of account (Asset, Liability, etc.)
    pub account_type: AccountType,
    /// Free-form classification, e.g. "current_asset"
    pub subtype: Option<String>,
    /// Side on which the balance increases; fixed at creation
    pub normal_balance: EntryType,
    pub description: Option<String>,
    pub is_active: bool,
    /// Seeded, protected account
    pub is_system: bool,
    /// Optional parent account for hierarchical rollups
    pub parent_id: Option<Uuid>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl Account {
    /// Build a fresh, active account from a creation request
    pub fn from_new(new: NewAccount) -> Self {
        let now = chrono::Utc::now().naive_utc();
        let normal_balance = new
            .normal_balance
            .unwrap_or_else(|| new.account_type.normal_balance());
        Self {
            id: Uuid::new_v4(),
            code: new.code,
            name: new.name,
            account_type: new.account_type,
            subtype: new.subtype,
            normal_balance,
            description: new.description,
            is_active: true,
            is_system: new.is_system,
            parent_id: new.parent_id,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Fields for creating an account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    #[serde(default)]
    pub subtype: Option<String>,
    /// Defaults to the account type's conventional side
    #[serde(default)]
    pub normal_balance: Option<EntryType>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub is_system: bool,
    #[serde(default)]
    pub parent_id: Option<Uuid>,
}

impl NewAccount {
    pub fn new(code: impl Into<String>, name: impl Into<String>, account_type: AccountType) -> Self {
        Self {
            code: code.into(),
            name: name.into(),
            account_type,
            subtype: None,
            normal_balance: None,
            description: None,
            is_system: false,
            parent_id: None,
        }
    }

    pub fn subtype(mut self, subtype: impl Into<String>) -> Self {
        self.subtype = Some(subtype.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn system(mut self) -> Self {
        self.is_system = true;
        self
    }

    pub fn parent(mut self, parent_id: Uuid) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn normal_balance(mut self, side: EntryType) -> Self {
        self.normal_balance = Some(side);
        self
    }
}

/// Partial update of an account. `None` leaves the field unchanged.
///
/// Type and normal balance are not updatable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountUpdate {
    pub code: Option<String>,
    pub name: Option<String>,
    pub subtype: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    pub parent_id: Option<Uuid>,
}

/// Filter for listing accounts
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountFilter {
    pub account_type: Option<AccountType>,
    pub active_only: bool,
}

impl AccountFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn of_type(account_type: AccountType) -> Self {
        Self {
            account_type: Some(account_type),
            active_only: false,
        }
    }

    pub fn active(mut self) -> Self {
        self.active_only = true;
        self
    }

    pub fn matches(&self, account: &Account) -> bool {
        self.account_type
            .is_none_or(|account_type| account.account_type == account_type)
            && (!self.active_only || account.is_active)
    }
}

/// Lifecycle status of a journal entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JournalStatus {
    Draft,
    Posted,
    Void,
}

impl JournalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JournalStatus::Draft => "draft",
            JournalStatus::Posted => "posted",
            JournalStatus::Void => "void",
        }
    }

    /// Only posted entries contribute to balances and statements.
    pub fn counts_toward_balances(&self) -> bool {
        matches!(self, JournalStatus::Posted)
    }
}

impl FromStr for JournalStatus {
    type Err = LedgerError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "draft" => Ok(JournalStatus::Draft),
            "posted" => Ok(JournalStatus::Posted),
            "void" => Ok(JournalStatus::Void),
            other => Err(LedgerError::Serialization(format!(
                "unknown journal status '{other}'"
            ))),
        }
    }
}

/// Header of one atomic financial event
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    pub id: Uuid,
    /// Human-readable sequential number, e.g. "JE-0001"
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub description: String,
    /// Originating business event kind, e.g. "sale"
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    /// User who recorded the entry
    pub created_by: i64,
    pub status: JournalStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// A validated journal entry header that has not been numbered yet.
///
/// Storage assigns the entry number inside the same unit of work that inserts it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingJournalEntry {
    pub id: Uuid,
    pub entry_date: NaiveDate,
    pub description: String,
    pub reference_type: Option<String>,
    pub reference_id: Option<String>,
    pub created_by: i64,
    pub status: JournalStatus,
    pub notes: Option<String>,
    pub created_at: NaiveDateTime,
}

impl PendingJournalEntry {
    pub fn into_entry(self, entry_number: String) -> JournalEntry {
        JournalEntry {
            id: self.id,
            entry_number,
            entry_date: self.entry_date,
            description: self.description,
            reference_type: self.reference_type,
            reference_id: self.reference_id,
            created_by: self.created_by,
            status: self.status,
            notes: self.notes,
            created_at: self.created_at,
            updated_at: self.created_at,
        }
    }
}

/// One single-sided posting against one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerLine {
    pub id: Uuid,
    pub journal_entry_id: Uuid,
    pub account_id: Uuid,
    pub debit: BigDecimal,
    pub credit: BigDecimal,
    pub description: Option<String>,
}

impl LedgerLine {
    /// The side this line posts to, or `None` when the line is not single-sided.
    pub fn side(&self) -> Option<EntryType> {
        let zero = BigDecimal::from(0);
        match (self.debit > zero, self.credit > zero) {
            (true, false) if self.credit == zero => Some(EntryType::Debit),
            (false, true) if self.debit == zero => Some(EntryType::Credit),
            _ => None,
        }
    }
}

/// A ledger line together with the journal header fields needed to filter it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerPosting {
    pub line: LedgerLine,
    pub entry_number: String,
    pub entry_date: NaiveDate,
    pub status: JournalStatus,
}

/// A journal entry with its lines
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryDetail {
    pub entry: JournalEntry,
    pub lines: Vec<LedgerLine>,
}

impl JournalEntryDetail {
    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|line| &line.debit).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|line| &line.credit).sum()
    }
}

/// One requested line of a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineInput {
    pub account_id: Uuid,
    #[serde(default = "zero")]
    pub debit: BigDecimal,
    #[serde(default = "zero")]
    pub credit: BigDecimal,
    #[serde(default)]
    pub description: Option<String>,
}

fn zero() -> BigDecimal {
    BigDecimal::from(0)
}

impl LineInput {
    pub fn debit(account_id: Uuid, amount: BigDecimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: amount,
            credit: zero(),
            description,
        }
    }

    pub fn credit(account_id: Uuid, amount: BigDecimal, description: Option<String>) -> Self {
        Self {
            account_id,
            debit: zero(),
            credit: amount,
            description,
        }
    }
}

/// Request to post a journal entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntryInput {
    pub description: String,
    /// Defaults to today
    #[serde(default)]
    pub entry_date: Option<NaiveDate>,
    #[serde(default)]
    pub reference_type: Option<String>,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    pub created_by: i64,
    pub lines: Vec<LineInput>,
}

impl JournalEntryInput {
    pub fn total_debits(&self) -> BigDecimal {
        self.lines.iter().map(|line| &line.debit).sum()
    }

    pub fn total_credits(&self) -> BigDecimal {
        self.lines.iter().map(|line| &line.credit).sum()
    }
}

/// Date window for journal and ledger queries; both bounds inclusive
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DateRange {
    pub start: Option<NaiveDate>,
    pub end: Option<NaiveDate>,
}

impl DateRange {
    pub fn new(start: Option<NaiveDate>, end: Option<NaiveDate>) -> Self {
        Self { start, end }
    }

    pub fn until(end: NaiveDate) -> Self {
        Self {
            start: None,
            end: Some(end),
        }
    }

    pub fn between(start: NaiveDate, end: NaiveDate) -> Self {
        Self {
            start: Some(start),
            end: Some(end),
        }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start.is_none_or(|start| date >= start) && self.end.is_none_or(|end| date <= end)
    }
}

/// Selects ledger lines for balance and ledger queries
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LineQuery {
    pub account_id: Option<Uuid>,
    pub range: DateRange,
    /// Restrict to posted entries; otherwise draft and void lines are returned too
    pub posted_only: bool,
}

impl LineQuery {
    pub fn for_account(account_id: Uuid) -> Self {
        Self {
            account_id: Some(account_id),
            ..Self::default()
        }
    }

    pub fn within(mut self, range: DateRange) -> Self {
        self.range = range;
        self
    }

    pub fn posted(mut self) -> Self {
        self.posted_only = true;
        self
    }

    pub fn matches(&self, posting: &LedgerPosting) -> bool {
        self.account_id
            .is_none_or(|account_id| posting.line.account_id == account_id)
            && self.range.contains(posting.entry_date)
            && (!self.posted_only || posting.status.counts_toward_balances())
    }
}

/// An account's derived balance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account: Account,
    /// Signed according to the account's normal balance side
    pub balance: BigDecimal,
    pub debit_total: BigDecimal,
    pub credit_total: BigDecimal,
}

impl AccountBalance {
    pub fn from_totals(account: Account, debit_total: BigDecimal, credit_total: BigDecimal) -> Self {
        let balance = account
            .normal_balance
            .signed_balance(&debit_total, &credit_total);
        Self {
            account,
            balance,
            debit_total,
            credit_total,
        }
    }
}

/// Errors that can occur in the ledger system
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Journal entry is not balanced: debits = {debits}, credits = {credits}")]
    BalanceMismatch {
        debits: BigDecimal,
        credits: BigDecimal,
    },
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Journal entry not found: {0}")]
    JournalEntryNotFound(String),
    #[error("Ledger configuration error: {0}")]
    Configuration(String),
    #[error("Storage error: {0}")]
    Storage(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<rusqlite::Error> for LedgerError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Storage(value.to_string())
    }
}

/// Result type for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normal_balance_follows_account_type() {
        assert_eq!(AccountType::Asset.normal_balance(), EntryType::Debit);
        assert_eq!(AccountType::Expense.normal_balance(), EntryType::Debit);
        assert_eq!(AccountType::Liability.normal_balance(), EntryType::Credit);
        assert_eq!(AccountType::Equity.normal_balance(), EntryType::Credit);
        assert_eq!(AccountType::Revenue.normal_balance(), EntryType::Credit);
    }

    #[test]
    fn signed_balance_uses_side() {
        let debits = BigDecimal::from(150);
        let credits = BigDecimal::from(30);
        assert_eq!(
            EntryType::Debit.signed_balance(&debits, &credits),
            BigDecimal::from(120)
        );
        assert_eq!(
            EntryType::Credit.signed_balance(&debits, &credits),
            BigDecimal::from(-120)
        );
    }

    #[test]
    fn line_side_requires_exactly_one_positive_amount() {
        let mut line = LedgerLine {
            id: Uuid::new_v4(),
            journal_entry_id: Uuid::new_v4(),
            account_id: Uuid::new_v4(),
            debit: BigDecimal::from(10),
            credit: BigDecimal::from(0),
            description: None,
        };
        assert_eq!(line.side(), Some(EntryType::Debit));

        line.credit = BigDecimal::from(5);
        assert_eq!(line.side(), None);

        line.debit = BigDecimal::from(0);
        assert_eq!(line.side(), Some(EntryType::Credit));

        line.credit = BigDecimal::from(0);
        assert_eq!(line.side(), None);
    }

    #[test]
    fn parses_account_type_names() {
        assert_eq!("Revenue".parse::<AccountType>().unwrap(), AccountType::Revenue);
        assert!("income".parse::<AccountType>().is_err());
    }

    #[test]
    fn date_range_is_inclusive() {
        let jan1 = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let jan31 = NaiveDate::from_ymd_opt(2024, 1, 31).unwrap();
        let range = DateRange::between(jan1, jan31);
        assert!(range.contains(jan1));
        assert!(range.contains(jan31));
        assert!(!range.contains(NaiveDate::from_ymd_opt(2024, 2, 1).unwrap()));
        assert!(DateRange::default().contains(jan1));
    }
}
