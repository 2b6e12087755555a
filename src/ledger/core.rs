//! Main ledger orchestrator that coordinates accounts, postings, statements and sales

use async_trait::async_trait;
use chrono::NaiveDate;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::LedgerConfig;
use crate::ledger::{
    AccountManager, JournalManager, SaleEvent, SaleLedgerStatus, SaleRecorder, StatementAggregator,
};
use crate::traits::*;
use crate::types::*;

/// Main ledger system that orchestrates all accounting operations
///
/// Cheap to clone when the storage is; clones share the same books.
pub struct Ledger<S: LedgerStorage> {
    account_manager: AccountManager<S>,
    journal_manager: JournalManager<S>,
    statements: StatementAggregator<S>,
    sales: SaleRecorder<S>,
}

impl<S: LedgerStorage + Clone> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            account_manager: self.account_manager.clone(),
            journal_manager: self.journal_manager.clone(),
            statements: self.statements.clone(),
            sales: self.sales.clone(),
        }
    }
}

impl<S: LedgerStorage + Clone> Ledger<S> {
    /// Create a new ledger with the given storage backend and default settings
    pub fn new(storage: S) -> Self {
        Self::with_config(storage, &LedgerConfig::default())
    }

    /// Create a ledger using the numbering and statement settings from `config`
    pub fn with_config(storage: S, config: &LedgerConfig) -> Self {
        Self::assemble(
            storage.clone(),
            AccountManager::new(storage.clone()),
            JournalManager::new(storage).with_numbering(config.numbering()),
            config,
        )
    }

    /// Create a ledger with custom validators
    pub fn with_validators(
        storage: S,
        config: &LedgerConfig,
        account_validator: Arc<dyn AccountValidator>,
        journal_validator: Arc<dyn JournalValidator>,
    ) -> Self {
        Self::assemble(
            storage.clone(),
            AccountManager::with_validator(storage.clone(), account_validator),
            JournalManager::with_validator(storage, journal_validator)
                .with_numbering(config.numbering()),
            config,
        )
    }

    fn assemble(
        storage: S,
        account_manager: AccountManager<S>,
        journal_manager: JournalManager<S>,
        config: &LedgerConfig,
    ) -> Self {
        Self {
            statements: StatementAggregator::new(storage.clone())
                .with_date_bounds(config.date_bounded_statements),
            sales: SaleRecorder::new(storage, journal_manager.clone()),
            account_manager,
            journal_manager,
        }
    }
}

impl<S: LedgerStorage> Ledger<S> {
    // Account operations
    /// Create a new account
    pub async fn create_account(&self, account: NewAccount) -> LedgerResult<Account> {
        self.account_manager.create_account(account).await
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: Uuid) -> LedgerResult<Option<Account>> {
        self.account_manager.get_account(account_id).await
    }

    /// Get an account by its code
    pub async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        self.account_manager.get_account_by_code(code).await
    }

    /// List accounts, optionally restricted to one type
    pub async fn list_accounts(
        &self,
        account_type: Option<AccountType>,
    ) -> LedgerResult<Vec<Account>> {
        let filter = match account_type {
            Some(account_type) => AccountFilter::of_type(account_type),
            None => AccountFilter::all(),
        };
        self.account_manager.list_accounts(&filter).await
    }

    /// Update an account
    pub async fn update_account(
        &self,
        account_id: Uuid,
        update: AccountUpdate,
    ) -> LedgerResult<Account> {
        self.account_manager.update_account(account_id, update).await
    }

    /// Deactivate an account
    pub async fn deactivate_account(&self, account_id: Uuid) -> LedgerResult<Account> {
        self.account_manager.deactivate_account(account_id).await
    }

    /// Seed the standard retail chart of accounts; a no-op once any account exists
    pub async fn seed_default_chart_of_accounts(&self) -> LedgerResult<Vec<Account>> {
        self.account_manager.seed_default_chart().await
    }

    // Journal operations
    /// Validate and post a journal entry
    pub async fn post_journal_entry(
        &self,
        input: JournalEntryInput,
    ) -> LedgerResult<JournalEntryDetail> {
        self.journal_manager.post_journal_entry(input).await
    }

    /// Get a journal entry with its lines
    pub async fn get_journal_entry(
        &self,
        entry_id: Uuid,
    ) -> LedgerResult<Option<JournalEntryDetail>> {
        self.journal_manager.get_journal_entry(entry_id).await
    }

    /// List journal entries within a date range
    pub async fn list_journal_entries(&self, range: DateRange) -> LedgerResult<Vec<JournalEntry>> {
        self.journal_manager.list_journal_entries(range).await
    }

    /// Void a posted journal entry
    pub async fn void_journal_entry(&self, entry_id: Uuid) -> LedgerResult<JournalEntry> {
        self.journal_manager.void_journal_entry(entry_id).await
    }

    // Sale operations
    /// Post the journal entry for a completed sale
    pub async fn record_sale(&self, sale: &SaleEvent) -> LedgerResult<JournalEntryDetail> {
        self.sales.record_sale(sale).await
    }

    /// Post a sale, reporting failure as a reconciliation flag
    pub async fn record_sale_or_flag(&self, sale: &SaleEvent) -> SaleLedgerStatus {
        self.sales.record_sale_or_flag(sale).await
    }

    // Balance and reporting operations
    /// Get account balance as of a specific date
    pub async fn get_account_balance(
        &self,
        account_id: Uuid,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<AccountBalance> {
        self.statements
            .get_account_balance(account_id, as_of_date)
            .await
    }

    /// Get the lines posted against an account
    pub async fn get_account_ledger(
        &self,
        account_id: Uuid,
        range: DateRange,
    ) -> LedgerResult<Vec<LedgerPosting>> {
        self.statements.get_account_ledger(account_id, range).await
    }

    /// Get trial balance as of a specific date
    pub async fn get_trial_balance(&self, as_of_date: NaiveDate) -> LedgerResult<TrialBalance> {
        self.statements.get_trial_balance(as_of_date).await
    }

    /// Validate the integrity of the ledger
    pub async fn validate_integrity(
        &self,
        as_of_date: NaiveDate,
    ) -> LedgerResult<LedgerIntegrityReport> {
        self.statements.validate_integrity(as_of_date).await
    }
}

#[async_trait]
impl<S: LedgerStorage> ReportGenerator for Ledger<S> {
    async fn generate_profit_and_loss(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<ProfitAndLoss> {
        self.statements
            .generate_profit_and_loss(start_date, end_date)
            .await
    }

    async fn generate_balance_sheet(&self, as_of_date: NaiveDate) -> LedgerResult<BalanceSheet> {
        self.statements.generate_balance_sheet(as_of_date).await
    }

    async fn generate_cash_flow_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<CashFlowStatement> {
        self.statements
            .generate_cash_flow_statement(start_date, end_date)
            .await
    }
}
