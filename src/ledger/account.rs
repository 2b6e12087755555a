//! Chart of accounts management

use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

/// Account manager for handling chart of accounts operations
pub struct AccountManager<S: LedgerStorage> {
    storage: S,
    validator: Arc<dyn AccountValidator>,
}

impl<S: LedgerStorage + Clone> Clone for AccountManager<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            validator: Arc::clone(&self.validator),
        }
    }
}

impl<S: LedgerStorage> AccountManager<S> {
    /// Create a new account manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Arc::new(DefaultAccountValidator),
        }
    }

    /// Create a new account manager with custom validator
    pub fn with_validator(storage: S, validator: Arc<dyn AccountValidator>) -> Self {
        Self { storage, validator }
    }

    /// Create a new account
    pub async fn create_account(&self, new: NewAccount) -> LedgerResult<Account> {
        let account = Account::from_new(new);

        self.validator.validate_account(&account)?;

        if self.storage.get_account_by_code(&account.code).await?.is_some() {
            return Err(LedgerError::Validation(format!(
                "Account with code '{}' already exists",
                account.code
            )));
        }

        if let Some(parent_id) = account.parent_id {
            self.ensure_parent_exists(parent_id).await?;
        }

        // Storage enforces code uniqueness again for concurrent creators.
        self.storage.insert_account(&account).await?;
        debug!(code = %account.code, id = %account.id, "account created");

        Ok(account)
    }

    /// Get an account by ID
    pub async fn get_account(&self, account_id: Uuid) -> LedgerResult<Option<Account>> {
        self.storage.get_account(account_id).await
    }

    /// Get an account by ID, returning an error if not found
    pub async fn get_account_required(&self, account_id: Uuid) -> LedgerResult<Account> {
        self.storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))
    }

    /// Get an account by its code
    pub async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        self.storage.get_account_by_code(code).await
    }

    /// List accounts in creation order
    pub async fn list_accounts(&self, filter: &AccountFilter) -> LedgerResult<Vec<Account>> {
        self.storage.list_accounts(filter).await
    }

    /// Apply a partial update to an account
    pub async fn update_account(
        &self,
        account_id: Uuid,
        update: AccountUpdate,
    ) -> LedgerResult<Account> {
        let mut account = self.get_account_required(account_id).await?;

        if let Some(code) = update.code {
            if code != account.code {
                if account.is_system {
                    return Err(LedgerError::Validation(format!(
                        "System account '{}' cannot change its code",
                        account.code
                    )));
                }
                if self.storage.get_account_by_code(&code).await?.is_some() {
                    return Err(LedgerError::Validation(format!(
                        "Account with code '{code}' already exists"
                    )));
                }
                account.code = code;
            }
        }
        if let Some(name) = update.name {
            account.name = name;
        }
        if let Some(subtype) = update.subtype {
            account.subtype = Some(subtype);
        }
        if let Some(description) = update.description {
            account.description = Some(description);
        }
        if let Some(is_active) = update.is_active {
            account.is_active = is_active;
        }
        if let Some(parent_id) = update.parent_id {
            self.ensure_parent_exists(parent_id).await?;
            account.parent_id = Some(parent_id);
        }
        account.updated_at = chrono::Utc::now().naive_utc();

        self.validator.validate_account(&account)?;
        self.storage.update_account(&account).await?;

        Ok(account)
    }

    /// Deactivate an account. Accounts are never deleted.
    pub async fn deactivate_account(&self, account_id: Uuid) -> LedgerResult<Account> {
        self.update_account(
            account_id,
            AccountUpdate {
                is_active: Some(false),
                ..AccountUpdate::default()
            },
        )
        .await
    }

    /// Insert the default retail chart if the chart is empty.
    ///
    /// Returns the accounts created; empty when the chart already had accounts.
    pub async fn seed_default_chart(&self) -> LedgerResult<Vec<Account>> {
        let accounts: Vec<Account> = chart::default_chart()
            .into_iter()
            .map(Account::from_new)
            .collect();
        for account in &accounts {
            self.validator.validate_account(account)?;
        }

        if self.storage.insert_accounts_if_empty(&accounts).await? {
            debug!(count = accounts.len(), "seeded default chart of accounts");
            Ok(accounts)
        } else {
            debug!("chart of accounts already present, seeding skipped");
            Ok(Vec::new())
        }
    }

    async fn ensure_parent_exists(&self, parent_id: Uuid) -> LedgerResult<()> {
        if self.storage.get_account(parent_id).await?.is_none() {
            return Err(LedgerError::Validation(format!(
                "Parent account '{parent_id}' does not exist"
            )));
        }
        Ok(())
    }
}

/// The standard retail chart of accounts
pub mod chart {
    use super::*;

    /// Well-known account codes
    pub mod codes {
        pub const CASH: &str = "1000";
        pub const ACCOUNTS_RECEIVABLE: &str = "1100";
        pub const INVENTORY: &str = "1200";
        pub const EQUIPMENT: &str = "1500";
        pub const ACCOUNTS_PAYABLE: &str = "2000";
        pub const TAX_PAYABLE: &str = "2100";
        pub const OWNERS_CAPITAL: &str = "3000";
        pub const RETAINED_EARNINGS: &str = "3100";
        pub const SALES_REVENUE: &str = "4000";
        pub const COST_OF_GOODS_SOLD: &str = "5000";
        pub const RENT_EXPENSE: &str = "6000";
        pub const UTILITIES_EXPENSE: &str = "6100";
        pub const SALARIES_EXPENSE: &str = "6200";
        pub const SUPPLIES_EXPENSE: &str = "6300";
        pub const TRANSPORT_EXPENSE: &str = "6400";
        pub const MISCELLANEOUS_EXPENSE: &str = "6900";
    }

    /// Accounts inserted by [`AccountManager::seed_default_chart`], in creation order.
    /// Discretionary expense categories are not system accounts.
    pub fn default_chart() -> Vec<NewAccount> {
        use AccountType::*;

        let system = |code: &str, name: &str, account_type: AccountType, subtype: &str| {
            NewAccount::new(code, name, account_type)
                .subtype(subtype)
                .system()
        };
        let discretionary = |code: &str, name: &str| {
            NewAccount::new(code, name, Expense).subtype("operating_expense")
        };

        vec![
            system(codes::CASH, "Cash", Asset, "current_asset"),
            system(
                codes::ACCOUNTS_RECEIVABLE,
                "Accounts Receivable",
                Asset,
                "current_asset",
            ),
            system(codes::INVENTORY, "Inventory", Asset, "current_asset"),
            system(codes::EQUIPMENT, "Equipment", Asset, "fixed_asset"),
            system(
                codes::ACCOUNTS_PAYABLE,
                "Accounts Payable",
                Liability,
                "current_liability",
            ),
            system(codes::TAX_PAYABLE, "Tax Payable", Liability, "current_liability"),
            system(codes::OWNERS_CAPITAL, "Owner's Capital", Equity, "owner_equity"),
            system(
                codes::RETAINED_EARNINGS,
                "Retained Earnings",
                Equity,
                "retained_earnings",
            ),
            system(
                codes::SALES_REVENUE,
                "Sales Revenue",
                Revenue,
                "operating_revenue",
            ),
            system(
                codes::COST_OF_GOODS_SOLD,
                "Cost of Goods Sold",
                Expense,
                "cost_of_sales",
            ),
            system(codes::RENT_EXPENSE, "Rent Expense", Expense, "operating_expense"),
            system(
                codes::UTILITIES_EXPENSE,
                "Utilities Expense",
                Expense,
                "operating_expense",
            ),
            system(
                codes::SALARIES_EXPENSE,
                "Salaries and Wages",
                Expense,
                "operating_expense",
            ),
            discretionary(codes::SUPPLIES_EXPENSE, "Supplies Expense"),
            discretionary(codes::TRANSPORT_EXPENSE, "Transport Expense"),
            discretionary(codes::MISCELLANEOUS_EXPENSE, "Miscellaneous Expense"),
        ]
    }
}
