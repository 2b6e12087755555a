//! Translation of completed retail sales into journal entries

use bigdecimal::BigDecimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, instrument};
use uuid::Uuid;

use crate::ledger::account::chart::codes;
use crate::ledger::{JournalEntryBuilder, JournalManager};
use crate::traits::*;
use crate::types::*;
use crate::utils::money::parse_amount;

/// How the customer paid
///
/// Every method settles into the cash account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Mpesa,
    Credit,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Mpesa => "mpesa",
            PaymentMethod::Credit => "credit",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "cash" => Ok(PaymentMethod::Cash),
            "mpesa" => Ok(PaymentMethod::Mpesa),
            "credit" => Ok(PaymentMethod::Credit),
            other => Err(LedgerError::Validation(format!(
                "Unknown payment method '{other}'"
            ))),
        }
    }
}

/// Accounts a sale posting touches, resolved by well-known code
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountRole {
    Cash,
    SalesRevenue,
    CostOfGoodsSold,
    Inventory,
}

impl AccountRole {
    pub fn code(&self) -> &'static str {
        match self {
            AccountRole::Cash => codes::CASH,
            AccountRole::SalesRevenue => codes::SALES_REVENUE,
            AccountRole::CostOfGoodsSold => codes::COST_OF_GOODS_SOLD,
            AccountRole::Inventory => codes::INVENTORY,
        }
    }
}

/// A completed sale as reported by checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleEvent {
    pub sale_id: i64,
    pub user_id: i64,
    pub total: BigDecimal,
    /// Computed by the caller from quantities and cost prices
    pub cost_of_goods_sold: BigDecimal,
    pub payment_method: PaymentMethod,
}

impl SaleEvent {
    /// Build an event from the checkout's wire form (decimal strings, method name)
    pub fn parse(
        sale_id: i64,
        user_id: i64,
        total: &str,
        cost_of_goods_sold: &str,
        payment_method: &str,
    ) -> LedgerResult<Self> {
        Ok(Self {
            sale_id,
            user_id,
            total: parse_amount(total)?,
            cost_of_goods_sold: parse_amount(cost_of_goods_sold)?,
            payment_method: payment_method.parse()?,
        })
    }
}

/// Outcome reported back to checkout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SaleLedgerStatus {
    Recorded {
        journal_entry_id: Uuid,
        entry_number: String,
    },
    /// The sale happened but is not in the books
    NeedsReconciliation { reason: String },
}

/// Posts sales through the journal
pub struct SaleRecorder<S: LedgerStorage> {
    storage: S,
    journal: JournalManager<S>,
}

impl<S: LedgerStorage + Clone> Clone for SaleRecorder<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            journal: self.journal.clone(),
        }
    }
}

impl<S: LedgerStorage> SaleRecorder<S> {
    pub fn new(storage: S, journal: JournalManager<S>) -> Self {
        Self { storage, journal }
    }

    async fn resolve(&self, role: AccountRole) -> LedgerResult<Account> {
        self.storage
            .get_account_by_code(role.code())
            .await?
            .ok_or_else(|| {
                LedgerError::Configuration(format!(
                    "Required account {} ({:?}) is missing from the chart of accounts",
                    role.code(),
                    role
                ))
            })
    }

    /// Post the balanced entry for a sale:
    /// Dr Cash / Cr Sales Revenue for the total, Dr COGS / Cr Inventory for the cost.
    #[instrument(
        name = "record_sale",
        skip(self, sale),
        fields(sale_id = sale.sale_id, method = %sale.payment_method)
    )]
    pub async fn record_sale(&self, sale: &SaleEvent) -> LedgerResult<JournalEntryDetail> {
        let zero = BigDecimal::from(0);
        if sale.total <= zero {
            return Err(LedgerError::Validation(format!(
                "Sale {} total must be positive, got {}",
                sale.sale_id, sale.total
            )));
        }
        if sale.cost_of_goods_sold < zero {
            return Err(LedgerError::Validation(format!(
                "Sale {} cost of goods sold cannot be negative, got {}",
                sale.sale_id, sale.cost_of_goods_sold
            )));
        }

        let cash = self.resolve(AccountRole::Cash).await?;
        let revenue = self.resolve(AccountRole::SalesRevenue).await?;
        let cogs = self.resolve(AccountRole::CostOfGoodsSold).await?;
        let inventory = self.resolve(AccountRole::Inventory).await?;

        let mut builder = JournalEntryBuilder::new(
            format!("Sale #{} ({})", sale.sale_id, sale.payment_method),
            sale.user_id,
        )
        .reference("sale", sale.sale_id.to_string())
        .debit(
            cash.id,
            sale.total.clone(),
            Some(format!("Payment received via {}", sale.payment_method)),
        )
        .credit(revenue.id, sale.total.clone(), Some("Sales revenue".to_string()));

        // A zero cost line would be neither a debit nor a credit.
        if sale.cost_of_goods_sold > zero {
            builder = builder
                .debit(
                    cogs.id,
                    sale.cost_of_goods_sold.clone(),
                    Some("Cost of goods sold".to_string()),
                )
                .credit(
                    inventory.id,
                    sale.cost_of_goods_sold.clone(),
                    Some("Inventory reduction".to_string()),
                );
        }

        self.journal.post_journal_entry(builder.build()?).await
    }

    /// Like [`record_sale`](Self::record_sale), but a failure becomes a
    /// reconciliation flag for checkout instead of an error.
    pub async fn record_sale_or_flag(&self, sale: &SaleEvent) -> SaleLedgerStatus {
        match self.record_sale(sale).await {
            Ok(detail) => SaleLedgerStatus::Recorded {
                journal_entry_id: detail.entry.id,
                entry_number: detail.entry.entry_number,
            },
            Err(err) => {
                error!(
                    sale_id = sale.sale_id,
                    error = %err,
                    "sale could not be posted to the ledger; flagged for reconciliation"
                );
                SaleLedgerStatus::NeedsReconciliation {
                    reason: err.to_string(),
                }
            }
        }
    }
}
