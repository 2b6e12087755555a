//! Balance derivation and financial statements
//!
//! Everything here is a read-only projection over posted ledger lines. Draft and
//! void entries never contribute to a balance.

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;
use crate::utils::money::{balance_tolerance, within_tolerance};

/// Computes balances and statements from the ledger
pub struct StatementAggregator<S: LedgerStorage> {
    storage: S,
    date_bounded: bool,
}

impl<S: LedgerStorage + Clone> Clone for StatementAggregator<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            date_bounded: self.date_bounded,
        }
    }
}

type Totals = (BigDecimal, BigDecimal);

impl<S: LedgerStorage> StatementAggregator<S> {
    /// Create an aggregator whose statements respect their date arguments
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            date_bounded: true,
        }
    }

    /// When `false`, statements aggregate the whole ledger history and only echo
    /// their date arguments.
    pub fn with_date_bounds(mut self, date_bounded: bool) -> Self {
        self.date_bounded = date_bounded;
        self
    }

    /// Balance of one account from its posted lines dated on or before `as_of_date`
    pub async fn get_account_balance(
        &self,
        account_id: Uuid,
        as_of_date: Option<NaiveDate>,
    ) -> LedgerResult<AccountBalance> {
        let account = self
            .storage
            .get_account(account_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(account_id.to_string()))?;

        let query = LineQuery::for_account(account_id)
            .within(DateRange::new(None, as_of_date))
            .posted();
        let postings = self.storage.ledger_postings(&query).await?;
        let debit_total = postings.iter().map(|p| &p.line.debit).sum();
        let credit_total = postings.iter().map(|p| &p.line.credit).sum();

        Ok(AccountBalance::from_totals(account, debit_total, credit_total))
    }

    /// Every line posted against an account in the range, whatever the entry status
    pub async fn get_account_ledger(
        &self,
        account_id: Uuid,
        range: DateRange,
    ) -> LedgerResult<Vec<LedgerPosting>> {
        self.storage
            .ledger_postings(&LineQuery::for_account(account_id).within(range))
            .await
    }

    async fn posted_lines(&self, range: DateRange) -> LedgerResult<Vec<LedgerPosting>> {
        self.storage
            .ledger_postings(&LineQuery::default().within(range).posted())
            .await
    }

    /// Raw posted totals per account for one pass over the ledger
    async fn totals_by_account(&self, range: DateRange) -> LedgerResult<HashMap<Uuid, Totals>> {
        Ok(sum_by_account(&self.posted_lines(range).await?))
    }

    async fn section(
        &self,
        account_type: AccountType,
        totals: &HashMap<Uuid, Totals>,
    ) -> LedgerResult<StatementSection> {
        let accounts = self
            .storage
            .list_accounts(&AccountFilter::of_type(account_type).active())
            .await?;
        let balances = accounts
            .into_iter()
            .map(|account| {
                let (debits, credits) = totals
                    .get(&account.id)
                    .cloned()
                    .unwrap_or_else(|| (BigDecimal::from(0), BigDecimal::from(0)));
                AccountBalance::from_totals(account, debits, credits)
            })
            .collect();
        Ok(StatementSection::from_balances(balances))
    }

    fn period(&self, start_date: NaiveDate, end_date: NaiveDate) -> DateRange {
        if self.date_bounded {
            DateRange::between(start_date, end_date)
        } else {
            DateRange::default()
        }
    }

    fn up_to(&self, as_of_date: NaiveDate) -> DateRange {
        if self.date_bounded {
            DateRange::until(as_of_date)
        } else {
            DateRange::default()
        }
    }

    /// Trial balance: each account in its debit or credit column as of a date
    pub async fn get_trial_balance(&self, as_of_date: NaiveDate) -> LedgerResult<TrialBalance> {
        let postings = self.posted_lines(DateRange::until(as_of_date)).await?;
        let totals = sum_by_account(&postings);
        let entries: HashSet<Uuid> = postings
            .iter()
            .map(|posting| posting.line.journal_entry_id)
            .collect();
        let accounts = self.storage.list_accounts(&AccountFilter::all()).await?;

        let zero = BigDecimal::from(0);
        let mut lines = Vec::with_capacity(accounts.len());
        let mut total_debits = BigDecimal::from(0);
        let mut total_credits = BigDecimal::from(0);

        for account in accounts {
            let (debits, credits) = totals
                .get(&account.id)
                .cloned()
                .unwrap_or_else(|| (zero.clone(), zero.clone()));
            // Positive means a debit-side balance regardless of the normal side.
            let net = &debits - &credits;
            let (debit_balance, credit_balance) = if net >= zero {
                total_debits += &net;
                (Some(net), None)
            } else {
                let amount = net.abs();
                total_credits += &amount;
                (None, Some(amount))
            };
            lines.push(TrialBalanceLine {
                account,
                debit_balance,
                credit_balance,
            });
        }

        // Each entry may carry up to one tolerance of difference.
        let allowed = balance_tolerance() * BigDecimal::from(entries.len() as u64);
        let is_balanced = (&total_debits - &total_credits).abs() <= allowed;
        Ok(TrialBalance {
            as_of_date,
            lines,
            total_debits,
            total_credits,
            is_balanced,
        })
    }

    /// Check the trial balance and that every posted entry balances
    pub async fn validate_integrity(
        &self,
        as_of_date: NaiveDate,
    ) -> LedgerResult<LedgerIntegrityReport> {
        let trial_balance = self.get_trial_balance(as_of_date).await?;
        let mut issues = Vec::new();

        if !trial_balance.is_balanced {
            issues.push(format!(
                "Trial balance is not balanced: debits = {}, credits = {}",
                trial_balance.total_debits, trial_balance.total_credits
            ));
        }

        let postings = self.posted_lines(DateRange::until(as_of_date)).await?;
        let mut per_entry: HashMap<String, Totals> = HashMap::new();
        for posting in &postings {
            if posting.line.side().is_none() {
                issues.push(format!(
                    "Line {} of {} is not single-sided",
                    posting.line.id, posting.entry_number
                ));
            }
            let entry = per_entry
                .entry(posting.entry_number.clone())
                .or_insert_with(|| (BigDecimal::from(0), BigDecimal::from(0)));
            entry.0 += &posting.line.debit;
            entry.1 += &posting.line.credit;
        }

        let mut entry_numbers: Vec<&String> = per_entry.keys().collect();
        entry_numbers.sort();
        for entry_number in entry_numbers {
            let (debits, credits) = &per_entry[entry_number];
            if !within_tolerance(debits, credits) {
                issues.push(format!(
                    "Journal entry {entry_number} is not balanced: debits = {debits}, credits = {credits}"
                ));
            }
        }

        Ok(LedgerIntegrityReport {
            as_of_date,
            is_valid: issues.is_empty(),
            issues,
            trial_balance_total_debits: trial_balance.total_debits,
            trial_balance_total_credits: trial_balance.total_credits,
            entries_checked: per_entry.len(),
        })
    }
}

fn sum_by_account(postings: &[LedgerPosting]) -> HashMap<Uuid, Totals> {
    let mut totals: HashMap<Uuid, Totals> = HashMap::new();
    for posting in postings {
        let entry = totals
            .entry(posting.line.account_id)
            .or_insert_with(|| (BigDecimal::from(0), BigDecimal::from(0)));
        entry.0 += &posting.line.debit;
        entry.1 += &posting.line.credit;
    }
    totals
}

#[async_trait]
impl<S: LedgerStorage> ReportGenerator for StatementAggregator<S> {
    async fn generate_profit_and_loss(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<ProfitAndLoss> {
        let totals = self
            .totals_by_account(self.period(start_date, end_date))
            .await?;
        let revenue = self.section(AccountType::Revenue, &totals).await?;
        let expenses = self.section(AccountType::Expense, &totals).await?;
        let net_income = &revenue.total - &expenses.total;

        Ok(ProfitAndLoss {
            start_date,
            end_date,
            revenue,
            expenses,
            net_income,
        })
    }

    async fn generate_balance_sheet(&self, as_of_date: NaiveDate) -> LedgerResult<BalanceSheet> {
        let totals = self.totals_by_account(self.up_to(as_of_date)).await?;

        Ok(BalanceSheet {
            as_of_date,
            assets: self.section(AccountType::Asset, &totals).await?,
            liabilities: self.section(AccountType::Liability, &totals).await?,
            equity: self.section(AccountType::Equity, &totals).await?,
        })
    }

    async fn generate_cash_flow_statement(
        &self,
        start_date: NaiveDate,
        end_date: NaiveDate,
    ) -> LedgerResult<CashFlowStatement> {
        let profit_and_loss = self.generate_profit_and_loss(start_date, end_date).await?;

        let operating_activities = CashFlowSection::from_items(vec![CashFlowItem {
            description: "Net income".to_string(),
            amount: profit_and_loss.net_income,
        }]);
        // Capital transactions are not modelled yet.
        let investing_activities = CashFlowSection::empty();
        let financing_activities = CashFlowSection::empty();
        let net_cash_flow = &operating_activities.total
            + &investing_activities.total
            + &financing_activities.total;

        Ok(CashFlowStatement {
            start_date,
            end_date,
            operating_activities,
            investing_activities,
            financing_activities,
            net_cash_flow,
        })
    }
}
