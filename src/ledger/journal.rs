//! Journal entry posting and management

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::sync::Arc;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;
use crate::utils::money::normalize_amount;
use crate::utils::validation::validate_journal_input;

/// Posting engine: the only path through which ledger lines are written
pub struct JournalManager<S: LedgerStorage> {
    storage: S,
    validator: Arc<dyn JournalValidator>,
    numbering: EntryNumberFormat,
}

impl<S: LedgerStorage + Clone> Clone for JournalManager<S> {
    fn clone(&self) -> Self {
        Self {
            storage: self.storage.clone(),
            validator: Arc::clone(&self.validator),
            numbering: self.numbering.clone(),
        }
    }
}

impl<S: LedgerStorage> JournalManager<S> {
    /// Create a new journal manager
    pub fn new(storage: S) -> Self {
        Self {
            storage,
            validator: Arc::new(DefaultJournalValidator),
            numbering: EntryNumberFormat::default(),
        }
    }

    /// Create a new journal manager with custom validator
    pub fn with_validator(storage: S, validator: Arc<dyn JournalValidator>) -> Self {
        Self {
            storage,
            validator,
            numbering: EntryNumberFormat::default(),
        }
    }

    /// Use a different entry number layout
    pub fn with_numbering(mut self, numbering: EntryNumberFormat) -> Self {
        self.numbering = numbering;
        self
    }

    /// Validate and post a journal entry with status "posted".
    ///
    /// Nothing is written unless every check passes; the header and all lines are
    /// committed as one unit of work.
    #[instrument(
        name = "post_journal_entry",
        skip(self, input),
        fields(lines = input.lines.len(), reference = ?input.reference_id)
    )]
    pub async fn post_journal_entry(
        &self,
        input: JournalEntryInput,
    ) -> LedgerResult<JournalEntryDetail> {
        if let Err(err) = self.validate(&input).await {
            warn!(error = %err, description = %input.description, "journal entry rejected");
            return Err(err);
        }

        let now = chrono::Utc::now().naive_utc();
        let header = PendingJournalEntry {
            id: Uuid::new_v4(),
            entry_date: input.entry_date.unwrap_or_else(|| now.date()),
            description: input.description,
            reference_type: input.reference_type,
            reference_id: input.reference_id,
            created_by: input.created_by,
            status: JournalStatus::Posted,
            notes: input.notes,
            created_at: now,
        };
        let lines = input
            .lines
            .into_iter()
            .map(|line| {
                Ok(LedgerLine {
                    id: Uuid::new_v4(),
                    journal_entry_id: header.id,
                    account_id: line.account_id,
                    debit: normalize_amount(&line.debit)?,
                    credit: normalize_amount(&line.credit)?,
                    description: line.description,
                })
            })
            .collect::<LedgerResult<Vec<_>>>()?;

        let entry = self
            .storage
            .commit_journal_entry(header, &lines, &self.numbering)
            .await?;
        let detail = JournalEntryDetail { entry, lines };

        info!(
            entry_number = %detail.entry.entry_number,
            debits = %detail.total_debits(),
            credits = %detail.total_credits(),
            "journal entry posted"
        );
        Ok(detail)
    }

    async fn validate(&self, input: &JournalEntryInput) -> LedgerResult<()> {
        self.validator.validate_entry(input)?;

        for (index, line) in input.lines.iter().enumerate() {
            match self.storage.get_account(line.account_id).await? {
                None => {
                    return Err(LedgerError::Validation(format!(
                        "line {}: account {} does not exist",
                        index + 1,
                        line.account_id
                    )))
                }
                Some(account) if !account.is_active => {
                    return Err(LedgerError::Validation(format!(
                        "line {}: account '{}' is inactive",
                        index + 1,
                        account.code
                    )))
                }
                Some(_) => {}
            }
        }

        Ok(())
    }

    /// Get a journal entry with its lines
    pub async fn get_journal_entry(
        &self,
        entry_id: Uuid,
    ) -> LedgerResult<Option<JournalEntryDetail>> {
        self.storage.get_journal_entry(entry_id).await
    }

    /// Get a journal entry with its lines, returning an error if not found
    pub async fn get_journal_entry_required(
        &self,
        entry_id: Uuid,
    ) -> LedgerResult<JournalEntryDetail> {
        self.storage
            .get_journal_entry(entry_id)
            .await?
            .ok_or_else(|| LedgerError::JournalEntryNotFound(entry_id.to_string()))
    }

    /// List journal entry headers dated within the range
    pub async fn list_journal_entries(&self, range: DateRange) -> LedgerResult<Vec<JournalEntry>> {
        self.storage.list_journal_entries(&range).await
    }

    /// Mark a posted entry void. Its lines stay in place but stop counting toward
    /// balances; no reversing entry is created.
    #[instrument(name = "void_journal_entry", skip(self))]
    pub async fn void_journal_entry(&self, entry_id: Uuid) -> LedgerResult<JournalEntry> {
        let detail = self.get_journal_entry_required(entry_id).await?;

        match detail.entry.status {
            JournalStatus::Posted => {}
            JournalStatus::Void => {
                return Err(LedgerError::Validation(format!(
                    "Journal entry {} is already void",
                    detail.entry.entry_number
                )))
            }
            JournalStatus::Draft => {
                return Err(LedgerError::Validation(format!(
                    "Journal entry {} is a draft; only posted entries can be voided",
                    detail.entry.entry_number
                )))
            }
        }

        let entry = self
            .storage
            .update_journal_status(entry_id, JournalStatus::Void)
            .await?
            .ok_or_else(|| LedgerError::JournalEntryNotFound(entry_id.to_string()))?;
        warn!(entry_number = %entry.entry_number, "journal entry voided");
        Ok(entry)
    }
}

/// Builder for journal entry requests
#[derive(Debug)]
pub struct JournalEntryBuilder {
    input: JournalEntryInput,
}

impl JournalEntryBuilder {
    /// Create a new journal entry builder
    pub fn new(description: impl Into<String>, created_by: i64) -> Self {
        Self {
            input: JournalEntryInput {
                description: description.into(),
                entry_date: None,
                reference_type: None,
                reference_id: None,
                notes: None,
                created_by,
                lines: Vec::new(),
            },
        }
    }

    /// Backdate (or postdate) the entry
    pub fn date(mut self, date: NaiveDate) -> Self {
        self.input.entry_date = Some(date);
        self
    }

    /// Link the entry to the business event it records
    pub fn reference(
        mut self,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        self.input.reference_type = Some(reference_type.into());
        self.input.reference_id = Some(reference_id.into());
        self
    }

    pub fn notes(mut self, notes: impl Into<String>) -> Self {
        self.input.notes = Some(notes.into());
        self
    }

    /// Add a debit line
    pub fn debit(
        mut self,
        account_id: Uuid,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        self.input
            .lines
            .push(LineInput::debit(account_id, amount, description));
        self
    }

    /// Add a credit line
    pub fn credit(
        mut self,
        account_id: Uuid,
        amount: BigDecimal,
        description: Option<String>,
    ) -> Self {
        self.input
            .lines
            .push(LineInput::credit(account_id, amount, description));
        self
    }

    /// Add a custom line
    pub fn line(mut self, line: LineInput) -> Self {
        self.input.lines.push(line);
        self
    }

    /// Build the request, running the structural double-entry checks
    pub fn build(self) -> LedgerResult<JournalEntryInput> {
        validate_journal_input(&self.input)?;
        Ok(self.input)
    }
}

/// Common journal entry patterns
pub mod patterns {
    use super::*;

    /// Owner puts cash into the business (debit cash, credit capital)
    pub fn owner_investment(
        date: NaiveDate,
        cash_account_id: Uuid,
        capital_account_id: Uuid,
        amount: BigDecimal,
        created_by: i64,
    ) -> LedgerResult<JournalEntryInput> {
        JournalEntryBuilder::new("Owner investment", created_by)
            .date(date)
            .debit(
                cash_account_id,
                amount.clone(),
                Some("Cash invested by owner".to_string()),
            )
            .credit(
                capital_account_id,
                amount,
                Some("Owner's capital contribution".to_string()),
            )
            .build()
    }

    /// Pay an expense in cash (debit expense, credit cash)
    pub fn expense_payment(
        date: NaiveDate,
        description: impl Into<String>,
        expense_account_id: Uuid,
        cash_account_id: Uuid,
        amount: BigDecimal,
        created_by: i64,
    ) -> LedgerResult<JournalEntryInput> {
        JournalEntryBuilder::new(description, created_by)
            .date(date)
            .debit(expense_account_id, amount.clone(), None)
            .credit(cash_account_id, amount, None)
            .build()
    }
}
