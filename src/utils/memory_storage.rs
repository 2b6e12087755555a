//! In-memory storage implementation for testing

use async_trait::async_trait;
use parking_lot::RwLock;
use std::sync::Arc;
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

#[derive(Debug, Default)]
struct MemoryState {
    /// Creation order
    accounts: Vec<Account>,
    /// Entry number order
    journal_entries: Vec<JournalEntry>,
    lines: Vec<LedgerLine>,
    last_sequence: u64,
}

impl MemoryState {
    fn account(&self, account_id: Uuid) -> Option<&Account> {
        self.accounts.iter().find(|account| account.id == account_id)
    }

    fn code_taken(&self, code: &str, except: Option<Uuid>) -> bool {
        self.accounts
            .iter()
            .any(|account| account.code == code && Some(account.id) != except)
    }

    fn posting(&self, line: &LedgerLine) -> Option<LedgerPosting> {
        let entry = self
            .journal_entries
            .iter()
            .find(|entry| entry.id == line.journal_entry_id)?;
        Some(LedgerPosting {
            line: line.clone(),
            entry_number: entry.entry_number.clone(),
            entry_date: entry.entry_date,
            status: entry.status,
        })
    }
}

/// In-memory storage implementation for testing and development
///
/// Clones share the same state.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    state: Arc<RwLock<MemoryState>>,
}

impl MemoryStorage {
    /// Create a new memory storage instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Row counts of (accounts, journal entries, ledger lines)
    pub fn row_counts(&self) -> (usize, usize, usize) {
        let state = self.state.read();
        (
            state.accounts.len(),
            state.journal_entries.len(),
            state.lines.len(),
        )
    }
}

#[async_trait]
impl LedgerStorage for MemoryStorage {
    async fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        let mut state = self.state.write();
        if state.code_taken(&account.code, None) {
            return Err(LedgerError::Validation(format!(
                "Account with code '{}' already exists",
                account.code
            )));
        }
        state.accounts.push(account.clone());
        Ok(())
    }

    async fn insert_accounts_if_empty(&self, accounts: &[Account]) -> LedgerResult<bool> {
        let mut state = self.state.write();
        if !state.accounts.is_empty() {
            return Ok(false);
        }
        state.accounts.extend(accounts.iter().cloned());
        Ok(true)
    }

    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Option<Account>> {
        Ok(self.state.read().account(account_id).cloned())
    }

    async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self
            .state
            .read()
            .accounts
            .iter()
            .find(|account| account.code == code)
            .cloned())
    }

    async fn list_accounts(&self, filter: &AccountFilter) -> LedgerResult<Vec<Account>> {
        Ok(self
            .state
            .read()
            .accounts
            .iter()
            .filter(|account| filter.matches(account))
            .cloned()
            .collect())
    }

    async fn update_account(&self, account: &Account) -> LedgerResult<()> {
        let mut state = self.state.write();
        if state.code_taken(&account.code, Some(account.id)) {
            return Err(LedgerError::Validation(format!(
                "Account with code '{}' already exists",
                account.code
            )));
        }
        match state.accounts.iter_mut().find(|a| a.id == account.id) {
            Some(stored) => {
                *stored = account.clone();
                Ok(())
            }
            None => Err(LedgerError::AccountNotFound(account.id.to_string())),
        }
    }

    async fn commit_journal_entry(
        &self,
        header: PendingJournalEntry,
        lines: &[LedgerLine],
        numbering: &EntryNumberFormat,
    ) -> LedgerResult<JournalEntry> {
        let mut state = self.state.write();

        // Mirror the relational constraints before touching anything.
        for line in lines {
            if line.side().is_none() {
                return Err(LedgerError::Storage(format!(
                    "ledger line {} violates the single-sided constraint",
                    line.id
                )));
            }
            if state.account(line.account_id).is_none() {
                return Err(LedgerError::Storage(format!(
                    "ledger line {} references missing account {}",
                    line.id, line.account_id
                )));
            }
            if line.journal_entry_id != header.id {
                return Err(LedgerError::Storage(format!(
                    "ledger line {} does not belong to journal entry {}",
                    line.id, header.id
                )));
            }
        }

        let sequence = state.last_sequence + 1;
        let entry = header.into_entry(numbering.format(sequence));
        if state
            .journal_entries
            .iter()
            .any(|existing| existing.entry_number == entry.entry_number)
        {
            return Err(LedgerError::Storage(format!(
                "duplicate entry number {}",
                entry.entry_number
            )));
        }

        state.last_sequence = sequence;
        state.journal_entries.push(entry.clone());
        state.lines.extend(lines.iter().cloned());
        Ok(entry)
    }

    async fn get_journal_entry(&self, entry_id: Uuid) -> LedgerResult<Option<JournalEntryDetail>> {
        let state = self.state.read();
        Ok(state
            .journal_entries
            .iter()
            .find(|entry| entry.id == entry_id)
            .map(|entry| JournalEntryDetail {
                entry: entry.clone(),
                lines: state
                    .lines
                    .iter()
                    .filter(|line| line.journal_entry_id == entry_id)
                    .cloned()
                    .collect(),
            }))
    }

    async fn list_journal_entries(&self, range: &DateRange) -> LedgerResult<Vec<JournalEntry>> {
        Ok(self
            .state
            .read()
            .journal_entries
            .iter()
            .filter(|entry| range.contains(entry.entry_date))
            .cloned()
            .collect())
    }

    async fn update_journal_status(
        &self,
        entry_id: Uuid,
        status: JournalStatus,
    ) -> LedgerResult<Option<JournalEntry>> {
        let mut state = self.state.write();
        Ok(state
            .journal_entries
            .iter_mut()
            .find(|entry| entry.id == entry_id)
            .map(|entry| {
                entry.status = status;
                entry.updated_at = chrono::Utc::now().naive_utc();
                entry.clone()
            }))
    }

    async fn ledger_postings(&self, query: &LineQuery) -> LedgerResult<Vec<LedgerPosting>> {
        let state = self.state.read();
        // Lines are appended per committed entry, so insertion order is entry order.
        Ok(state
            .lines
            .iter()
            .filter_map(|line| state.posting(line))
            .filter(|posting| query.matches(posting))
            .collect())
    }
}
