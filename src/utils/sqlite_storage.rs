//! SQLite-backed ledger storage

use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::{NaiveDate, NaiveDateTime};
use parking_lot::Mutex;
use rusqlite::{ffi, params, Connection, TransactionBehavior};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use crate::traits::*;
use crate::types::*;

const LEDGER_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS accounts (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    code TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    account_type TEXT NOT NULL
        CHECK (account_type IN ('asset', 'liability', 'equity', 'revenue', 'expense')),
    subtype TEXT,
    normal_balance TEXT NOT NULL CHECK (normal_balance IN ('debit', 'credit')),
    description TEXT,
    is_active INTEGER NOT NULL DEFAULT 1,
    is_system INTEGER NOT NULL DEFAULT 0,
    parent_id TEXT REFERENCES accounts(id),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS journal_entries (
    sequence INTEGER PRIMARY KEY,
    id TEXT NOT NULL UNIQUE,
    entry_number TEXT NOT NULL UNIQUE,
    entry_date TEXT NOT NULL,
    description TEXT NOT NULL,
    reference_type TEXT,
    reference_id TEXT,
    created_by INTEGER NOT NULL,
    status TEXT NOT NULL CHECK (status IN ('draft', 'posted', 'void')),
    notes TEXT,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS ledger_entries (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    id TEXT NOT NULL UNIQUE,
    journal_entry_id TEXT NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
    account_id TEXT NOT NULL REFERENCES accounts(id),
    debit TEXT NOT NULL,
    credit TEXT NOT NULL,
    description TEXT,
    CHECK (
        (CAST(debit AS REAL) > 0 AND CAST(credit AS REAL) = 0)
        OR (CAST(debit AS REAL) = 0 AND CAST(credit AS REAL) > 0)
    )
);
CREATE INDEX IF NOT EXISTS ledger_entries_idx_account ON ledger_entries(account_id);
CREATE INDEX IF NOT EXISTS ledger_entries_idx_journal ON ledger_entries(journal_entry_id);
CREATE INDEX IF NOT EXISTS journal_entries_idx_date ON journal_entries(entry_date);
CREATE INDEX IF NOT EXISTS journal_entries_idx_reference
    ON journal_entries(reference_type, reference_id);
"#;

const ACCOUNT_COLUMNS: &str = "id, code, name, account_type, subtype, normal_balance, \
     description, is_active, is_system, parent_id, created_at, updated_at";

const JOURNAL_COLUMNS: &str = "id, entry_number, entry_date, description, reference_type, \
     reference_id, created_by, status, notes, created_at, updated_at";

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";
const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// SQLite-backed ledger storage.
///
/// One connection is shared behind a mutex; postings run inside `BEGIN IMMEDIATE`
/// transactions so number allocation and inserts commit together.
#[derive(Clone, Debug)]
pub struct SqliteStorage {
    conn: Arc<Mutex<Connection>>,
    max_attempts: u32,
}

impl SqliteStorage {
    /// Open (or create) a database file
    pub fn open(path: impl AsRef<Path>) -> LedgerResult<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .map_err(|err| LedgerError::Storage(err.to_string()))?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
        Self::initialize(conn)
    }

    /// Private in-memory database, mostly for tests
    pub fn in_memory() -> LedgerResult<Self> {
        Self::initialize(Connection::open_in_memory()?)
    }

    fn initialize(conn: Connection) -> LedgerResult<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(LEDGER_SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
        })
    }

    /// Bound on entry-number allocation retries after a uniqueness conflict
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Row counts of (accounts, journal entries, ledger lines)
    pub fn row_counts(&self) -> LedgerResult<(usize, usize, usize)> {
        let conn = self.conn.lock();
        let count = |table: &str| -> LedgerResult<usize> {
            let n: i64 =
                conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok((
            count("accounts")?,
            count("journal_entries")?,
            count("ledger_entries")?,
        ))
    }

    fn insert_entry(
        conn: &mut Connection,
        header: &PendingJournalEntry,
        lines: &[LedgerLine],
        numbering: &EntryNumberFormat,
    ) -> Result<JournalEntry, CommitFailure> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let sequence: i64 = tx.query_row(
            "SELECT COALESCE(MAX(sequence), 0) + 1 FROM journal_entries",
            [],
            |row| row.get(0),
        )?;
        let entry = header.clone().into_entry(numbering.format(sequence as u64));

        let inserted = tx.execute(
            "INSERT INTO journal_entries (
                sequence, id, entry_number, entry_date, description, reference_type,
                reference_id, created_by, status, notes, created_at, updated_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                sequence,
                entry.id.to_string(),
                entry.entry_number,
                format_date(entry.entry_date),
                entry.description,
                entry.reference_type,
                entry.reference_id,
                entry.created_by,
                entry.status.as_str(),
                entry.notes,
                format_timestamp(entry.created_at),
                format_timestamp(entry.updated_at),
            ],
        );
        match inserted {
            Err(err) if is_unique_violation(&err) => return Err(CommitFailure::NumberTaken),
            other => {
                other?;
            }
        }

        for line in lines {
            tx.execute(
                "INSERT INTO ledger_entries (
                    id, journal_entry_id, account_id, debit, credit, description
                 ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    line.id.to_string(),
                    line.journal_entry_id.to_string(),
                    line.account_id.to_string(),
                    line.debit.to_string(),
                    line.credit.to_string(),
                    line.description,
                ],
            )?;
        }

        tx.commit()?;
        Ok(entry)
    }

    fn load_journal_entry(conn: &Connection, entry_id: Uuid) -> LedgerResult<Option<JournalEntry>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journal_entries WHERE id = ?1"
        ))?;
        let mut rows = stmt.query(params![entry_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_journal_entry(row)?)),
            None => Ok(None),
        }
    }
}

enum CommitFailure {
    NumberTaken,
    Ledger(LedgerError),
}

impl From<rusqlite::Error> for CommitFailure {
    fn from(value: rusqlite::Error) -> Self {
        Self::Ledger(value.into())
    }
}

#[async_trait]
impl LedgerStorage for SqliteStorage {
    async fn insert_account(&self, account: &Account) -> LedgerResult<()> {
        let conn = self.conn.lock();
        insert_account_row(&conn, account).map_err(|err| duplicate_code_error(err, account))?;
        Ok(())
    }

    async fn insert_accounts_if_empty(&self, accounts: &[Account]) -> LedgerResult<bool> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let existing: i64 = tx.query_row("SELECT COUNT(*) FROM accounts", [], |row| row.get(0))?;
        if existing > 0 {
            return Ok(false);
        }
        for account in accounts {
            insert_account_row(&tx, account).map_err(|err| duplicate_code_error(err, account))?;
        }
        tx.commit()?;
        Ok(true)
    }

    async fn get_account(&self, account_id: Uuid) -> LedgerResult<Option<Account>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"))?;
        let mut rows = stmt.query(params![account_id.to_string()])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_account(row)?)),
            None => Ok(None),
        }
    }

    async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE code = ?1"))?;
        let mut rows = stmt.query(params![code])?;
        match rows.next()? {
            Some(row) => Ok(Some(row_to_account(row)?)),
            None => Ok(None),
        }
    }

    async fn list_accounts(&self, filter: &AccountFilter) -> LedgerResult<Vec<Account>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts
             WHERE (?1 IS NULL OR account_type = ?1)
               AND (?2 = 0 OR is_active = 1)
             ORDER BY seq ASC"
        ))?;
        let mut rows = stmt.query(params![
            filter.account_type.map(|t| t.as_str()),
            filter.active_only,
        ])?;
        let mut accounts = Vec::new();
        while let Some(row) = rows.next()? {
            accounts.push(row_to_account(row)?);
        }
        Ok(accounts)
    }

    async fn update_account(&self, account: &Account) -> LedgerResult<()> {
        let conn = self.conn.lock();
        let changed = conn
            .execute(
                "UPDATE accounts SET code = ?2, name = ?3, subtype = ?4, description = ?5,
                    is_active = ?6, parent_id = ?7, updated_at = ?8
                 WHERE id = ?1",
                params![
                    account.id.to_string(),
                    account.code,
                    account.name,
                    account.subtype,
                    account.description,
                    account.is_active,
                    account.parent_id.map(|id| id.to_string()),
                    format_timestamp(account.updated_at),
                ],
            )
            .map_err(|err| duplicate_code_error(err, account))?;
        if changed == 0 {
            return Err(LedgerError::AccountNotFound(account.id.to_string()));
        }
        Ok(())
    }

    async fn commit_journal_entry(
        &self,
        header: PendingJournalEntry,
        lines: &[LedgerLine],
        numbering: &EntryNumberFormat,
    ) -> LedgerResult<JournalEntry> {
        let mut conn = self.conn.lock();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match Self::insert_entry(&mut conn, &header, lines, numbering) {
                Ok(entry) => return Ok(entry),
                Err(CommitFailure::NumberTaken) if attempt < self.max_attempts => {
                    tracing::warn!(attempt, "entry number already taken, retrying allocation");
                }
                Err(CommitFailure::NumberTaken) => {
                    return Err(LedgerError::Storage(format!(
                        "could not allocate a unique entry number after {attempt} attempts"
                    )));
                }
                Err(CommitFailure::Ledger(err)) => return Err(err),
            }
        }
    }

    async fn get_journal_entry(&self, entry_id: Uuid) -> LedgerResult<Option<JournalEntryDetail>> {
        let conn = self.conn.lock();
        let Some(entry) = Self::load_journal_entry(&conn, entry_id)? else {
            return Ok(None);
        };
        let mut stmt = conn.prepare(
            "SELECT id, journal_entry_id, account_id, debit, credit, description
             FROM ledger_entries WHERE journal_entry_id = ?1 ORDER BY seq ASC",
        )?;
        let mut rows = stmt.query(params![entry_id.to_string()])?;
        let mut lines = Vec::new();
        while let Some(row) = rows.next()? {
            lines.push(row_to_line(row)?);
        }
        Ok(Some(JournalEntryDetail { entry, lines }))
    }

    async fn list_journal_entries(&self, range: &DateRange) -> LedgerResult<Vec<JournalEntry>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {JOURNAL_COLUMNS} FROM journal_entries
             WHERE (?1 IS NULL OR entry_date >= ?1)
               AND (?2 IS NULL OR entry_date <= ?2)
             ORDER BY sequence ASC"
        ))?;
        let mut rows = stmt.query(params![
            range.start.map(format_date),
            range.end.map(format_date),
        ])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            entries.push(row_to_journal_entry(row)?);
        }
        Ok(entries)
    }

    async fn update_journal_status(
        &self,
        entry_id: Uuid,
        status: JournalStatus,
    ) -> LedgerResult<Option<JournalEntry>> {
        let conn = self.conn.lock();
        let changed = conn.execute(
            "UPDATE journal_entries SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![
                entry_id.to_string(),
                status.as_str(),
                format_timestamp(chrono::Utc::now().naive_utc()),
            ],
        )?;
        if changed == 0 {
            return Ok(None);
        }
        Self::load_journal_entry(&conn, entry_id)
    }

    async fn ledger_postings(&self, query: &LineQuery) -> LedgerResult<Vec<LedgerPosting>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT l.id, l.journal_entry_id, l.account_id, l.debit, l.credit, l.description,
                    j.entry_number, j.entry_date, j.status
             FROM ledger_entries l
             JOIN journal_entries j ON j.id = l.journal_entry_id
             WHERE (?1 IS NULL OR l.account_id = ?1)
               AND (?2 IS NULL OR j.entry_date >= ?2)
               AND (?3 IS NULL OR j.entry_date <= ?3)
               AND (?4 = 0 OR j.status = 'posted')
             ORDER BY j.sequence ASC, l.seq ASC",
        )?;
        let mut rows = stmt.query(params![
            query.account_id.map(|id| id.to_string()),
            query.range.start.map(format_date),
            query.range.end.map(format_date),
            query.posted_only,
        ])?;
        let mut postings = Vec::new();
        while let Some(row) = rows.next()? {
            let line = row_to_line(row)?;
            let entry_date: String = row.get(7)?;
            let status: String = row.get(8)?;
            postings.push(LedgerPosting {
                line,
                entry_number: row.get(6)?,
                entry_date: parse_date(&entry_date)?,
                status: status.parse()?,
            });
        }
        Ok(postings)
    }
}

fn insert_account_row(conn: &Connection, account: &Account) -> rusqlite::Result<usize> {
    conn.execute(
        &format!(
            "INSERT INTO accounts ({ACCOUNT_COLUMNS})
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
        ),
        params![
            account.id.to_string(),
            account.code,
            account.name,
            account.account_type.as_str(),
            account.subtype,
            account.normal_balance.as_str(),
            account.description,
            account.is_active,
            account.is_system,
            account.parent_id.map(|id| id.to_string()),
            format_timestamp(account.created_at),
            format_timestamp(account.updated_at),
        ],
    )
}

fn is_unique_violation(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(failure, _)
            if failure.extended_code == ffi::SQLITE_CONSTRAINT_UNIQUE
                || failure.extended_code == ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

fn duplicate_code_error(err: rusqlite::Error, account: &Account) -> LedgerError {
    if is_unique_violation(&err) {
        LedgerError::Validation(format!(
            "Account with code '{}' already exists",
            account.code
        ))
    } else {
        err.into()
    }
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

fn format_timestamp(ts: NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_date(raw: &str) -> LedgerResult<NaiveDate> {
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .map_err(|err| LedgerError::Serialization(format!("invalid date {raw}: {err}")))
}

fn parse_timestamp(raw: &str) -> LedgerResult<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|err| LedgerError::Serialization(format!("invalid timestamp {raw}: {err}")))
}

fn parse_uuid(raw: &str) -> LedgerResult<Uuid> {
    Uuid::parse_str(raw)
        .map_err(|err| LedgerError::Serialization(format!("invalid id {raw}: {err}")))
}

fn parse_decimal(raw: &str) -> LedgerResult<BigDecimal> {
    BigDecimal::from_str(raw)
        .map_err(|err| LedgerError::Serialization(format!("invalid decimal {raw}: {err}")))
}

fn row_to_account(row: &rusqlite::Row<'_>) -> LedgerResult<Account> {
    let id: String = row.get(0)?;
    let account_type: String = row.get(3)?;
    let normal_balance: String = row.get(5)?;
    let parent_id: Option<String> = row.get(9)?;
    let created_at: String = row.get(10)?;
    let updated_at: String = row.get(11)?;

    Ok(Account {
        id: parse_uuid(&id)?,
        code: row.get(1)?,
        name: row.get(2)?,
        account_type: account_type
            .parse()
            .map_err(|err: LedgerError| LedgerError::Serialization(err.to_string()))?,
        subtype: row.get(4)?,
        normal_balance: normal_balance
            .parse()
            .map_err(|err: LedgerError| LedgerError::Serialization(err.to_string()))?,
        description: row.get(6)?,
        is_active: row.get(7)?,
        is_system: row.get(8)?,
        parent_id: parent_id.as_deref().map(parse_uuid).transpose()?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_journal_entry(row: &rusqlite::Row<'_>) -> LedgerResult<JournalEntry> {
    let id: String = row.get(0)?;
    let entry_date: String = row.get(2)?;
    let status: String = row.get(7)?;
    let created_at: String = row.get(9)?;
    let updated_at: String = row.get(10)?;

    Ok(JournalEntry {
        id: parse_uuid(&id)?,
        entry_number: row.get(1)?,
        entry_date: parse_date(&entry_date)?,
        description: row.get(3)?,
        reference_type: row.get(4)?,
        reference_id: row.get(5)?,
        created_by: row.get(6)?,
        status: status.parse()?,
        notes: row.get(8)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

fn row_to_line(row: &rusqlite::Row<'_>) -> LedgerResult<LedgerLine> {
    let id: String = row.get(0)?;
    let journal_entry_id: String = row.get(1)?;
    let account_id: String = row.get(2)?;
    let debit: String = row.get(3)?;
    let credit: String = row.get(4)?;

    Ok(LedgerLine {
        id: parse_uuid(&id)?,
        journal_entry_id: parse_uuid(&journal_entry_id)?,
        account_id: parse_uuid(&account_id)?,
        debit: parse_decimal(&debit)?,
        credit: parse_decimal(&credit)?,
        description: row.get(5)?,
    })
}
