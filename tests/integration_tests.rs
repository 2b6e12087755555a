//! Integration tests for retail-ledger

use bigdecimal::BigDecimal;
use chrono::NaiveDate;
use std::collections::HashSet;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

use retail_ledger::{
    chart::codes, patterns, utils::MemoryStorage, AccountType, DefaultAccountValidator,
    EntryNumberFormat, EntryType, JournalEntryBuilder, JournalEntryInput, JournalStatus,
    JournalValidator, Ledger, LedgerConfig, LedgerError, LedgerLine, LedgerResult, LedgerStorage,
    NewAccount, PendingJournalEntry, ReportGenerator, SaleEvent, SaleLedgerStatus,
};

fn date(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn amount(raw: &str) -> BigDecimal {
    BigDecimal::from_str(raw).unwrap()
}

async fn seeded_ledger() -> Ledger<MemoryStorage> {
    let ledger = Ledger::new(MemoryStorage::new());
    ledger.seed_default_chart_of_accounts().await.unwrap();
    ledger
}

async fn id_of(ledger: &Ledger<MemoryStorage>, code: &str) -> Uuid {
    ledger.get_account_by_code(code).await.unwrap().unwrap().id
}

#[tokio::test]
async fn test_complete_retail_workflow() {
    let ledger = seeded_ledger().await;
    let cash = id_of(&ledger, codes::CASH).await;
    let capital = id_of(&ledger, codes::OWNERS_CAPITAL).await;

    let investment =
        patterns::owner_investment(date(1, 1), cash, capital, amount("1000.00"), 1).unwrap();
    ledger.post_journal_entry(investment).await.unwrap();

    let sale = SaleEvent::parse(42, 7, "116.00", "70.00", "cash").unwrap();
    let posted = ledger.record_sale(&sale).await.unwrap();
    assert_eq!(posted.lines.len(), 4);
    assert_eq!(posted.entry.reference_type.as_deref(), Some("sale"));
    assert_eq!(posted.entry.reference_id.as_deref(), Some("42"));
    assert!(posted.entry.description.contains("42"));
    assert!(posted.entry.description.contains("cash"));
    assert_eq!(posted.entry.created_by, 7);
    assert_eq!(posted.total_debits(), amount("186.00"));
    assert_eq!(posted.total_credits(), amount("186.00"));

    let cash_balance = ledger.get_account_balance(cash, None).await.unwrap();
    assert_eq!(cash_balance.balance, amount("1116.00"));

    let inventory = id_of(&ledger, codes::INVENTORY).await;
    let inventory_balance = ledger.get_account_balance(inventory, None).await.unwrap();
    assert_eq!(inventory_balance.balance, amount("-70.00"));

    let today = chrono::Utc::now().date_naive();
    let pnl = ledger
        .generate_profit_and_loss(date(1, 1), today)
        .await
        .unwrap();
    assert_eq!(pnl.revenue.total, amount("116.00"));
    assert_eq!(pnl.expenses.total, amount("70.00"));
    assert_eq!(pnl.net_income, amount("46.00"));

    let trial_balance = ledger.get_trial_balance(today).await.unwrap();
    assert!(trial_balance.is_balanced);

    let report = ledger.validate_integrity(today).await.unwrap();
    assert!(report.is_valid, "{:?}", report.issues);
    assert_eq!(report.entries_checked, 2);
}

#[tokio::test]
async fn test_balance_follows_normal_side() {
    let ledger = Ledger::new(MemoryStorage::new());
    let till = ledger
        .create_account(NewAccount::new("1010", "Till", AccountType::Asset))
        .await
        .unwrap();
    let payable = ledger
        .create_account(NewAccount::new("2010", "Supplier", AccountType::Liability))
        .await
        .unwrap();
    let suspense = ledger
        .create_account(
            NewAccount::new("1990", "Suspense", AccountType::Asset)
                .normal_balance(EntryType::Credit),
        )
        .await
        .unwrap();
    let capital = ledger
        .create_account(NewAccount::new("3000", "Capital", AccountType::Equity))
        .await
        .unwrap();
    assert_eq!(payable.normal_balance, EntryType::Credit);

    for account in [&till, &payable, &suspense] {
        let first = JournalEntryBuilder::new("Opening", 1)
            .date(date(3, 1))
            .debit(account.id, amount("100"), None)
            .credit(account.id, amount("30"), None)
            .credit(capital.id, amount("70"), None)
            .build()
            .unwrap();
        let second = JournalEntryBuilder::new("Top up", 1)
            .date(date(3, 2))
            .debit(account.id, amount("50"), None)
            .credit(capital.id, amount("50"), None)
            .build()
            .unwrap();
        ledger.post_journal_entry(first).await.unwrap();
        ledger.post_journal_entry(second).await.unwrap();
    }

    let debit_normal = ledger.get_account_balance(till.id, None).await.unwrap();
    assert_eq!(debit_normal.balance, BigDecimal::from(120));
    assert_eq!(debit_normal.debit_total, BigDecimal::from(150));
    assert_eq!(debit_normal.credit_total, BigDecimal::from(30));

    let credit_normal = ledger.get_account_balance(payable.id, None).await.unwrap();
    assert_eq!(credit_normal.balance, BigDecimal::from(-120));

    let overridden = ledger.get_account_balance(suspense.id, None).await.unwrap();
    assert_eq!(overridden.balance, BigDecimal::from(-120));
}

#[tokio::test]
async fn test_rejected_postings_persist_nothing() {
    let storage = MemoryStorage::new();
    let ledger = Ledger::new(storage.clone());
    ledger.seed_default_chart_of_accounts().await.unwrap();
    let cash = id_of(&ledger, codes::CASH).await;
    let sales = id_of(&ledger, codes::SALES_REVENUE).await;
    let before = storage.row_counts();

    let unbalanced = JournalEntryInput {
        description: "Unbalanced".to_string(),
        entry_date: None,
        reference_type: None,
        reference_id: None,
        notes: None,
        created_by: 1,
        lines: vec![
            retail_ledger::LineInput::debit(cash, amount("100.00"), None),
            retail_ledger::LineInput::credit(sales, amount("90.00"), None),
        ],
    };
    match ledger.post_journal_entry(unbalanced).await {
        Err(LedgerError::BalanceMismatch { debits, credits }) => {
            assert_eq!(debits, amount("100.00"));
            assert_eq!(credits, amount("90.00"));
        }
        other => panic!("expected balance mismatch, got {other:?}"),
    }

    let unknown_account = JournalEntryInput {
        description: "Unknown account".to_string(),
        entry_date: None,
        reference_type: None,
        reference_id: None,
        notes: None,
        created_by: 1,
        lines: vec![
            retail_ledger::LineInput::debit(cash, amount("10.00"), None),
            retail_ledger::LineInput::credit(Uuid::new_v4(), amount("10.00"), None),
        ],
    };
    match ledger.post_journal_entry(unknown_account).await {
        Err(LedgerError::Validation(message)) => assert!(message.contains("line 2"), "{message}"),
        other => panic!("expected validation error, got {other:?}"),
    }

    let single_line = JournalEntryInput {
        description: "One line".to_string(),
        entry_date: None,
        reference_type: None,
        reference_id: None,
        notes: None,
        created_by: 1,
        lines: vec![retail_ledger::LineInput::debit(cash, amount("10.00"), None)],
    };
    assert!(matches!(
        ledger.post_journal_entry(single_line).await,
        Err(LedgerError::Validation(_))
    ));

    assert_eq!(storage.row_counts(), before);
}

#[tokio::test]
async fn test_void_removes_exactly_the_entry_effect() {
    let ledger = seeded_ledger().await;
    let cash = id_of(&ledger, codes::CASH).await;
    let capital = id_of(&ledger, codes::OWNERS_CAPITAL).await;
    ledger
        .post_journal_entry(
            patterns::owner_investment(date(1, 1), cash, capital, amount("500.00"), 1).unwrap(),
        )
        .await
        .unwrap();

    let sale = SaleEvent::parse(43, 1, "80.00", "30.00", "mpesa").unwrap();
    let posted = ledger.record_sale(&sale).await.unwrap();
    let with_sale = ledger.get_account_balance(cash, None).await.unwrap();

    let voided = ledger.void_journal_entry(posted.entry.id).await.unwrap();
    assert_eq!(voided.status, retail_ledger::JournalStatus::Void);
    assert_eq!(voided.entry_number, posted.entry.entry_number);

    let after_void = ledger.get_account_balance(cash, None).await.unwrap();
    assert_eq!(&with_sale.balance - &after_void.balance, amount("80.00"));
    assert_eq!(after_void.balance, amount("500.00"));

    // Lines stay on record with the void status.
    let detail = ledger
        .get_journal_entry(posted.entry.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.lines.len(), 4);
    let cash_ledger = ledger
        .get_account_ledger(cash, Default::default())
        .await
        .unwrap();
    assert_eq!(cash_ledger.len(), 2);

    assert!(matches!(
        ledger.void_journal_entry(posted.entry.id).await,
        Err(LedgerError::Validation(_))
    ));
    assert!(matches!(
        ledger.void_journal_entry(Uuid::new_v4()).await,
        Err(LedgerError::JournalEntryNotFound(_))
    ));
}

#[tokio::test]
async fn test_seeding_is_idempotent() {
    let ledger = Ledger::new(MemoryStorage::new());
    let first = ledger.seed_default_chart_of_accounts().await.unwrap();
    assert_eq!(first.len(), 16);

    let second = ledger.seed_default_chart_of_accounts().await.unwrap();
    assert!(second.is_empty());
    assert_eq!(ledger.list_accounts(None).await.unwrap().len(), 16);

    let system: Vec<_> = first.iter().filter(|account| account.is_system).collect();
    assert_eq!(system.len(), 13);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_postings_get_distinct_numbers() {
    let ledger = seeded_ledger().await;
    let cash = id_of(&ledger, codes::CASH).await;
    let capital = id_of(&ledger, codes::OWNERS_CAPITAL).await;

    let mut handles = Vec::new();
    for n in 0..24 {
        let ledger = ledger.clone();
        handles.push(tokio::spawn(async move {
            let entry = patterns::owner_investment(
                date(1, 1),
                cash,
                capital,
                BigDecimal::from(n + 1),
                1,
            )
            .unwrap();
            ledger.post_journal_entry(entry).await.unwrap().entry.entry_number
        }));
    }

    let mut numbers = HashSet::new();
    for handle in handles {
        assert!(numbers.insert(handle.await.unwrap()));
    }
    let expected: HashSet<String> = (1..=24).map(|n| format!("JE-{n:04}")).collect();
    assert_eq!(numbers, expected);

    let listed = ledger.list_journal_entries(Default::default()).await.unwrap();
    let listed_numbers: Vec<_> = listed.iter().map(|e| e.entry_number.clone()).collect();
    let mut sorted = listed_numbers.clone();
    sorted.sort();
    assert_eq!(listed_numbers, sorted);
}

#[tokio::test]
async fn test_missing_role_account_is_a_configuration_error() {
    let storage = MemoryStorage::new();
    let ledger = Ledger::new(storage.clone());
    ledger
        .create_account(NewAccount::new(codes::CASH, "Cash", AccountType::Asset))
        .await
        .unwrap();
    ledger
        .create_account(NewAccount::new(
            codes::SALES_REVENUE,
            "Sales",
            AccountType::Revenue,
        ))
        .await
        .unwrap();

    let sale = SaleEvent::parse(44, 1, "10.00", "4.00", "cash").unwrap();
    assert!(matches!(
        ledger.record_sale(&sale).await,
        Err(LedgerError::Configuration(_))
    ));
    assert!(matches!(
        ledger.record_sale_or_flag(&sale).await,
        SaleLedgerStatus::NeedsReconciliation { .. }
    ));
    assert_eq!(storage.row_counts().1, 0);
}

#[tokio::test]
async fn test_profit_and_loss_identity_is_exact() {
    let ledger = seeded_ledger().await;
    let cash = id_of(&ledger, codes::CASH).await;
    let utilities = id_of(&ledger, codes::UTILITIES_EXPENSE).await;

    for (sale_id, total, cogs) in [(1, "19.99", "7.33"), (2, "0.10", "0.07"), (3, "245.35", "0.00")] {
        let sale = SaleEvent::parse(sale_id, 1, total, cogs, "cash").unwrap();
        ledger.record_sale(&sale).await.unwrap();
    }
    let bill = patterns::expense_payment(
        chrono::Utc::now().date_naive(),
        "Power bill",
        utilities,
        cash,
        amount("33.33"),
        1,
    )
    .unwrap();
    ledger.post_journal_entry(bill).await.unwrap();

    let today = chrono::Utc::now().date_naive();
    let pnl = ledger.generate_profit_and_loss(date(1, 1), today).await.unwrap();
    assert_eq!(pnl.revenue.total, amount("265.44"));
    assert_eq!(pnl.expenses.total, amount("40.73"));
    assert_eq!(pnl.net_income, &pnl.revenue.total - &pnl.expenses.total);
    assert_eq!(pnl.net_income, amount("224.71"));
}

#[tokio::test]
async fn test_cash_flow_statement_shape() {
    let ledger = seeded_ledger().await;
    let sale = SaleEvent::parse(5, 1, "50.00", "20.00", "credit").unwrap();
    ledger.record_sale(&sale).await.unwrap();

    let today = chrono::Utc::now().date_naive();
    let statement = ledger
        .generate_cash_flow_statement(date(1, 1), today)
        .await
        .unwrap();
    assert_eq!(statement.operating_activities.items.len(), 1);
    assert_eq!(statement.operating_activities.items[0].description, "Net income");
    assert_eq!(statement.operating_activities.total, amount("30.00"));
    assert!(statement.investing_activities.items.is_empty());
    assert!(statement.financing_activities.items.is_empty());
    assert_eq!(statement.net_cash_flow, amount("30.00"));
    assert_eq!(statement.start_date, date(1, 1));
}

#[tokio::test]
async fn test_balance_sheet_sections() {
    let ledger = seeded_ledger().await;
    let cash = id_of(&ledger, codes::CASH).await;
    let capital = id_of(&ledger, codes::OWNERS_CAPITAL).await;
    ledger
        .post_journal_entry(
            patterns::owner_investment(date(1, 1), cash, capital, amount("900.00"), 1).unwrap(),
        )
        .await
        .unwrap();

    let sheet = ledger.generate_balance_sheet(date(1, 31)).await.unwrap();
    assert_eq!(sheet.assets.total, amount("900.00"));
    assert_eq!(sheet.equity.total, amount("900.00"));
    assert_eq!(sheet.liabilities.total, BigDecimal::from(0));
    assert_eq!(sheet.identity_difference(), BigDecimal::from(0));
    assert_eq!(sheet.assets.accounts.len(), 4);
}

struct RequireReference;

impl JournalValidator for RequireReference {
    fn validate_entry(&self, input: &JournalEntryInput) -> LedgerResult<()> {
        retail_ledger::utils::validate_journal_input(input)?;
        if input.reference_id.is_none() {
            return Err(LedgerError::Validation(
                "entries must carry a reference".to_string(),
            ));
        }
        Ok(())
    }
}

#[tokio::test]
async fn test_custom_journal_validator() {
    let ledger = Ledger::with_validators(
        MemoryStorage::new(),
        &LedgerConfig::default(),
        Arc::new(DefaultAccountValidator),
        Arc::new(RequireReference),
    );
    ledger.seed_default_chart_of_accounts().await.unwrap();
    let cash = id_of(&ledger, codes::CASH).await;
    let capital = id_of(&ledger, codes::OWNERS_CAPITAL).await;

    let unreferenced =
        patterns::owner_investment(date(1, 1), cash, capital, amount("10.00"), 1).unwrap();
    assert!(matches!(
        ledger.post_journal_entry(unreferenced).await,
        Err(LedgerError::Validation(_))
    ));

    // Sales always carry their sale id.
    let sale = SaleEvent::parse(6, 1, "10.00", "5.00", "cash").unwrap();
    assert!(ledger.record_sale(&sale).await.is_ok());
}

#[tokio::test]
async fn test_manual_entry_from_json_payload() {
    let config = LedgerConfig {
        entry_number_prefix: "GJ-".to_string(),
        entry_number_width: 6,
        ..LedgerConfig::default()
    };
    let ledger = Ledger::with_config(MemoryStorage::new(), &config);
    ledger.seed_default_chart_of_accounts().await.unwrap();
    let cash = id_of(&ledger, codes::CASH).await;
    let rent = id_of(&ledger, codes::RENT_EXPENSE).await;

    let payload = serde_json::json!({
        "description": "March rent",
        "entry_date": "2024-03-01",
        "reference_type": "manual",
        "reference_id": "RENT-03",
        "created_by": 3,
        "lines": [
            { "account_id": rent, "debit": "1200.00" },
            { "account_id": cash, "credit": "1200.00", "description": "Paid from till" }
        ]
    });
    let input: JournalEntryInput = serde_json::from_value(payload).unwrap();
    let posted = ledger.post_journal_entry(input).await.unwrap();

    assert_eq!(posted.entry.entry_number, "GJ-000001");
    assert_eq!(posted.entry.entry_date, date(3, 1));
    assert_eq!(posted.lines[1].description.as_deref(), Some("Paid from till"));

    let listed = ledger
        .list_journal_entries(retail_ledger::DateRange::between(date(3, 1), date(3, 31)))
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    let february = ledger
        .list_journal_entries(retail_ledger::DateRange::between(date(2, 1), date(2, 29)))
        .await
        .unwrap();
    assert!(february.is_empty());
}

#[tokio::test]
async fn test_inactive_accounts_reject_postings() {
    let ledger = seeded_ledger().await;
    let cash = id_of(&ledger, codes::CASH).await;
    let supplies = id_of(&ledger, codes::SUPPLIES_EXPENSE).await;
    ledger.deactivate_account(supplies).await.unwrap();

    let entry =
        patterns::expense_payment(date(1, 5), "Paper bags", supplies, cash, amount("4.50"), 1)
            .unwrap();
    match ledger.post_journal_entry(entry).await {
        Err(LedgerError::Validation(message)) => assert!(message.contains("inactive")),
        other => panic!("expected validation error, got {other:?}"),
    }
}

#[tokio::test]
async fn test_draft_entries_are_excluded_everywhere() {
    let storage = MemoryStorage::new();
    let ledger = Ledger::new(storage.clone());
    ledger.seed_default_chart_of_accounts().await.unwrap();
    let cash = id_of(&ledger, codes::CASH).await;
    let sales = id_of(&ledger, codes::SALES_REVENUE).await;

    // Sales are dated on the day they are recorded.
    let today = chrono::Utc::now().date_naive();
    let sale = SaleEvent::parse(11, 1, "50.00", "20.00", "cash").unwrap();
    ledger.record_sale(&sale).await.unwrap();
    let pnl_before = ledger
        .generate_profit_and_loss(date(1, 1), today)
        .await
        .unwrap();

    let header = PendingJournalEntry {
        id: Uuid::new_v4(),
        entry_date: today,
        description: "Unapproved till adjustment".to_string(),
        reference_type: None,
        reference_id: None,
        created_by: 1,
        status: JournalStatus::Draft,
        notes: None,
        created_at: chrono::Utc::now().naive_utc(),
    };
    let lines = [
        LedgerLine {
            id: Uuid::new_v4(),
            journal_entry_id: header.id,
            account_id: cash,
            debit: amount("900.00"),
            credit: BigDecimal::from(0),
            description: None,
        },
        LedgerLine {
            id: Uuid::new_v4(),
            journal_entry_id: header.id,
            account_id: sales,
            debit: BigDecimal::from(0),
            credit: amount("900.00"),
            description: None,
        },
    ];
    let draft = storage
        .commit_journal_entry(header, &lines, &EntryNumberFormat::default())
        .await
        .unwrap();
    assert_eq!(draft.status, JournalStatus::Draft);

    let balance = ledger.get_account_balance(cash, None).await.unwrap();
    assert_eq!(balance.balance, amount("50.00"));
    let pnl = ledger
        .generate_profit_and_loss(date(1, 1), today)
        .await
        .unwrap();
    assert_eq!(pnl.net_income, pnl_before.net_income);
    let trial_balance = ledger.get_trial_balance(today).await.unwrap();
    assert_eq!(trial_balance.total_debits, amount("70.00"));
    assert!(trial_balance.is_balanced);

    assert!(matches!(
        ledger.void_journal_entry(draft.id).await,
        Err(LedgerError::Validation(_))
    ));
}
