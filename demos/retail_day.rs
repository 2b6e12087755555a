//! One trading day on an in-memory ledger: seed, invest, sell, report.
//!
//! Run with `cargo run --example retail_day`.

use anyhow::Context;
use bigdecimal::BigDecimal;
use chrono::Utc;

use retail_ledger::{
    chart::codes, patterns, utils::MemoryStorage, Ledger, ReportGenerator, SaleEvent,
    SaleLedgerStatus,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let ledger = Ledger::new(MemoryStorage::new());
    let seeded = ledger.seed_default_chart_of_accounts().await?;
    println!("seeded {} accounts", seeded.len());

    let today = Utc::now().date_naive();
    let cash = ledger
        .get_account_by_code(codes::CASH)
        .await?
        .context("cash account missing from the chart")?;
    let capital = ledger
        .get_account_by_code(codes::OWNERS_CAPITAL)
        .await?
        .context("capital account missing from the chart")?;

    let opening =
        patterns::owner_investment(today, cash.id, capital.id, BigDecimal::from(500), 1)?;
    let opening = ledger.post_journal_entry(opening).await?;
    println!("posted {}", opening.entry.entry_number);

    for (sale_id, total, cogs, method) in [
        (1001, "116.00", "70.00", "cash"),
        (1002, "45.50", "20.00", "mpesa"),
        (1003, "12.00", "0.00", "credit"),
    ] {
        let sale = SaleEvent::parse(sale_id, 1, total, cogs, method)?;
        match ledger.record_sale_or_flag(&sale).await {
            SaleLedgerStatus::Recorded { entry_number, .. } => {
                println!("sale {sale_id} recorded as {entry_number}")
            }
            SaleLedgerStatus::NeedsReconciliation { reason } => {
                println!("sale {sale_id} needs reconciliation: {reason}")
            }
        }
    }

    let balance = ledger.get_account_balance(cash.id, None).await?;
    println!("cash on hand: {}", balance.balance);

    let pnl = ledger.generate_profit_and_loss(today, today).await?;
    println!("{}", serde_json::to_string_pretty(&pnl)?);

    let integrity = ledger.validate_integrity(today).await?;
    println!("books balanced: {}", integrity.is_valid);
    Ok(())
}
