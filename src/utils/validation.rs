//! Validation utilities

use bigdecimal::BigDecimal;

use crate::types::*;
use crate::utils::money::{normalize_amount, within_tolerance};

/// Validate that an account code is valid
pub fn validate_account_code(code: &str) -> LedgerResult<()> {
    if code.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account code cannot be empty".to_string(),
        ));
    }

    if code.len() > 20 {
        return Err(LedgerError::Validation(
            "Account code cannot exceed 20 characters".to_string(),
        ));
    }

    if !code
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.')
    {
        return Err(LedgerError::Validation(format!(
            "Account code '{code}' can only contain alphanumeric characters, dashes, dots, and underscores"
        )));
    }

    Ok(())
}

/// Validate that an account name is valid
pub fn validate_account_name(name: &str) -> LedgerResult<()> {
    if name.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Account name cannot be empty".to_string(),
        ));
    }

    if name.len() > 100 {
        return Err(LedgerError::Validation(
            "Account name cannot exceed 100 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate that a journal entry description is valid
pub fn validate_entry_description(description: &str) -> LedgerResult<()> {
    if description.trim().is_empty() {
        return Err(LedgerError::Validation(
            "Journal entry description cannot be empty".to_string(),
        ));
    }

    if description.len() > 500 {
        return Err(LedgerError::Validation(
            "Journal entry description cannot exceed 500 characters".to_string(),
        ));
    }

    Ok(())
}

/// Validate one line: exactly one of debit/credit strictly positive, the other zero,
/// both with at most two decimal places. `position` is 1-based.
pub fn validate_line(position: usize, line: &LineInput) -> LedgerResult<()> {
    let zero = BigDecimal::from(0);
    let offending = |reason: &str| {
        LedgerError::Validation(format!(
            "line {position} (account {}): {reason}",
            line.account_id
        ))
    };

    if line.debit < zero || line.credit < zero {
        return Err(offending("amounts cannot be negative"));
    }
    let is_debit = line.debit > zero;
    let is_credit = line.credit > zero;
    if is_debit == is_credit {
        return Err(offending(
            "exactly one of debit or credit must be positive",
        ));
    }
    normalize_amount(&line.debit).map_err(|err| offending(&err.to_string()))?;
    normalize_amount(&line.credit).map_err(|err| offending(&err.to_string()))?;

    Ok(())
}

/// Structural checks for a posting request: at least two lines, every line
/// single-sided, and debits equal to credits within tolerance.
///
/// Account existence is checked against storage by the posting engine.
pub fn validate_journal_input(input: &JournalEntryInput) -> LedgerResult<()> {
    validate_entry_description(&input.description)?;

    if input.lines.len() < 2 {
        return Err(LedgerError::Validation(format!(
            "Journal entry must have at least two lines for double-entry bookkeeping, got {}",
            input.lines.len()
        )));
    }

    for (index, line) in input.lines.iter().enumerate() {
        validate_line(index + 1, line)?;
    }

    let debits = input.total_debits();
    let credits = input.total_credits();
    if !within_tolerance(&debits, &credits) {
        return Err(LedgerError::BalanceMismatch { debits, credits });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;
    use uuid::Uuid;

    fn input(lines: Vec<LineInput>) -> JournalEntryInput {
        JournalEntryInput {
            description: "Test entry".to_string(),
            entry_date: None,
            reference_type: None,
            reference_id: None,
            notes: None,
            created_by: 1,
            lines,
        }
    }

    fn amount(raw: &str) -> BigDecimal {
        BigDecimal::from_str(raw).unwrap()
    }

    #[test]
    fn accepts_balanced_input() {
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let entry = input(vec![
            LineInput::debit(a, amount("10.00"), None),
            LineInput::credit(b, amount("10.00"), None),
        ]);
        assert!(validate_journal_input(&entry).is_ok());
    }

    #[test]
    fn rejects_single_line() {
        let entry = input(vec![LineInput::debit(Uuid::new_v4(), amount("10"), None)]);
        assert!(matches!(
            validate_journal_input(&entry),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn rejects_two_sided_and_empty_lines() {
        let a = Uuid::new_v4();
        let both = LineInput {
            account_id: a,
            debit: amount("5"),
            credit: amount("5"),
            description: None,
        };
        let neither = LineInput {
            account_id: a,
            debit: amount("0"),
            credit: amount("0"),
            description: None,
        };
        let err = validate_line(2, &both).unwrap_err();
        assert!(err.to_string().contains("line 2"));
        assert!(validate_line(1, &neither).is_err());
    }

    #[test]
    fn rejects_negative_amounts() {
        let line = LineInput::debit(Uuid::new_v4(), amount("-3"), None);
        assert!(validate_line(1, &line).is_err());
    }

    #[test]
    fn unbalanced_input_reports_totals() {
        let entry = input(vec![
            LineInput::debit(Uuid::new_v4(), amount("100.00"), None),
            LineInput::credit(Uuid::new_v4(), amount("90.00"), None),
        ]);
        match validate_journal_input(&entry) {
            Err(LedgerError::BalanceMismatch { debits, credits }) => {
                assert_eq!(debits, amount("100"));
                assert_eq!(credits, amount("90"));
            }
            other => panic!("expected balance mismatch, got {other:?}"),
        }
    }

    #[test]
    fn one_cent_difference_is_tolerated() {
        let entry = input(vec![
            LineInput::debit(Uuid::new_v4(), amount("100.01"), None),
            LineInput::credit(Uuid::new_v4(), amount("100.00"), None),
        ]);
        assert!(validate_journal_input(&entry).is_ok());
    }

    #[test]
    fn account_code_rules() {
        assert!(validate_account_code("1000").is_ok());
        assert!(validate_account_code("  ").is_err());
        assert!(validate_account_code("10 00").is_err());
    }
}
