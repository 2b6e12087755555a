//! Monetary amount helpers
//!
//! Amounts are fixed-point with two decimal places. Anything finer is rejected
//! instead of silently rounded.

use bigdecimal::BigDecimal;
use std::str::FromStr;

use crate::types::*;

/// Number of fractional digits carried by every amount
pub const MONEY_SCALE: i64 = 2;

/// Largest debit/credit difference still considered balanced
pub fn balance_tolerance() -> BigDecimal {
    BigDecimal::from(1) / BigDecimal::from(100)
}

/// Parse a decimal string such as "116.00" into an amount with two decimal places
pub fn parse_amount(raw: &str) -> LedgerResult<BigDecimal> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LedgerError::Validation(
            "malformed monetary amount: empty string".to_string(),
        ));
    }
    let amount = BigDecimal::from_str(trimmed).map_err(|err| {
        LedgerError::Validation(format!("malformed monetary amount '{raw}': {err}"))
    })?;
    normalize_amount(&amount)
        .map_err(|_| LedgerError::Validation(format!("malformed monetary amount '{raw}'")))
}

/// Rescale to two decimal places, rejecting amounts with sub-cent precision
pub fn normalize_amount(amount: &BigDecimal) -> LedgerResult<BigDecimal> {
    let scaled = amount.with_scale(MONEY_SCALE);
    if &scaled != amount {
        return Err(LedgerError::Validation(format!(
            "amount {amount} has more than {MONEY_SCALE} decimal places"
        )));
    }
    Ok(scaled)
}

/// Whether two totals agree within [`balance_tolerance`]
pub fn within_tolerance(left: &BigDecimal, right: &BigDecimal) -> bool {
    (left - right).abs() <= balance_tolerance()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_two_decimal_strings() {
        assert_eq!(parse_amount("116.00").unwrap(), BigDecimal::from(116));
        assert_eq!(parse_amount(" 70.5 ").unwrap().to_string(), "70.50");
        assert_eq!(parse_amount("3").unwrap().to_string(), "3.00");
    }

    #[test]
    fn rejects_malformed_strings() {
        assert!(matches!(
            parse_amount("abc"),
            Err(LedgerError::Validation(_))
        ));
        assert!(matches!(parse_amount(""), Err(LedgerError::Validation(_))));
        assert!(matches!(
            parse_amount("1.005"),
            Err(LedgerError::Validation(_))
        ));
    }

    #[test]
    fn trailing_zeros_beyond_scale_are_accepted() {
        assert_eq!(parse_amount("12.3400").unwrap().to_string(), "12.34");
    }

    #[test]
    fn tolerance_is_one_cent() {
        let a = BigDecimal::from_str("100.00").unwrap();
        assert!(within_tolerance(&a, &BigDecimal::from_str("100.01").unwrap()));
        assert!(!within_tolerance(&a, &BigDecimal::from_str("100.02").unwrap()));
    }
}
