// Threshold math shared by the buy and sell loops
//
// Prices travel as decimal strings and are compared as `Decimal`, so a move of
// exactly the threshold never fires regardless of how the price is written.

use crate::Result;
use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

/// Parse an exchange decimal string that must be a positive price or amount
pub fn parse_positive(label: &str, raw: &str) -> Result<Decimal> {
    let value = parse_amount(label, raw)?;
    if value.is_zero() {
        return Err(format!("Invalid {} {:?}: must be a positive number", label, raw).into());
    }
    Ok(value)
}

/// Parse an exchange decimal string that may be zero but not negative
pub fn parse_amount(label: &str, raw: &str) -> Result<Decimal> {
    let value = Decimal::from_str(raw.trim())
        .map_err(|e| format!("Invalid {} {:?}: {}", label, raw, e))?;

    if value.is_sign_negative() && !value.is_zero() {
        return Err(format!("Invalid {} {:?}: must not be negative", label, raw).into());
    }

    Ok(value)
}

/// Exact decimal for a configured ratio such as `-0.03`
///
/// Goes through the shortest round-trip text of the float, so `-0.03`
/// becomes exactly `-0.03` rather than its binary approximation.
pub fn ratio(label: &str, value: f64) -> Result<Decimal> {
    Decimal::from_str(&value.to_string())
        .map_err(|e| format!("Invalid {} {}: {}", label, value, e).into())
}

/// `(current - baseline) / baseline`
pub fn relative_change(current: Decimal, baseline: Decimal) -> Decimal {
    (current - baseline) / baseline
}

/// A drop fires only when strictly below the (negative) threshold
pub fn is_drop_triggered(change: Decimal, drop_threshold: Decimal) -> bool {
    change < drop_threshold
}

/// Profit-taking fires only when strictly above the threshold
pub fn is_profit_triggered(change: Decimal, profit_threshold: Decimal) -> bool {
    change > profit_threshold
}

/// Whether enough time passed since the anchor was last consumed by a buy
pub fn cooldown_elapsed(now: i64, last_transaction_time: i64, cooldown_secs: i64) -> bool {
    now - last_transaction_time >= cooldown_secs
}

/// Fixed-fraction sizing: spend `1 / split_factor` of the free quote balance
pub fn order_quantity(free_balance: Decimal, price: Decimal, split_factor: Decimal) -> Decimal {
    free_balance / price / split_factor
}

/// Fixed-precision decimal string for the order request (half away from zero)
pub fn format_quantity(quantity: Decimal, precision: u32) -> String {
    let mut rounded =
        quantity.round_dp_with_strategy(precision, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(precision);
    rounded.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(raw: &str) -> Decimal {
        Decimal::from_str(raw).unwrap()
    }

    #[test]
    fn test_parse_positive() {
        assert_eq!(parse_positive("price", "96.00000000").unwrap(), d("96"));
        assert_eq!(parse_positive("price", " 0.5 ").unwrap(), d("0.5"));
        assert!(parse_positive("price", "abc").is_err());
        assert!(parse_positive("price", "").is_err());
        assert!(parse_positive("price", "0").is_err());
        assert!(parse_positive("price", "-1").is_err());
        assert!(parse_positive("price", "NaN").is_err());
    }

    #[test]
    fn test_parse_amount_allows_zero() {
        assert_eq!(parse_amount("balance", "0.00000000").unwrap(), Decimal::ZERO);
        assert!(parse_amount("balance", "-0.1").is_err());
    }

    #[test]
    fn test_ratio_is_exact() {
        assert_eq!(ratio("threshold", -0.03).unwrap(), d("-0.03"));
        assert_eq!(ratio("threshold", 0.05).unwrap(), d("0.05"));
        assert_eq!(ratio("split", 10.0).unwrap(), d("10"));
    }

    #[test]
    fn test_drop_threshold_is_strict() {
        let threshold = d("-0.03");

        // Exactly -3% does not trigger
        let change = relative_change(d("97"), d("100"));
        assert_eq!(change, threshold);
        assert!(!is_drop_triggered(change, threshold));

        // Also exact for prices with no binary representation
        let change = relative_change(d("0.097"), d("0.1"));
        assert_eq!(change, threshold);
        assert!(!is_drop_triggered(change, threshold));

        // -3.0001% does
        assert!(is_drop_triggered(relative_change(d("96.9999"), d("100")), threshold));

        // A rise never triggers
        assert!(!is_drop_triggered(relative_change(d("101"), d("100")), threshold));
    }

    #[test]
    fn test_profit_threshold_is_strict() {
        let threshold = d("0.05");
        assert!(!is_profit_triggered(relative_change(d("105"), d("100")), threshold));
        assert!(!is_profit_triggered(relative_change(d("0.315"), d("0.3")), threshold));
        assert!(is_profit_triggered(relative_change(d("106"), d("100")), threshold));
        assert!(!is_profit_triggered(relative_change(d("94"), d("100")), threshold));
    }

    #[test]
    fn test_cooldown_gate() {
        let now = 1_700_000_000;
        assert!(!cooldown_elapsed(now, now - 100, 1800));
        assert!(!cooldown_elapsed(now, now - 1799, 1800));
        assert!(cooldown_elapsed(now, now - 1800, 1800));
        // Fresh anchors carry a zero timestamp
        assert!(cooldown_elapsed(now, 0, 1800));
    }

    #[test]
    fn test_quantity_sizing() {
        let quantity = order_quantity(d("1000"), d("96"), d("10"));
        assert_eq!(format_quantity(quantity, 4), "1.0417");
        assert_eq!(format_quantity(quantity, 2), "1.04");
        assert_eq!(format_quantity(d("1.5"), 4), "1.5000");
        assert_eq!(format_quantity(d("0.00005"), 4), "0.0001");
        assert_eq!(
            format_quantity(order_quantity(Decimal::ZERO, d("96"), d("10")), 4),
            "0.0000"
        );
    }
}
