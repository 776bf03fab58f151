use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

// ============================================================================
// Money helpers
// ============================================================================
//
// Amounts are plain `Decimal`s in the store currency. Everything user-visible
// is rounded to cents, half away from zero.
//
// ============================================================================

/// Largest allowed gap between a stored total and its recomputed value.
pub const TOTAL_TOLERANCE: Decimal = Decimal::from_parts(1, 0, 0, false, 2);

/// Round to 2 decimal places, half-up.
pub fn round_currency(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Convert to minor units (cents). `None` if the amount does not fit an i64.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
}

/// `price × quantity`
pub fn line_total(price: Decimal, quantity: u32) -> Decimal {
    price * Decimal::from(quantity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_half_up() {
        assert_eq!(round_currency(Decimal::new(10005, 3)), Decimal::new(1001, 2));
        assert_eq!(round_currency(Decimal::new(10004, 3)), Decimal::new(1000, 2));
    }

    #[test]
    fn test_minor_units() {
        assert_eq!(to_minor_units(Decimal::new(1999, 2)), Some(1999));
        assert_eq!(to_minor_units(Decimal::new(5, 0)), Some(500));
    }

    #[test]
    fn test_tolerance_is_one_cent() {
        assert_eq!(TOTAL_TOLERANCE, Decimal::new(1, 2));
    }
}
