use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::round_currency;

// ============================================================================
// Coupon Value Objects
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountType {
    Percentage,
    Fixed,
}

/// A named discount rule with an activation window, usage caps and a
/// minimum-purchase gate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    /// Always stored upper-case
    pub code: String,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub min_purchase_amount: Decimal,
    pub max_discount_amount: Option<Decimal>,
    pub usage_limit: Option<u32>,
    pub per_user_limit: Option<u32>,
    pub usage_count: u32,
    pub starts_at: Option<DateTime<Utc>>,
    pub expires_at: Option<DateTime<Utc>>,
    pub is_active: bool,
}

impl Coupon {
    /// Active, unlimited, no window and no minimum.
    pub fn new(code: &str, discount_type: DiscountType, discount_value: Decimal) -> Self {
        Self {
            id: Uuid::now_v7(),
            code: normalize_code(code),
            discount_type,
            discount_value,
            min_purchase_amount: Decimal::ZERO,
            max_discount_amount: None,
            usage_limit: None,
            per_user_limit: None,
            usage_count: 0,
            starts_at: None,
            expires_at: None,
            is_active: true,
        }
    }

    /// Discount this coupon grants on `subtotal`, capped by
    /// `max_discount_amount` and by the subtotal itself.
    pub fn discount_for(&self, subtotal: Decimal) -> Decimal {
        let raw = match self.discount_type {
            DiscountType::Percentage => subtotal * self.discount_value / Decimal::ONE_HUNDRED,
            DiscountType::Fixed => self.discount_value,
        };

        let capped = match self.max_discount_amount {
            Some(max) => raw.min(max),
            None => raw,
        };

        round_currency(capped.min(subtotal).max(Decimal::ZERO))
    }

    pub fn has_global_capacity(&self) -> bool {
        self.usage_limit.map_or(true, |limit| self.usage_count < limit)
    }
}

/// Codes are matched case-insensitively and stored upper-case.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// One redemption of a coupon by a user for an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CouponUsage {
    pub coupon_id: Uuid,
    pub user_id: Uuid,
    pub order_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// Why a coupon was refused. Variants follow the order the checks run in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CouponRejection {
    InvalidCode,
    Inactive,
    NotYetValid,
    Expired,
    GlobalLimitReached,
    PerUserLimitReached,
    BelowMinimum,
}

impl CouponRejection {
    pub fn message(&self) -> &'static str {
        match self {
            CouponRejection::InvalidCode => "Invalid coupon code",
            CouponRejection::Inactive => "This coupon is no longer active",
            CouponRejection::NotYetValid => "This coupon is not valid yet",
            CouponRejection::Expired => "This coupon has expired",
            CouponRejection::GlobalLimitReached => "This coupon has reached its usage limit",
            CouponRejection::PerUserLimitReached => "You have already used this coupon",
            CouponRejection::BelowMinimum => "Order subtotal is below the coupon minimum",
        }
    }
}

impl std::fmt::Display for CouponRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.message())
    }
}

/// Result of validating a code against a subtotal.
#[derive(Debug, Clone, PartialEq)]
pub enum CouponValidation {
    Valid {
        coupon_id: Uuid,
        code: String,
        discount_amount: Decimal,
    },
    Invalid(CouponRejection),
}

impl CouponValidation {
    pub fn is_valid(&self) -> bool {
        matches!(self, CouponValidation::Valid { .. })
    }

    pub fn discount_amount(&self) -> Option<Decimal> {
        match self {
            CouponValidation::Valid { discount_amount, .. } => Some(*discount_amount),
            CouponValidation::Invalid(_) => None,
        }
    }

    pub fn error(&self) -> Option<CouponRejection> {
        match self {
            CouponValidation::Valid { .. } => None,
            CouponValidation::Invalid(rejection) => Some(*rejection),
        }
    }
}

/// Outcome of the repository's atomic "check limits, increment, record" step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedemptionOutcome {
    Recorded { usage_count: u32 },
    Refused(CouponRejection),
    UnknownCoupon,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percentage_discount_is_capped() {
        let mut coupon = Coupon::new("summer20", DiscountType::Percentage, Decimal::new(20, 0));
        coupon.max_discount_amount = Some(Decimal::new(15, 0));

        assert_eq!(coupon.code, "SUMMER20");
        assert_eq!(coupon.discount_for(Decimal::new(100, 0)), Decimal::new(15, 0));
        assert_eq!(coupon.discount_for(Decimal::new(50, 0)), Decimal::new(10, 0));
    }

    #[test]
    fn test_fixed_discount_never_exceeds_subtotal() {
        let coupon = Coupon::new("TENOFF", DiscountType::Fixed, Decimal::new(10, 0));

        assert_eq!(coupon.discount_for(Decimal::new(6, 0)), Decimal::new(6, 0));
        assert_eq!(coupon.discount_for(Decimal::new(60, 0)), Decimal::new(10, 0));
    }

    #[test]
    fn test_percentage_discount_rounds_half_up() {
        let coupon = Coupon::new("PCT15", DiscountType::Percentage, Decimal::new(15, 0));

        // 15% of 0.10 = 0.015 -> 0.02
        assert_eq!(coupon.discount_for(Decimal::new(10, 2)), Decimal::new(2, 2));
    }

    #[test]
    fn test_global_capacity() {
        let mut coupon = Coupon::new("ONCE", DiscountType::Fixed, Decimal::ONE);
        assert!(coupon.has_global_capacity());

        coupon.usage_limit = Some(1);
        coupon.usage_count = 1;
        assert!(!coupon.has_global_capacity());
    }
}
