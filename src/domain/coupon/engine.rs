use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use uuid::Uuid;

use super::errors::CouponError;
use super::repository::CouponRepository;
use super::value_objects::{
    normalize_code, Coupon, CouponRejection, CouponUsage, CouponValidation, RedemptionOutcome,
};

// ============================================================================
// Coupon Engine
// ============================================================================
//
// Validation is read-only. Usage counters only move through `redeem`, which
// the checkout calls once the order is actually being placed.
//
// ============================================================================

#[derive(Clone)]
pub struct CouponEngine {
    repository: Arc<dyn CouponRepository>,
}

impl CouponEngine {
    pub fn new(repository: Arc<dyn CouponRepository>) -> Self {
        Self { repository }
    }

    pub async fn validate(
        &self,
        code: &str,
        subtotal: Decimal,
        user_id: Option<Uuid>,
    ) -> Result<CouponValidation, CouponError> {
        self.validate_at(code, subtotal, user_id, Utc::now()).await
    }

    /// Checks run in a fixed order and stop at the first failure.
    pub async fn validate_at(
        &self,
        code: &str,
        subtotal: Decimal,
        user_id: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<CouponValidation, CouponError> {
        let code = normalize_code(code);

        let coupon = match self.repository.find_by_code(&code).await? {
            Some(coupon) => coupon,
            None => return Ok(Self::reject(&code, CouponRejection::InvalidCode)),
        };

        if !coupon.is_active {
            return Ok(Self::reject(&code, CouponRejection::Inactive));
        }

        if coupon.starts_at.is_some_and(|starts_at| starts_at > now) {
            return Ok(Self::reject(&code, CouponRejection::NotYetValid));
        }

        if coupon.expires_at.is_some_and(|expires_at| expires_at < now) {
            return Ok(Self::reject(&code, CouponRejection::Expired));
        }

        if !coupon.has_global_capacity() {
            return Ok(Self::reject(&code, CouponRejection::GlobalLimitReached));
        }

        if let (Some(user_id), Some(per_user_limit)) = (user_id, coupon.per_user_limit) {
            let used = self.repository.count_usages(coupon.id, user_id).await?;
            if used >= per_user_limit {
                return Ok(Self::reject(&code, CouponRejection::PerUserLimitReached));
            }
        }

        if subtotal < coupon.min_purchase_amount {
            return Ok(Self::reject(&code, CouponRejection::BelowMinimum));
        }

        let discount_amount = coupon.discount_for(subtotal);

        tracing::debug!(
            code = %code,
            subtotal = %subtotal,
            discount = %discount_amount,
            "Coupon accepted"
        );

        Ok(CouponValidation::Valid {
            coupon_id: coupon.id,
            code,
            discount_amount,
        })
    }

    /// Record a redemption for a placed order.
    pub async fn redeem(
        &self,
        coupon_id: Uuid,
        user_id: Uuid,
        order_id: Uuid,
    ) -> Result<CouponUsage, CouponError> {
        let usage = CouponUsage {
            coupon_id,
            user_id,
            order_id,
            created_at: Utc::now(),
        };

        match self.repository.record_usage(usage.clone()).await? {
            RedemptionOutcome::Recorded { usage_count } => {
                tracing::info!(
                    coupon_id = %coupon_id,
                    order_id = %order_id,
                    usage_count = usage_count,
                    "Coupon redeemed"
                );
                Ok(usage)
            }
            RedemptionOutcome::Refused(rejection) => {
                tracing::warn!(
                    coupon_id = %coupon_id,
                    order_id = %order_id,
                    reason = %rejection,
                    "Coupon redemption refused"
                );
                Err(CouponError::Rejected(rejection))
            }
            RedemptionOutcome::UnknownCoupon => Err(CouponError::NotFound(coupon_id)),
        }
    }

    /// Undo the redemption tied to an order that failed or was cancelled.
    pub async fn release(&self, coupon_id: Uuid, order_id: Uuid) -> Result<(), CouponError> {
        if self.repository.remove_usage(coupon_id, order_id).await? {
            tracing::info!(coupon_id = %coupon_id, order_id = %order_id, "Coupon redemption released");
        }
        Ok(())
    }

    /// Create or edit a coupon. The code is normalized before storing.
    pub async fn save_coupon(&self, mut coupon: Coupon) -> Result<Coupon, CouponError> {
        coupon.code = normalize_code(&coupon.code);
        if coupon.code.is_empty() {
            return Err(CouponError::EmptyCode);
        }
        self.repository.save(coupon.clone()).await?;
        Ok(coupon)
    }

    pub async fn find_coupon(&self, coupon_id: Uuid) -> Result<Coupon, CouponError> {
        self.repository
            .find_by_id(coupon_id)
            .await?
            .ok_or(CouponError::NotFound(coupon_id))
    }

    fn reject(code: &str, rejection: CouponRejection) -> CouponValidation {
        tracing::debug!(code = %code, reason = ?rejection, "Coupon rejected");
        CouponValidation::Invalid(rejection)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::coupon::value_objects::DiscountType;
    use crate::store::InMemoryStore;
    use chrono::Duration;

    async fn engine_with(coupon: Coupon) -> CouponEngine {
        let engine = CouponEngine::new(Arc::new(InMemoryStore::new()));
        engine.save_coupon(coupon).await.unwrap();
        engine
    }

    fn summer20() -> Coupon {
        let mut coupon = Coupon::new("SUMMER20", DiscountType::Percentage, Decimal::new(20, 0));
        coupon.max_discount_amount = Some(Decimal::new(15, 0));
        coupon
    }

    #[tokio::test]
    async fn test_percentage_coupon_capped_at_max_discount() {
        let engine = engine_with(summer20()).await;

        let result = engine.validate("summer20", Decimal::new(100, 0), None).await.unwrap();

        assert!(result.is_valid());
        assert_eq!(result.discount_amount(), Some(Decimal::new(15, 0)));
    }

    #[tokio::test]
    async fn test_below_minimum() {
        let mut coupon = Coupon::new("BIG50", DiscountType::Fixed, Decimal::new(5, 0));
        coupon.min_purchase_amount = Decimal::new(50, 0);
        let engine = engine_with(coupon).await;

        let result = engine.validate("BIG50", Decimal::new(40, 0), None).await.unwrap();

        assert!(!result.is_valid());
        assert_eq!(result.error(), Some(CouponRejection::BelowMinimum));
        assert_eq!(result.discount_amount(), None);
    }

    #[tokio::test]
    async fn test_unknown_code() {
        let engine = engine_with(summer20()).await;

        let result = engine.validate("WINTER", Decimal::new(100, 0), None).await.unwrap();
        assert_eq!(result.error(), Some(CouponRejection::InvalidCode));
    }

    #[tokio::test]
    async fn test_checks_short_circuit_in_order() {
        // Inactive AND expired AND below minimum: inactive wins
        let now = Utc::now();
        let mut coupon = summer20();
        coupon.is_active = false;
        coupon.expires_at = Some(now - Duration::days(1));
        coupon.min_purchase_amount = Decimal::new(500, 0);
        let engine = engine_with(coupon).await;

        let result = engine
            .validate_at("SUMMER20", Decimal::new(100, 0), None, now)
            .await
            .unwrap();
        assert_eq!(result.error(), Some(CouponRejection::Inactive));
    }

    #[tokio::test]
    async fn test_activation_window() {
        let now = Utc::now();

        let mut future = summer20();
        future.starts_at = Some(now + Duration::hours(1));
        let engine = engine_with(future).await;
        let result = engine.validate_at("SUMMER20", Decimal::new(100, 0), None, now).await.unwrap();
        assert_eq!(result.error(), Some(CouponRejection::NotYetValid));

        let mut past = summer20();
        past.expires_at = Some(now - Duration::hours(1));
        let engine = engine_with(past).await;
        let result = engine.validate_at("SUMMER20", Decimal::new(100, 0), None, now).await.unwrap();
        assert_eq!(result.error(), Some(CouponRejection::Expired));
    }

    #[tokio::test]
    async fn test_global_limit() {
        let mut coupon = summer20();
        coupon.usage_limit = Some(3);
        coupon.usage_count = 3;
        let engine = engine_with(coupon).await;

        let result = engine.validate("SUMMER20", Decimal::new(100, 0), None).await.unwrap();
        assert_eq!(result.error(), Some(CouponRejection::GlobalLimitReached));
    }

    #[tokio::test]
    async fn test_per_user_limit_only_checked_with_user() {
        let mut coupon = summer20();
        coupon.per_user_limit = Some(1);
        let coupon_id = coupon.id;
        let engine = engine_with(coupon).await;
        let user_id = Uuid::new_v4();

        engine.redeem(coupon_id, user_id, Uuid::new_v4()).await.unwrap();

        let result = engine
            .validate("SUMMER20", Decimal::new(100, 0), Some(user_id))
            .await
            .unwrap();
        assert_eq!(result.error(), Some(CouponRejection::PerUserLimitReached));

        let anonymous = engine.validate("SUMMER20", Decimal::new(100, 0), None).await.unwrap();
        assert!(anonymous.is_valid());
    }

    #[tokio::test]
    async fn test_validation_does_not_touch_usage() {
        let coupon = summer20();
        let coupon_id = coupon.id;
        let engine = engine_with(coupon).await;

        for _ in 0..3 {
            engine.validate("SUMMER20", Decimal::new(100, 0), Some(Uuid::new_v4())).await.unwrap();
        }

        assert_eq!(engine.find_coupon(coupon_id).await.unwrap().usage_count, 0);
    }

    #[tokio::test]
    async fn test_redeem_increments_and_enforces_limit() {
        let mut coupon = summer20();
        coupon.usage_limit = Some(1);
        let coupon_id = coupon.id;
        let engine = engine_with(coupon).await;

        engine.redeem(coupon_id, Uuid::new_v4(), Uuid::new_v4()).await.unwrap();
        assert_eq!(engine.find_coupon(coupon_id).await.unwrap().usage_count, 1);

        let second = engine.redeem(coupon_id, Uuid::new_v4(), Uuid::new_v4()).await;
        assert!(matches!(
            second,
            Err(CouponError::Rejected(CouponRejection::GlobalLimitReached))
        ));
        assert_eq!(engine.find_coupon(coupon_id).await.unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn test_release_undoes_redemption() {
        let coupon = summer20();
        let coupon_id = coupon.id;
        let engine = engine_with(coupon).await;
        let order_id = Uuid::new_v4();

        engine.redeem(coupon_id, Uuid::new_v4(), order_id).await.unwrap();
        engine.release(coupon_id, order_id).await.unwrap();

        assert_eq!(engine.find_coupon(coupon_id).await.unwrap().usage_count, 0);
    }

    #[tokio::test]
    async fn test_empty_code_cannot_be_saved() {
        let engine = CouponEngine::new(Arc::new(InMemoryStore::new()));
        let coupon = Coupon::new("   ", DiscountType::Fixed, Decimal::ONE);

        assert!(matches!(engine.save_coupon(coupon).await, Err(CouponError::EmptyCode)));
    }
}
