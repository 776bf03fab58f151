use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::RepositoryError;
use super::value_objects::{Coupon, CouponUsage, RedemptionOutcome};

#[async_trait]
pub trait CouponRepository: Send + Sync {
    /// `code` is already normalized (upper-case).
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError>;

    async fn find_by_id(&self, coupon_id: Uuid) -> Result<Option<Coupon>, RepositoryError>;

    /// Insert or replace (admin edit).
    async fn save(&self, coupon: Coupon) -> Result<(), RepositoryError>;

    async fn count_usages(&self, coupon_id: Uuid, user_id: Uuid) -> Result<u32, RepositoryError>;

    /// Re-check global and per-user limits, increment `usage_count` and
    /// append the usage row, all in one atomic unit.
    async fn record_usage(&self, usage: CouponUsage) -> Result<RedemptionOutcome, RepositoryError>;

    /// Undo a redemption for an order that was never persisted. Returns
    /// `false` when there was nothing to undo.
    async fn remove_usage(&self, coupon_id: Uuid, order_id: Uuid) -> Result<bool, RepositoryError>;
}
