use uuid::Uuid;

use crate::errors::{Classify, ErrorKind, RepositoryError};
use super::value_objects::CouponRejection;

// ============================================================================
// Coupon Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CouponError {
    #[error("{0}")]
    Rejected(CouponRejection),

    #[error("Coupon not found: {0}")]
    NotFound(Uuid),

    #[error("Coupon code cannot be empty")]
    EmptyCode,

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl Classify for CouponError {
    fn kind(&self) -> ErrorKind {
        match self {
            CouponError::Rejected(
                CouponRejection::GlobalLimitReached | CouponRejection::PerUserLimitReached,
            ) => ErrorKind::Conflict,
            CouponError::Rejected(CouponRejection::InvalidCode) | CouponError::NotFound(_) => {
                ErrorKind::NotFound
            }
            CouponError::Rejected(_) | CouponError::EmptyCode => ErrorKind::Validation,
            CouponError::Repository(e) => e.kind(),
        }
    }
}
