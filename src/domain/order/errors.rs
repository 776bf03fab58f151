use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::inventory::InventoryError;
use crate::errors::{Classify, ErrorKind, RepositoryError};
use super::value_objects::OrderStatus;

// ============================================================================
// Order Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum OrderError {
    #[error("Order not found: {0}")]
    NotFound(Uuid),

    #[error("Order belongs to another user")]
    Forbidden,

    #[error("Cannot move order from {from} to {to}")]
    InvalidStatusTransition { from: OrderStatus, to: OrderStatus },

    #[error("Order total {actual} does not match computed total {expected}")]
    TotalMismatch { expected: Decimal, actual: Decimal },

    #[error("Order items cannot be empty")]
    EmptyItems,

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(u32),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl Classify for OrderError {
    fn kind(&self) -> ErrorKind {
        match self {
            OrderError::NotFound(_) => ErrorKind::NotFound,
            OrderError::Forbidden => ErrorKind::Forbidden,
            OrderError::InvalidStatusTransition { .. } | OrderError::TotalMismatch { .. } => {
                ErrorKind::State
            }
            OrderError::EmptyItems | OrderError::InvalidQuantity(_) => ErrorKind::Validation,
            OrderError::Inventory(e) => e.kind(),
            OrderError::Repository(e) => e.kind(),
        }
    }
}
