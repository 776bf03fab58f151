use uuid::Uuid;

use crate::errors::{Classify, ErrorKind, RepositoryError};

// ============================================================================
// Inventory Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum InventoryError {
    #[error("Variant not found: {0}")]
    NotFound(Uuid),

    #[error("Invalid quantity: {0}")]
    InvalidQuantity(i64),

    #[error("Insufficient stock for variant {variant_id}: requested {requested}, available {available}")]
    InsufficientStock {
        variant_id: Uuid,
        requested: u32,
        available: u32,
    },

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl Classify for InventoryError {
    fn kind(&self) -> ErrorKind {
        match self {
            InventoryError::NotFound(_) => ErrorKind::NotFound,
            InventoryError::InvalidQuantity(_) => ErrorKind::Validation,
            InventoryError::InsufficientStock { .. } => ErrorKind::Conflict,
            InventoryError::Repository(e) => e.kind(),
        }
    }
}
