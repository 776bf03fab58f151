use uuid::Uuid;

use crate::domain::inventory::InventoryError;
use crate::errors::{Classify, ErrorKind, RepositoryError};

// ============================================================================
// Cart Business Rule Errors
// ============================================================================

#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Cart item not found: {0}")]
    NotFound(Uuid),

    #[error("Cart item belongs to another user")]
    Forbidden,

    #[error("Invalid item quantity: {0}")]
    InvalidQuantity(i64),

    #[error("Requested quantity {requested} exceeds available stock {max_stock}")]
    ExceedsStock { requested: i64, max_stock: u32 },

    #[error("Product is out of stock: {0}")]
    OutOfStock(Uuid),

    #[error("Product not found: {0}")]
    ProductNotFound(Uuid),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

impl Classify for CartError {
    fn kind(&self) -> ErrorKind {
        match self {
            CartError::NotFound(_) | CartError::ProductNotFound(_) => ErrorKind::NotFound,
            CartError::Forbidden => ErrorKind::Forbidden,
            CartError::InvalidQuantity(_)
            | CartError::ExceedsStock { .. }
            | CartError::OutOfStock(_) => ErrorKind::Validation,
            CartError::Inventory(e) => e.kind(),
            CartError::Repository(e) => e.kind(),
        }
    }
}
