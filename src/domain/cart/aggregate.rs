use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use super::value_objects::{CartItem, CartTotals};

// ============================================================================
// Cart Aggregate - a user's items plus the figures derived from them
// ============================================================================

#[derive(Debug, Clone, Serialize)]
pub struct Cart {
    pub user_id: Uuid,
    pub items: Vec<CartItem>,
}

impl Cart {
    pub fn new(user_id: Uuid, items: Vec<CartItem>) -> Self {
        Self { user_id, items }
    }

    pub fn subtotal(&self) -> Decimal {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    /// Units across all lines. Widened so untracked lines cannot overflow it.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn totals(&self) -> CartTotals {
        CartTotals {
            subtotal: self.subtotal(),
            item_count: self.item_count(),
            is_empty: self.is_empty(),
        }
    }

    pub fn find_product(&self, product_id: Uuid) -> Option<&CartItem> {
        self.items.iter().find(|item| item.product_id == product_id)
    }
}
