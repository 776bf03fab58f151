use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::money::line_total;

// ============================================================================
// Cart Value Objects
// ============================================================================

/// A user's pending intent to buy N units of a product at a remembered price.
///
/// `max_stock == 0` means the product is not stock-tracked and has no ceiling.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Option<Uuid>,
    pub product_name: String,
    pub unit_price: Decimal,
    pub quantity: u32,
    pub max_stock: u32,
    pub image_url: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    pub fn subtotal(&self) -> Decimal {
        line_total(self.unit_price, self.quantity)
    }

    pub fn can_increase(&self, n: u32) -> bool {
        self.max_stock == 0 || self.quantity.saturating_add(n) <= self.max_stock
    }

    /// Going down to zero is not a decrease, it is a removal.
    pub fn can_decrease(&self, n: u32) -> bool {
        self.quantity > n
    }

    pub fn is_stock_limited(&self) -> bool {
        self.max_stock > 0
    }

    /// Copy of this item at a new quantity and stock ceiling.
    pub fn with_quantity(&self, quantity: u32, max_stock: u32) -> Self {
        Self {
            quantity,
            max_stock,
            updated_at: Utc::now(),
            ..self.clone()
        }
    }
}

/// Clamp a requested quantity to the stock ceiling (0 = no ceiling).
pub fn cap_quantity(requested: u32, max_stock: u32) -> u32 {
    if max_stock > 0 {
        requested.min(max_stock)
    } else {
        requested
    }
}

/// What the catalog knows about a product at the moment it is added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductListing {
    pub product_id: Uuid,
    /// Stock-tracked variant backing this listing, if any
    pub variant_id: Option<Uuid>,
    pub name: String,
    pub price: Decimal,
    pub image_url: Option<String>,
}

/// Derived cart figures. Never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct CartTotals {
    pub subtotal: Decimal,
    pub item_count: u64,
    pub is_empty: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(quantity: u32, max_stock: u32) -> CartItem {
        let now = Utc::now();
        CartItem {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            product_id: Uuid::new_v4(),
            variant_id: None,
            product_name: "Canvas Tote".to_string(),
            unit_price: Decimal::new(1250, 2),
            quantity,
            max_stock,
            image_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_subtotal() {
        assert_eq!(item(3, 10).subtotal(), Decimal::new(3750, 2));
    }

    #[test]
    fn test_can_increase() {
        assert!(item(8, 10).can_increase(2));
        assert!(!item(8, 10).can_increase(3));
        assert!(item(500, 0).can_increase(1000));
    }

    #[test]
    fn test_can_decrease_never_reaches_zero() {
        assert!(item(2, 10).can_decrease(1));
        assert!(!item(1, 10).can_decrease(1));
        assert!(!item(3, 10).can_decrease(3));
    }

    #[test]
    fn test_cap_quantity() {
        assert_eq!(cap_quantity(13, 10), 10);
        assert_eq!(cap_quantity(13, 0), 13);
        assert_eq!(cap_quantity(4, 10), 4);
    }
}
