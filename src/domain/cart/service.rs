use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::inventory::InventoryLedger;
use super::aggregate::Cart;
use super::errors::CartError;
use super::repository::{CartRepository, ProductCatalog};
use super::value_objects::{cap_quantity, CartItem, CartTotals};

// ============================================================================
// Cart Service - add / update / remove with ownership and stock ceilings
// ============================================================================

/// An item after a mutation, together with the recomputed cart figures.
#[derive(Debug, Clone, Serialize)]
pub struct CartUpdate {
    pub item: CartItem,
    pub totals: CartTotals,
}

#[derive(Clone)]
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    catalog: Arc<dyn ProductCatalog>,
    inventory: InventoryLedger,
}

impl CartService {
    pub fn new(
        carts: Arc<dyn CartRepository>,
        catalog: Arc<dyn ProductCatalog>,
        inventory: InventoryLedger,
    ) -> Self {
        Self {
            carts,
            catalog,
            inventory,
        }
    }

    pub async fn get_cart(&self, user_id: Uuid) -> Result<Cart, CartError> {
        let items = self.carts.find_by_user(user_id).await?;
        Ok(Cart::new(user_id, items))
    }

    /// Add a product, merging into an existing line for the same product.
    /// The resulting quantity is capped at the current stock ceiling.
    pub async fn add_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        quantity: i64,
    ) -> Result<CartUpdate, CartError> {
        let requested = match u32::try_from(quantity) {
            Ok(q) if q >= 1 => q,
            _ => return Err(CartError::InvalidQuantity(quantity)),
        };

        let listing = self
            .catalog
            .find_product(product_id)
            .await?
            .ok_or(CartError::ProductNotFound(product_id))?;

        let max_stock = match listing.variant_id {
            Some(variant_id) => {
                let stock = self.inventory.stock_level(variant_id).await?;
                if stock == 0 {
                    return Err(CartError::OutOfStock(product_id));
                }
                stock
            }
            None => 0,
        };

        let item = match self
            .carts
            .find_by_user_and_product(user_id, product_id)
            .await?
        {
            Some(existing) => {
                let merged = cap_quantity(existing.quantity.saturating_add(requested), max_stock);
                let updated = existing.with_quantity(merged, max_stock);
                self.carts.update(updated.clone()).await?;

                tracing::debug!(
                    user_id = %user_id,
                    product_id = %product_id,
                    requested = requested,
                    quantity = merged,
                    "Merged into existing cart item"
                );
                updated
            }
            None => {
                let now = Utc::now();
                let item = CartItem {
                    id: Uuid::now_v7(),
                    user_id,
                    product_id,
                    variant_id: listing.variant_id,
                    product_name: listing.name,
                    unit_price: listing.price,
                    quantity: cap_quantity(requested, max_stock),
                    max_stock,
                    image_url: listing.image_url,
                    created_at: now,
                    updated_at: now,
                };
                self.carts.insert(item.clone()).await?;

                tracing::debug!(
                    user_id = %user_id,
                    product_id = %product_id,
                    quantity = item.quantity,
                    "Added new cart item"
                );
                item
            }
        };

        let totals = self.get_cart(user_id).await?.totals();
        Ok(CartUpdate { item, totals })
    }

    pub async fn update_quantity(
        &self,
        item_id: Uuid,
        quantity: i64,
        user_id: Uuid,
    ) -> Result<CartUpdate, CartError> {
        let item = self.owned_item(item_id, user_id).await?;

        if item.is_stock_limited() && quantity > i64::from(item.max_stock) {
            return Err(CartError::ExceedsStock {
                requested: quantity,
                max_stock: item.max_stock,
            });
        }

        let quantity = match u32::try_from(quantity) {
            Ok(q) if q >= 1 => q,
            _ => return Err(CartError::InvalidQuantity(quantity)),
        };

        let updated = item.with_quantity(quantity, item.max_stock);
        self.carts.update(updated.clone()).await?;

        let totals = self.get_cart(user_id).await?.totals();
        Ok(CartUpdate {
            item: updated,
            totals,
        })
    }

    pub async fn remove_item(&self, item_id: Uuid, user_id: Uuid) -> Result<CartTotals, CartError> {
        self.owned_item(item_id, user_id).await?;

        if !self.carts.delete(item_id).await? {
            return Err(CartError::NotFound(item_id));
        }

        Ok(self.get_cart(user_id).await?.totals())
    }

    /// Remove every item of `user_id`. Only ever touches the caller's own rows.
    pub async fn clear_cart(&self, user_id: Uuid) -> Result<u64, CartError> {
        let removed = self.carts.clear(user_id).await?;
        tracing::debug!(user_id = %user_id, removed = removed, "Cart cleared");
        Ok(removed)
    }

    /// Existence check first, ownership second. Neither mutates anything.
    async fn owned_item(&self, item_id: Uuid, user_id: Uuid) -> Result<CartItem, CartError> {
        let item = self
            .carts
            .find_item(item_id)
            .await?
            .ok_or(CartError::NotFound(item_id))?;

        if item.user_id != user_id {
            tracing::warn!(
                item_id = %item_id,
                owner = %item.user_id,
                caller = %user_id,
                "Cart item ownership mismatch"
            );
            return Err(CartError::Forbidden);
        }

        Ok(item)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::cart::value_objects::ProductListing;
    use crate::domain::inventory::Variant;
    use crate::store::InMemoryStore;
    use rust_decimal::Decimal;

    struct Fixture {
        service: CartService,
        store: InMemoryStore,
        product_id: Uuid,
        variant_id: Uuid,
    }

    async fn fixture(stock: u32) -> Fixture {
        let store = InMemoryStore::new();
        let product_id = Uuid::new_v4();
        let variant = Variant::new(product_id, "HOODIE-L", stock);
        let variant_id = variant.id;
        store.seed_variant(variant).await;
        store
            .seed_product(ProductListing {
                product_id,
                variant_id: Some(variant_id),
                name: "Hoodie".to_string(),
                price: Decimal::new(4500, 2),
                image_url: None,
            })
            .await;

        let shared = Arc::new(store.clone());
        let service = CartService::new(
            shared.clone(),
            shared.clone(),
            InventoryLedger::new(shared),
        );

        Fixture {
            service,
            store,
            product_id,
            variant_id,
        }
    }

    #[tokio::test]
    async fn test_add_item_creates_line() {
        let fx = fixture(10).await;
        let user_id = Uuid::new_v4();

        let update = fx.service.add_item(user_id, fx.product_id, 2).await.unwrap();

        assert_eq!(update.item.quantity, 2);
        assert_eq!(update.item.max_stock, 10);
        assert_eq!(update.item.variant_id, Some(fx.variant_id));
        assert_eq!(update.totals.subtotal, Decimal::new(9000, 2));
        assert_eq!(update.totals.item_count, 2);
    }

    #[tokio::test]
    async fn test_add_existing_product_merges_and_caps_at_stock() {
        let fx = fixture(10).await;
        let user_id = Uuid::new_v4();

        fx.service.add_item(user_id, fx.product_id, 8).await.unwrap();
        let update = fx.service.add_item(user_id, fx.product_id, 5).await.unwrap();

        assert_eq!(update.item.quantity, 10);
        let cart = fx.service.get_cart(user_id).await.unwrap();
        assert_eq!(cart.items.len(), 1);
        assert_eq!(cart.item_count(), 10);
        assert_eq!(cart.subtotal(), Decimal::new(45000, 2));
    }

    #[tokio::test]
    async fn test_add_item_rejects_zero_quantity() {
        let fx = fixture(10).await;

        let result = fx.service.add_item(Uuid::new_v4(), fx.product_id, 0).await;
        assert!(matches!(result, Err(CartError::InvalidQuantity(0))));
    }

    #[tokio::test]
    async fn test_add_out_of_stock_product() {
        let fx = fixture(0).await;

        let result = fx.service.add_item(Uuid::new_v4(), fx.product_id, 1).await;
        assert!(matches!(result, Err(CartError::OutOfStock(_))));
    }

    #[tokio::test]
    async fn test_add_unknown_product() {
        let fx = fixture(10).await;

        let result = fx.service.add_item(Uuid::new_v4(), Uuid::new_v4(), 1).await;
        assert!(matches!(result, Err(CartError::ProductNotFound(_))));
    }

    #[tokio::test]
    async fn test_untracked_product_has_no_ceiling() {
        let fx = fixture(10).await;
        let product_id = Uuid::new_v4();
        fx.store
            .seed_product(ProductListing {
                product_id,
                variant_id: None,
                name: "Gift wrap".to_string(),
                price: Decimal::new(300, 2),
                image_url: None,
            })
            .await;

        let update = fx.service.add_item(Uuid::new_v4(), product_id, 250).await.unwrap();
        assert_eq!(update.item.quantity, 250);
        assert_eq!(update.item.max_stock, 0);
    }

    #[tokio::test]
    async fn test_item_count_spans_large_untracked_lines() {
        let fx = fixture(10).await;
        let user_id = Uuid::new_v4();

        for name in ["Bulk screws", "Bulk washers"] {
            let product_id = Uuid::new_v4();
            fx.store
                .seed_product(ProductListing {
                    product_id,
                    variant_id: None,
                    name: name.to_string(),
                    price: Decimal::new(1, 2),
                    image_url: None,
                })
                .await;
            fx.service.add_item(user_id, product_id, 3_000_000_000).await.unwrap();
        }

        let cart = fx.service.get_cart(user_id).await.unwrap();
        assert_eq!(cart.item_count(), 6_000_000_000);
        assert_eq!(cart.totals().item_count, 6_000_000_000);
        assert_eq!(cart.subtotal(), Decimal::new(6_000_000_000, 2));
    }

    #[tokio::test]
    async fn test_update_quantity_rules() {
        let fx = fixture(10).await;
        let user_id = Uuid::new_v4();
        let item = fx.service.add_item(user_id, fx.product_id, 2).await.unwrap().item;

        let zero = fx.service.update_quantity(item.id, 0, user_id).await;
        assert!(matches!(zero, Err(CartError::InvalidQuantity(0))));

        let negative = fx.service.update_quantity(item.id, -4, user_id).await;
        assert!(matches!(negative, Err(CartError::InvalidQuantity(-4))));

        let too_many = fx.service.update_quantity(item.id, 11, user_id).await;
        assert!(matches!(
            too_many,
            Err(CartError::ExceedsStock { requested: 11, max_stock: 10 })
        ));

        let ok = fx.service.update_quantity(item.id, 7, user_id).await.unwrap();
        assert_eq!(ok.item.quantity, 7);
        assert_eq!(ok.totals.item_count, 7);
    }

    #[tokio::test]
    async fn test_update_quantity_checks_existence_then_ownership() {
        let fx = fixture(10).await;
        let owner = Uuid::new_v4();
        let item = fx.service.add_item(owner, fx.product_id, 2).await.unwrap().item;

        let missing = fx.service.update_quantity(Uuid::new_v4(), 1, owner).await;
        assert!(matches!(missing, Err(CartError::NotFound(_))));

        let stranger = fx.service.update_quantity(item.id, 3, Uuid::new_v4()).await;
        assert!(matches!(stranger, Err(CartError::Forbidden)));

        let cart = fx.service.get_cart(owner).await.unwrap();
        assert_eq!(cart.items[0].quantity, 2);
    }

    #[tokio::test]
    async fn test_remove_item_is_ownership_checked() {
        let fx = fixture(10).await;
        let owner = Uuid::new_v4();
        let item = fx.service.add_item(owner, fx.product_id, 1).await.unwrap().item;

        let stranger = fx.service.remove_item(item.id, Uuid::new_v4()).await;
        assert!(matches!(stranger, Err(CartError::Forbidden)));

        let totals = fx.service.remove_item(item.id, owner).await.unwrap();
        assert!(totals.is_empty);
    }

    #[tokio::test]
    async fn test_clear_cart_only_touches_own_items() {
        let fx = fixture(10).await;
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        fx.service.add_item(alice, fx.product_id, 1).await.unwrap();
        fx.service.add_item(bob, fx.product_id, 1).await.unwrap();

        assert_eq!(fx.service.clear_cart(alice).await.unwrap(), 1);

        assert!(fx.service.get_cart(alice).await.unwrap().is_empty());
        assert!(!fx.service.get_cart(bob).await.unwrap().is_empty());
    }
}
