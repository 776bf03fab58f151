use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::checkout::webhook::{DeadLetter, DeadLetterStats, DeadLetterStore};
use crate::domain::address::{AddressRepository, ShippingAddress};
use crate::domain::cart::{CartItem, CartRepository, ProductCatalog, ProductListing};
use crate::domain::coupon::{Coupon, CouponRejection, CouponRepository, CouponUsage, RedemptionOutcome};
use crate::domain::inventory::{
    InventoryLogEntry, InventoryRepository, Reservation, StockAdjustment, StockChange, Variant,
};
use crate::domain::order::{Order, OrderRepository, OrderStatus, PaymentRecord, PaymentStatus};
use crate::errors::RepositoryError;

// ============================================================================
// In-Memory Store
// ============================================================================

#[derive(Default)]
struct Tables {
    variants: HashMap<Uuid, Variant>,
    inventory_log: Vec<InventoryLogEntry>,
    products: HashMap<Uuid, ProductListing>,
    coupons: HashMap<Uuid, Coupon>,
    coupon_usages: Vec<CouponUsage>,
    cart_items: Vec<CartItem>,
    orders: Vec<Order>,
    payments: HashMap<Uuid, PaymentRecord>,
    addresses: Vec<ShippingAddress>,
    dead_letters: Vec<DeadLetter>,
}

impl Tables {
    /// Apply a stock change and append its log entry.
    fn write_stock(&mut self, variant_id: Uuid, new_quantity: u32, change: StockChange) -> Option<StockAdjustment> {
        let variant = self.variants.get_mut(&variant_id)?;
        let previous_quantity = variant.stock;
        variant.stock = new_quantity;

        self.inventory_log
            .push(change.into_entry(variant_id, previous_quantity, new_quantity));

        Some(StockAdjustment {
            previous_quantity,
            new_quantity,
        })
    }
}

/// Cheap to clone; clones share the same tables.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn seed_variant(&self, variant: Variant) {
        self.tables.lock().await.variants.insert(variant.id, variant);
    }

    pub async fn seed_product(&self, listing: ProductListing) {
        self.tables
            .lock()
            .await
            .products
            .insert(listing.product_id, listing);
    }
}

// ============================================================================
// Inventory
// ============================================================================

#[async_trait]
impl InventoryRepository for InMemoryStore {
    async fn find_variant(&self, variant_id: Uuid) -> Result<Option<Variant>, RepositoryError> {
        Ok(self.tables.lock().await.variants.get(&variant_id).cloned())
    }

    async fn set_stock(
        &self,
        variant_id: Uuid,
        new_quantity: u32,
        change: StockChange,
    ) -> Result<Option<StockAdjustment>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .write_stock(variant_id, new_quantity, change))
    }

    async fn decrement_if_available(
        &self,
        variant_id: Uuid,
        quantity: u32,
        change: StockChange,
    ) -> Result<Option<Reservation>, RepositoryError> {
        let mut tables = self.tables.lock().await;

        let Some(available) = tables.variants.get(&variant_id).map(|v| v.stock) else {
            return Ok(None);
        };

        if available < quantity {
            return Ok(Some(Reservation::Insufficient { available }));
        }

        Ok(tables
            .write_stock(variant_id, available - quantity, change)
            .map(Reservation::Reserved))
    }

    async fn increment(
        &self,
        variant_id: Uuid,
        quantity: u32,
        change: StockChange,
    ) -> Result<Option<StockAdjustment>, RepositoryError> {
        let mut tables = self.tables.lock().await;

        let Some(current) = tables.variants.get(&variant_id).map(|v| v.stock) else {
            return Ok(None);
        };

        let new_quantity = current.checked_add(quantity).ok_or_else(|| {
            RepositoryError::Conflict(format!("stock overflow for variant {}", variant_id))
        })?;

        Ok(tables.write_stock(variant_id, new_quantity, change))
    }

    async fn log_entries(&self, variant_id: Uuid) -> Result<Vec<InventoryLogEntry>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .inventory_log
            .iter()
            .filter(|entry| entry.variant_id == variant_id)
            .cloned()
            .collect())
    }

    async fn find_low_stock(&self, threshold: u32) -> Result<Vec<Variant>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut variants: Vec<Variant> = tables
            .variants
            .values()
            .filter(|v| v.stock <= threshold)
            .cloned()
            .collect();
        variants.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.sku.cmp(&b.sku)));
        Ok(variants)
    }
}

// ============================================================================
// Coupons
// ============================================================================

#[async_trait]
impl CouponRepository for InMemoryStore {
    async fn find_by_code(&self, code: &str) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .coupons
            .values()
            .find(|c| c.code == code)
            .cloned())
    }

    async fn find_by_id(&self, coupon_id: Uuid) -> Result<Option<Coupon>, RepositoryError> {
        Ok(self.tables.lock().await.coupons.get(&coupon_id).cloned())
    }

    async fn save(&self, coupon: Coupon) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;

        if tables
            .coupons
            .values()
            .any(|c| c.code == coupon.code && c.id != coupon.id)
        {
            return Err(RepositoryError::Conflict(format!(
                "coupon code {} already exists",
                coupon.code
            )));
        }

        tables.coupons.insert(coupon.id, coupon);
        Ok(())
    }

    async fn count_usages(&self, coupon_id: Uuid, user_id: Uuid) -> Result<u32, RepositoryError> {
        let count = self
            .tables
            .lock()
            .await
            .coupon_usages
            .iter()
            .filter(|u| u.coupon_id == coupon_id && u.user_id == user_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn record_usage(&self, usage: CouponUsage) -> Result<RedemptionOutcome, RepositoryError> {
        let mut tables = self.tables.lock().await;

        let user_usages = tables
            .coupon_usages
            .iter()
            .filter(|u| u.coupon_id == usage.coupon_id && u.user_id == usage.user_id)
            .count();

        let Some(coupon) = tables.coupons.get_mut(&usage.coupon_id) else {
            return Ok(RedemptionOutcome::UnknownCoupon);
        };

        if !coupon.has_global_capacity() {
            return Ok(RedemptionOutcome::Refused(CouponRejection::GlobalLimitReached));
        }

        if let Some(limit) = coupon.per_user_limit {
            if user_usages >= limit as usize {
                return Ok(RedemptionOutcome::Refused(CouponRejection::PerUserLimitReached));
            }
        }

        coupon.usage_count += 1;
        let usage_count = coupon.usage_count;
        tables.coupon_usages.push(usage);

        Ok(RedemptionOutcome::Recorded { usage_count })
    }

    async fn remove_usage(&self, coupon_id: Uuid, order_id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;

        let Some(position) = tables
            .coupon_usages
            .iter()
            .position(|u| u.coupon_id == coupon_id && u.order_id == order_id)
        else {
            return Ok(false);
        };

        tables.coupon_usages.remove(position);
        if let Some(coupon) = tables.coupons.get_mut(&coupon_id) {
            coupon.usage_count = coupon.usage_count.saturating_sub(1);
        }
        Ok(true)
    }
}

// ============================================================================
// Catalog and Carts
// ============================================================================

#[async_trait]
impl ProductCatalog for InMemoryStore {
    async fn find_product(&self, product_id: Uuid) -> Result<Option<ProductListing>, RepositoryError> {
        Ok(self.tables.lock().await.products.get(&product_id).cloned())
    }
}

#[async_trait]
impl CartRepository for InMemoryStore {
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<CartItem>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .cart_items
            .iter()
            .filter(|item| item.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_item(&self, item_id: Uuid) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .cart_items
            .iter()
            .find(|item| item.id == item_id)
            .cloned())
    }

    async fn find_by_user_and_product(
        &self,
        user_id: Uuid,
        product_id: Uuid,
    ) -> Result<Option<CartItem>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .cart_items
            .iter()
            .find(|item| item.user_id == user_id && item.product_id == product_id)
            .cloned())
    }

    async fn insert(&self, item: CartItem) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;

        if tables.cart_items.iter().any(|i| i.id == item.id) {
            return Err(RepositoryError::Conflict(format!("cart item {} already exists", item.id)));
        }

        tables.cart_items.push(item);
        Ok(())
    }

    async fn update(&self, item: CartItem) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;

        let slot = tables
            .cart_items
            .iter_mut()
            .find(|i| i.id == item.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("cart item {}", item.id)))?;

        *slot = item;
        Ok(())
    }

    async fn delete(&self, item_id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.cart_items.len();
        tables.cart_items.retain(|item| item.id != item_id);
        Ok(tables.cart_items.len() < before)
    }

    async fn clear(&self, user_id: Uuid) -> Result<u64, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.cart_items.len();
        tables.cart_items.retain(|item| item.user_id != user_id);
        Ok((before - tables.cart_items.len()) as u64)
    }
}

// ============================================================================
// Orders and Payments
// ============================================================================

#[async_trait]
impl OrderRepository for InMemoryStore {
    async fn create(&self, order: Order) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;

        if tables.orders.iter().any(|o| o.id() == order.id()) {
            return Err(RepositoryError::Conflict(format!("order {} already exists", order.id())));
        }

        tables.orders.push(order);
        Ok(())
    }

    async fn find(&self, order_id: Uuid) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .orders
            .iter()
            .find(|o| o.id() == order_id)
            .cloned())
    }

    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id() == user_id)
            .cloned()
            .collect())
    }

    async fn save_transition(
        &self,
        order: Order,
        expected: OrderStatus,
        payment: Option<PaymentRecord>,
    ) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;

        let slot = tables
            .orders
            .iter_mut()
            .find(|o| o.id() == order.id())
            .ok_or_else(|| RepositoryError::NotFound(format!("order {}", order.id())))?;

        if slot.status() != expected {
            return Ok(false);
        }

        *slot = order;
        if let Some(payment) = payment {
            tables.payments.insert(payment.order_id, payment);
        }
        Ok(true)
    }

    async fn find_payment(&self, order_id: Uuid) -> Result<Option<PaymentRecord>, RepositoryError> {
        Ok(self.tables.lock().await.payments.get(&order_id).cloned())
    }

    async fn find_payment_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<PaymentRecord>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .payments
            .values()
            .find(|p| p.session_id == session_id)
            .cloned())
    }

    async fn set_payment_status(
        &self,
        order_id: Uuid,
        status: PaymentStatus,
    ) -> Result<bool, RepositoryError> {
        match self.tables.lock().await.payments.get_mut(&order_id) {
            Some(record) => {
                record.status = status;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn claim_fulfilment(
        &self,
        order_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        match self.tables.lock().await.payments.get_mut(&order_id) {
            Some(record) if record.status == PaymentStatus::Completed && record.fulfilled_at.is_none() => {
                record.fulfilled_at = Some(at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn release_fulfilment(&self, order_id: Uuid) -> Result<bool, RepositoryError> {
        match self.tables.lock().await.payments.get_mut(&order_id) {
            Some(record) => Ok(record.fulfilled_at.take().is_some()),
            None => Ok(false),
        }
    }
}

// ============================================================================
// Addresses
// ============================================================================

#[async_trait]
impl AddressRepository for InMemoryStore {
    async fn find_address(&self, address_id: Uuid) -> Result<Option<ShippingAddress>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .addresses
            .iter()
            .find(|a| a.id == address_id)
            .cloned())
    }

    async fn find_addresses(&self, user_id: Uuid) -> Result<Vec<ShippingAddress>, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut addresses: Vec<ShippingAddress> = tables
            .addresses
            .iter()
            .filter(|a| a.user_id == user_id)
            .cloned()
            .collect();
        // Stable sort keeps insertion order among non-defaults.
        addresses.sort_by_key(|a| !a.is_default);
        Ok(addresses)
    }

    async fn insert_address(&self, address: ShippingAddress) -> Result<(), RepositoryError> {
        self.tables.lock().await.addresses.push(address);
        Ok(())
    }

    async fn update_address(&self, address: ShippingAddress) -> Result<(), RepositoryError> {
        let mut tables = self.tables.lock().await;

        let slot = tables
            .addresses
            .iter_mut()
            .find(|a| a.id == address.id)
            .ok_or_else(|| RepositoryError::NotFound(format!("address {}", address.id)))?;

        *slot = address;
        Ok(())
    }

    async fn delete_address(&self, address_id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;
        let before = tables.addresses.len();
        tables.addresses.retain(|a| a.id != address_id);
        Ok(tables.addresses.len() < before)
    }

    async fn set_default(&self, user_id: Uuid, address_id: Uuid) -> Result<bool, RepositoryError> {
        let mut tables = self.tables.lock().await;

        if !tables
            .addresses
            .iter()
            .any(|a| a.id == address_id && a.user_id == user_id)
        {
            return Ok(false);
        }

        for address in tables.addresses.iter_mut().filter(|a| a.user_id == user_id) {
            address.is_default = address.id == address_id;
        }
        Ok(true)
    }
}

// ============================================================================
// Dead Letters
// ============================================================================

#[async_trait]
impl DeadLetterStore for InMemoryStore {
    async fn push_dead_letter(&self, letter: DeadLetter) -> Result<(), RepositoryError> {
        self.tables.lock().await.dead_letters.push(letter);
        Ok(())
    }

    async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, RepositoryError> {
        Ok(self
            .tables
            .lock()
            .await
            .dead_letters
            .iter()
            .take(limit)
            .cloned()
            .collect())
    }

    async fn dead_letter_stats(&self) -> Result<DeadLetterStats, RepositoryError> {
        let tables = self.tables.lock().await;
        let mut by_event_type = HashMap::new();
        for letter in &tables.dead_letters {
            *by_event_type.entry(letter.event_type.clone()).or_insert(0u64) += 1;
        }

        Ok(DeadLetterStats {
            total: tables.dead_letters.len() as u64,
            by_event_type,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::inventory::ChangeType;
    use chrono::Utc;

    fn sale() -> StockChange {
        StockChange {
            change_type: ChangeType::Sale,
            reason: None,
            actor_id: Uuid::nil(),
        }
    }

    #[tokio::test]
    async fn test_decrement_refuses_to_go_negative() {
        let store = InMemoryStore::new();
        let variant = Variant::new(Uuid::new_v4(), "SKU-1", 3);
        let variant_id = variant.id;
        store.seed_variant(variant).await;

        let refused = store.decrement_if_available(variant_id, 4, sale()).await.unwrap();
        assert_eq!(refused, Some(Reservation::Insufficient { available: 3 }));
        assert!(store.log_entries(variant_id).await.unwrap().is_empty());

        let reserved = store.decrement_if_available(variant_id, 3, sale()).await.unwrap();
        assert!(matches!(reserved, Some(Reservation::Reserved(adj)) if adj.new_quantity == 0));
        assert_eq!(store.log_entries(variant_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_variant_writes_return_none() {
        let store = InMemoryStore::new();

        assert!(store.set_stock(Uuid::new_v4(), 5, sale()).await.unwrap().is_none());
        assert!(store.increment(Uuid::new_v4(), 5, sale()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_coupon_code_conflicts() {
        let store = InMemoryStore::new();
        let first = Coupon::new("WELCOME", crate::domain::coupon::DiscountType::Fixed, 5.into());
        let second = Coupon::new("welcome", crate::domain::coupon::DiscountType::Fixed, 7.into());

        store.save(first).await.unwrap();
        assert!(matches!(store.save(second).await, Err(RepositoryError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_record_usage_rechecks_limits() {
        let store = InMemoryStore::new();
        let mut coupon = Coupon::new("ONCE", crate::domain::coupon::DiscountType::Fixed, 5.into());
        coupon.usage_limit = Some(1);
        let coupon_id = coupon.id;
        store.save(coupon).await.unwrap();

        let usage = |user_id| CouponUsage {
            coupon_id,
            user_id,
            order_id: Uuid::new_v4(),
            created_at: Utc::now(),
        };

        assert_eq!(
            store.record_usage(usage(Uuid::new_v4())).await.unwrap(),
            RedemptionOutcome::Recorded { usage_count: 1 }
        );
        assert_eq!(
            store.record_usage(usage(Uuid::new_v4())).await.unwrap(),
            RedemptionOutcome::Refused(CouponRejection::GlobalLimitReached)
        );
    }

    #[tokio::test]
    async fn test_dead_letter_stats_group_by_type() {
        let store = InMemoryStore::new();
        for event_type in ["checkout.session.completed", "checkout.session.completed", "payment_intent.payment_failed"] {
            store
                .push_dead_letter(DeadLetter {
                    id: Uuid::new_v4(),
                    event_id: "evt_1".to_string(),
                    event_type: event_type.to_string(),
                    order_id: None,
                    payload: serde_json::json!({}),
                    error_message: "boom".to_string(),
                    failed_at: Utc::now(),
                })
                .await
                .unwrap();
        }

        let stats = store.dead_letter_stats().await.unwrap();
        assert_eq!(stats.total, 3);
        assert_eq!(stats.by_event_type["checkout.session.completed"], 2);
        assert_eq!(store.dead_letters(1).await.unwrap().len(), 1);
    }
}
