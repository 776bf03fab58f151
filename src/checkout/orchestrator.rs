use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::address::{AddressError, AddressService};
use crate::domain::cart::{Cart, CartError, CartService};
use crate::domain::coupon::{CouponEngine, CouponError, CouponRejection, CouponValidation};
use crate::domain::inventory::{InventoryError, InventoryLedger};
use crate::domain::money::{round_currency, to_minor_units};
use crate::domain::order::{
    NewOrder, Order, OrderCharges, OrderError, OrderItem, OrderService, OrderStatus, PaymentMethod,
};
use crate::errors::{Classify, ErrorKind};
use crate::metrics::Metrics;
use super::payment::{CheckoutSessionRequest, LineItem, PaymentGateway, PaymentGatewayError};

// ============================================================================
// Checkout Orchestrator
// ============================================================================
//
// Cart -> pending Order -> payment session. The cart is left alone here; it
// is cleared when the gateway confirms payment (see webhook.rs).
//
// Stock is reserved and the coupon redeemed before the order row is written.
// If any of those steps fails, the ones already taken are undone. Once the
// order exists, a failure to open its payment session cancels it, which
// returns the stock and the coupon redemption so the user can retry.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub user_id: Uuid,
    pub shipping_address_id: Uuid,
    pub payment_method: PaymentMethod,
    pub coupon_code: Option<String>,
    pub charges: OrderCharges,
}

/// Where the caller should be redirected to pay.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CheckoutRedirect {
    pub order_id: Uuid,
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
    /// Storefront origin used for the success and cancel URLs
    pub base_url: String,
    /// ISO currency code passed to the gateway
    pub currency: String,
}

#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("{0}")]
    CouponRejected(CouponRejection),

    #[error("Amount {0} cannot be expressed in minor units")]
    AmountOverflow(Decimal),

    #[error("Payment session for order {order_id} failed: {source}")]
    Gateway {
        order_id: Uuid,
        #[source]
        source: PaymentGatewayError,
    },

    #[error(transparent)]
    Cart(#[from] CartError),

    #[error(transparent)]
    Address(#[from] AddressError),

    #[error(transparent)]
    Coupon(#[from] CouponError),

    #[error(transparent)]
    Inventory(#[from] InventoryError),

    #[error(transparent)]
    Order(#[from] OrderError),
}

impl Classify for CheckoutError {
    fn kind(&self) -> ErrorKind {
        match self {
            CheckoutError::EmptyCart | CheckoutError::AmountOverflow(_) => ErrorKind::Validation,
            CheckoutError::CouponRejected(rejection) => CouponError::Rejected(*rejection).kind(),
            CheckoutError::Gateway { source, .. } => source.kind(),
            CheckoutError::Cart(e) => e.kind(),
            CheckoutError::Address(e) => e.kind(),
            CheckoutError::Coupon(e) => e.kind(),
            CheckoutError::Inventory(e) => e.kind(),
            CheckoutError::Order(e) => e.kind(),
        }
    }
}

/// Steps already taken for an order that has not been persisted yet.
#[derive(Default)]
struct Holds {
    reserved: Vec<(Uuid, u32)>,
    coupon_id: Option<Uuid>,
}

pub struct CheckoutOrchestrator {
    carts: CartService,
    addresses: AddressService,
    coupons: CouponEngine,
    inventory: InventoryLedger,
    orders: OrderService,
    gateway: Arc<dyn PaymentGateway>,
    metrics: Arc<Metrics>,
    settings: CheckoutSettings,
}

impl CheckoutOrchestrator {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        carts: CartService,
        addresses: AddressService,
        coupons: CouponEngine,
        inventory: InventoryLedger,
        orders: OrderService,
        gateway: Arc<dyn PaymentGateway>,
        metrics: Arc<Metrics>,
        settings: CheckoutSettings,
    ) -> Self {
        Self {
            carts,
            addresses,
            coupons,
            inventory,
            orders,
            gateway,
            metrics,
            settings,
        }
    }

    /// Turn the user's cart into a persisted, pending order.
    pub async fn create_order(&self, command: CreateOrder) -> Result<Order, CheckoutError> {
        let user_id = command.user_id;

        let cart = self.carts.get_cart(user_id).await?;
        if cart.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        self.addresses
            .get_address(command.shipping_address_id, user_id)
            .await?;

        let items = snapshot_items(&cart);
        let subtotal = round_currency(cart.subtotal());

        let (discount_amount, coupon) = match command.coupon_code.as_deref() {
            Some(code) => match self.coupons.validate(code, subtotal, Some(user_id)).await? {
                CouponValidation::Valid {
                    coupon_id,
                    code,
                    discount_amount,
                } => (discount_amount, Some((coupon_id, code))),
                CouponValidation::Invalid(rejection) => {
                    tracing::info!(
                        user_id = %user_id,
                        code = %code,
                        reason = %rejection,
                        "Coupon rejected at checkout"
                    );
                    return Err(CheckoutError::CouponRejected(rejection));
                }
            },
            None => (Decimal::ZERO, None),
        };

        let charges = command.charges;
        let total_amount =
            round_currency(subtotal - discount_amount + charges.tax + charges.shipping_cost);

        let order = Order::place(NewOrder {
            user_id,
            items,
            subtotal,
            discount_amount,
            coupon_code: coupon.as_ref().map(|(_, code)| code.clone()),
            coupon_id: coupon.as_ref().map(|(id, _)| *id),
            charges,
            total_amount,
            shipping_address_id: command.shipping_address_id,
            payment_method: command.payment_method,
        })?;

        let mut holds = Holds::default();

        if let Err(e) = self.reserve_stock(&order, &mut holds).await {
            self.compensate(&order, holds).await;
            return Err(e);
        }

        if let Some((coupon_id, _)) = &coupon {
            if let Err(e) = self.coupons.redeem(*coupon_id, user_id, order.id()).await {
                self.compensate(&order, holds).await;
                return Err(match e {
                    CouponError::Rejected(rejection) => CheckoutError::CouponRejected(rejection),
                    other => CheckoutError::Coupon(other),
                });
            }
            holds.coupon_id = Some(*coupon_id);
        }

        let order = match self.orders.place_order(order.clone()).await {
            Ok(order) => order,
            Err(e) => {
                self.compensate(&order, holds).await;
                return Err(e.into());
            }
        };

        self.metrics.record_order_created();
        Ok(order)
    }

    /// Create the pending order and open a gateway session for it.
    pub async fn create_checkout_session(
        &self,
        email: &str,
        command: CreateOrder,
    ) -> Result<CheckoutRedirect, CheckoutError> {
        if self.carts.get_cart(command.user_id).await?.is_empty() {
            self.metrics.record_checkout_session("rejected");
            return Err(CheckoutError::EmptyCart);
        }

        let order = match self.create_order(command).await {
            Ok(order) => order,
            Err(e) => {
                self.metrics.record_checkout_session("rejected");
                return Err(e);
            }
        };
        let order_id = order.id();

        let request = match self.session_request(&order, email) {
            Ok(request) => request,
            Err(e) => {
                self.metrics.record_checkout_session("rejected");
                self.abandon(order_id).await;
                return Err(e);
            }
        };

        let session = match self.gateway.create_checkout_session(request).await {
            Ok(session) => session,
            Err(source) => {
                self.metrics.record_checkout_session("gateway_error");
                tracing::error!(
                    order_id = %order_id,
                    error = %source,
                    "Payment session failed"
                );
                self.abandon(order_id).await;
                return Err(CheckoutError::Gateway { order_id, source });
            }
        };

        if let Err(e) = self
            .orders
            .open_payment(order_id, &session.session_id, Some(email.to_string()))
            .await
        {
            self.metrics.record_checkout_session("gateway_error");
            self.abandon(order_id).await;
            return Err(e.into());
        }

        self.metrics.record_checkout_session("created");
        tracing::info!(
            order_id = %order_id,
            session_id = %session.session_id,
            "Checkout session created"
        );

        Ok(CheckoutRedirect {
            order_id,
            session_id: session.session_id,
            url: session.url,
        })
    }

    async fn reserve_stock(&self, order: &Order, holds: &mut Holds) -> Result<(), CheckoutError> {
        let reason = format!("Order {}", order.order_number());

        for item in order.items() {
            let Some(variant_id) = item.variant_id else {
                continue;
            };

            match self
                .inventory
                .reserve(variant_id, item.quantity, Some(reason.clone()), order.user_id())
                .await
            {
                Ok(_) => {
                    self.metrics.record_stock_reservation(true);
                    holds.reserved.push((variant_id, item.quantity));
                }
                Err(e) => {
                    self.metrics.record_stock_reservation(false);
                    return Err(e.into());
                }
            }
        }

        Ok(())
    }

    /// Undo reservations and redemption for an order that will not be
    /// persisted. Failures here are logged; the original error wins.
    async fn compensate(&self, order: &Order, holds: Holds) {
        let reason = format!("Checkout aborted for {}", order.order_number());

        for (variant_id, quantity) in holds.reserved {
            if let Err(e) = self
                .inventory
                .release(variant_id, quantity, Some(reason.clone()), order.user_id())
                .await
            {
                tracing::error!(
                    order_id = %order.id(),
                    variant_id = %variant_id,
                    error = %e,
                    "Failed to release reserved stock"
                );
            }
        }

        if let Some(coupon_id) = holds.coupon_id {
            if let Err(e) = self.coupons.release(coupon_id, order.id()).await {
                tracing::error!(
                    order_id = %order.id(),
                    coupon_id = %coupon_id,
                    error = %e,
                    "Failed to release coupon redemption"
                );
            }
        }

        tracing::warn!(order_id = %order.id(), user_id = %order.user_id(), "Checkout compensated");
    }

    /// Cancel a pending order whose payment session never opened. The
    /// cancellation restocks its items and releases its coupon.
    async fn abandon(&self, order_id: Uuid) {
        match self.orders.update_status(order_id, OrderStatus::Cancelled).await {
            Ok(_) => tracing::warn!(order_id = %order_id, "Pending order cancelled after checkout failure"),
            Err(e) => tracing::error!(
                order_id = %order_id,
                error = %e,
                "Failed to cancel order after checkout failure"
            ),
        }
    }

    fn session_request(&self, order: &Order, email: &str) -> Result<CheckoutSessionRequest, CheckoutError> {
        let minor = |amount: Decimal| to_minor_units(amount).ok_or(CheckoutError::AmountOverflow(amount));

        let mut line_items = order
            .items()
            .iter()
            .map(|item| -> Result<LineItem, CheckoutError> {
                Ok(LineItem {
                    name: item.product_name.clone(),
                    unit_amount_minor_units: minor(item.price)?,
                    quantity: item.quantity,
                    image_url: None,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for (name, amount) in [("Shipping", order.shipping_cost()), ("Tax", order.tax())] {
            if amount > Decimal::ZERO {
                line_items.push(LineItem {
                    name: name.to_string(),
                    unit_amount_minor_units: minor(amount)?,
                    quantity: 1,
                    image_url: None,
                });
            }
        }

        let base_url = self.settings.base_url.trim_end_matches('/');
        let metadata = HashMap::from([
            ("order_id".to_string(), order.id().to_string()),
            ("user_id".to_string(), order.user_id().to_string()),
            ("order_number".to_string(), order.order_number()),
        ]);

        Ok(CheckoutSessionRequest {
            order_id: order.id(),
            line_items,
            customer_email: Some(email.to_string()),
            success_url: format!("{}/orders/{}?checkout=success", base_url, order.id()),
            cancel_url: format!("{}/cart?checkout=cancelled", base_url),
            metadata,
            discount_minor_units: minor(order.discount_amount())?,
            currency: self.settings.currency.clone(),
        })
    }
}

/// Price snapshot of every cart line at its current cart price.
fn snapshot_items(cart: &Cart) -> Vec<OrderItem> {
    cart.items
        .iter()
        .map(|item| OrderItem {
            product_id: item.product_id,
            variant_id: item.variant_id,
            product_name: item.product_name.clone(),
            quantity: item.quantity,
            price: item.unit_price,
        })
        .collect()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::payment::{CheckoutSession, MockPaymentGateway};
    use crate::domain::address::AddressInput;
    use crate::domain::cart::ProductListing;
    use crate::domain::coupon::{Coupon, DiscountType};
    use crate::domain::inventory::{ChangeType, Variant};
    use crate::domain::order::PaymentStatus;
    use crate::store::InMemoryStore;

    struct Product {
        product_id: Uuid,
        variant_id: Uuid,
    }

    struct Fixture {
        store: InMemoryStore,
        carts: CartService,
        coupons: CouponEngine,
        inventory: InventoryLedger,
        orders: OrderService,
        addresses: AddressService,
        metrics: Arc<Metrics>,
        user_id: Uuid,
        address_id: Uuid,
    }

    impl Fixture {
        async fn new() -> Self {
            let store = InMemoryStore::new();
            let shared = Arc::new(store.clone());
            let inventory = InventoryLedger::new(shared.clone());
            let carts = CartService::new(shared.clone(), shared.clone(), inventory.clone());
            let coupons = CouponEngine::new(shared.clone());
            let orders = OrderService::new(shared.clone(), inventory.clone(), coupons.clone());
            let addresses = AddressService::new(shared);

            let user_id = Uuid::new_v4();
            let address = addresses
                .add_address(
                    user_id,
                    AddressInput {
                        recipient: "Grace Hopper".to_string(),
                        line1: "1 Navy Way".to_string(),
                        city: "Arlington".to_string(),
                        region: "VA".to_string(),
                        postal_code: "22202".to_string(),
                        country: "US".to_string(),
                        ..AddressInput::default()
                    },
                )
                .await
                .unwrap();

            Self {
                store,
                carts,
                coupons,
                inventory,
                orders,
                addresses,
                metrics: Arc::new(Metrics::new().unwrap()),
                user_id,
                address_id: address.id,
            }
        }

        async fn product(&self, name: &str, price: Decimal, stock: u32) -> Product {
            let product_id = Uuid::new_v4();
            let variant = Variant::new(product_id, name.to_uppercase(), stock);
            let variant_id = variant.id;
            self.store.seed_variant(variant).await;
            self.store
                .seed_product(ProductListing {
                    product_id,
                    variant_id: Some(variant_id),
                    name: name.to_string(),
                    price,
                    image_url: None,
                })
                .await;
            Product {
                product_id,
                variant_id,
            }
        }

        fn orchestrator(&self, gateway: MockPaymentGateway) -> CheckoutOrchestrator {
            CheckoutOrchestrator::new(
                self.carts.clone(),
                self.addresses.clone(),
                self.coupons.clone(),
                self.inventory.clone(),
                self.orders.clone(),
                Arc::new(gateway),
                self.metrics.clone(),
                CheckoutSettings {
                    base_url: "https://shop.example/".to_string(),
                    currency: "usd".to_string(),
                },
            )
        }

        fn command(&self, coupon_code: Option<&str>, charges: OrderCharges) -> CreateOrder {
            CreateOrder {
                user_id: self.user_id,
                shipping_address_id: self.address_id,
                payment_method: PaymentMethod::Card,
                coupon_code: coupon_code.map(str::to_string),
                charges,
            }
        }
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let fx = Fixture::new().await;
        let checkout = fx.orchestrator(MockPaymentGateway::new());

        let result = checkout.create_order(fx.command(None, OrderCharges::default())).await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
        assert!(fx.orders.list_orders(fx.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_create_order_snapshots_cart_and_reserves_stock() {
        let fx = Fixture::new().await;
        let lamp = fx.product("Lamp", Decimal::new(4000, 2), 10).await;
        let bulb = fx.product("Bulb", Decimal::new(250, 2), 50).await;
        fx.carts.add_item(fx.user_id, lamp.product_id, 2).await.unwrap();
        fx.carts.add_item(fx.user_id, bulb.product_id, 4).await.unwrap();
        let checkout = fx.orchestrator(MockPaymentGateway::new());

        let charges = OrderCharges {
            tax: Decimal::new(720, 2),
            shipping_cost: Decimal::new(599, 2),
        };
        let order = checkout.create_order(fx.command(None, charges)).await.unwrap();

        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(order.items().len(), 2);
        assert_eq!(order.subtotal(), Decimal::new(9000, 2));
        assert_eq!(order.total_amount(), Decimal::new(10319, 2));
        assert_eq!(fx.inventory.stock_level(lamp.variant_id).await.unwrap(), 8);
        assert_eq!(fx.inventory.stock_level(bulb.variant_id).await.unwrap(), 46);

        // Cart survives until payment is confirmed.
        assert_eq!(fx.carts.get_cart(fx.user_id).await.unwrap().items.len(), 2);
        assert_eq!(fx.metrics.orders_created.get(), 1);
    }

    #[tokio::test]
    async fn test_coupon_discount_is_applied_and_redeemed() {
        let fx = Fixture::new().await;
        let desk = fx.product("Desk", Decimal::new(10000, 2), 5).await;
        fx.carts.add_item(fx.user_id, desk.product_id, 1).await.unwrap();

        let mut coupon = Coupon::new("SUMMER20", DiscountType::Percentage, Decimal::new(20, 0));
        coupon.max_discount_amount = Some(Decimal::new(15, 0));
        let coupon = fx.coupons.save_coupon(coupon).await.unwrap();
        let checkout = fx.orchestrator(MockPaymentGateway::new());

        let order = checkout
            .create_order(fx.command(Some("summer20"), OrderCharges::default()))
            .await
            .unwrap();

        assert_eq!(order.discount_amount(), Decimal::new(15, 0));
        assert_eq!(order.total_amount(), Decimal::new(8500, 2));
        assert_eq!(order.coupon_code(), Some("SUMMER20"));
        assert_eq!(fx.coupons.find_coupon(coupon.id).await.unwrap().usage_count, 1);
    }

    #[tokio::test]
    async fn test_invalid_coupon_aborts_before_reserving() {
        let fx = Fixture::new().await;
        let desk = fx.product("Desk", Decimal::new(10000, 2), 5).await;
        fx.carts.add_item(fx.user_id, desk.product_id, 1).await.unwrap();
        let checkout = fx.orchestrator(MockPaymentGateway::new());

        let result = checkout
            .create_order(fx.command(Some("NOPE"), OrderCharges::default()))
            .await;

        assert!(matches!(
            result,
            Err(CheckoutError::CouponRejected(CouponRejection::InvalidCode))
        ));
        assert_eq!(fx.inventory.stock_level(desk.variant_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_failed_reservation_releases_earlier_ones() {
        let fx = Fixture::new().await;
        let chair = fx.product("Chair", Decimal::new(6000, 2), 10).await;
        let rug = fx.product("Rug", Decimal::new(8000, 2), 5).await;
        fx.carts.add_item(fx.user_id, chair.product_id, 2).await.unwrap();
        fx.carts.add_item(fx.user_id, rug.product_id, 3).await.unwrap();

        // Someone else bought most of the rugs after they were carted.
        fx.inventory
            .adjust_stock(rug.variant_id, 1, ChangeType::Sale, None, Uuid::new_v4())
            .await
            .unwrap();

        let checkout = fx.orchestrator(MockPaymentGateway::new());
        let result = checkout.create_order(fx.command(None, OrderCharges::default())).await;

        assert!(matches!(
            result,
            Err(CheckoutError::Inventory(InventoryError::InsufficientStock { .. }))
        ));
        assert_eq!(fx.inventory.stock_level(chair.variant_id).await.unwrap(), 10);
        assert_eq!(fx.inventory.stock_level(rug.variant_id).await.unwrap(), 1);
        assert!(fx.orders.list_orders(fx.user_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_foreign_shipping_address_is_forbidden() {
        let fx = Fixture::new().await;
        let lamp = fx.product("Lamp", Decimal::new(4000, 2), 10).await;
        fx.carts.add_item(fx.user_id, lamp.product_id, 1).await.unwrap();

        let stranger_address = fx
            .addresses
            .add_address(
                Uuid::new_v4(),
                AddressInput {
                    recipient: "Someone Else".to_string(),
                    line1: "2 Elm St".to_string(),
                    city: "Springfield".to_string(),
                    postal_code: "00000".to_string(),
                    country: "US".to_string(),
                    ..AddressInput::default()
                },
            )
            .await
            .unwrap();

        let mut command = fx.command(None, OrderCharges::default());
        command.shipping_address_id = stranger_address.id;

        let checkout = fx.orchestrator(MockPaymentGateway::new());
        let result = checkout.create_order(command).await;

        assert!(matches!(result, Err(CheckoutError::Address(AddressError::Forbidden))));
    }

    #[tokio::test]
    async fn test_checkout_session_uses_minor_units_and_moves_to_processing() {
        let fx = Fixture::new().await;
        let lamp = fx.product("Lamp", Decimal::new(3999, 2), 10).await;
        fx.carts.add_item(fx.user_id, lamp.product_id, 2).await.unwrap();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_checkout_session()
            .withf(|request| {
                request.line_items.len() == 2
                    && request.line_items[0].unit_amount_minor_units == 3999
                    && request.line_items[0].quantity == 2
                    && request.line_items[1].name == "Shipping"
                    && request.line_items[1].unit_amount_minor_units == 500
                    && request.discount_minor_units == 0
                    && request.customer_email.as_deref() == Some("grace@example.com")
            })
            .times(1)
            .returning(|_| {
                Ok(CheckoutSession {
                    session_id: "cs_test_abc".to_string(),
                    url: "https://pay.example/cs_test_abc".to_string(),
                })
            });

        let checkout = fx.orchestrator(gateway);
        let charges = OrderCharges {
            tax: Decimal::ZERO,
            shipping_cost: Decimal::new(500, 2),
        };
        let redirect = checkout
            .create_checkout_session("grace@example.com", fx.command(None, charges))
            .await
            .unwrap();

        assert_eq!(redirect.session_id, "cs_test_abc");
        let order = fx.orders.get_order(redirect.order_id, fx.user_id).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Processing);

        let payment = fx.orders.payment_for_session("cs_test_abc").await.unwrap().unwrap();
        assert_eq!(payment.order_id, redirect.order_id);
        assert_eq!(payment.status, PaymentStatus::Pending);
        assert_eq!(payment.customer_email.as_deref(), Some("grace@example.com"));
    }

    #[tokio::test]
    async fn test_gateway_failure_cancels_order_and_releases_stock() {
        let fx = Fixture::new().await;
        let lamp = fx.product("Lamp", Decimal::new(4000, 2), 10).await;
        fx.carts.add_item(fx.user_id, lamp.product_id, 1).await.unwrap();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_checkout_session()
            .returning(|_| Err(PaymentGatewayError::Unavailable("503".to_string())));

        let checkout = fx.orchestrator(gateway);
        let error = checkout
            .create_checkout_session("grace@example.com", fx.command(None, OrderCharges::default()))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::External);
        assert!(error.user_message().contains("try again"));

        let orders = fx.orders.list_orders(fx.user_id).await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].status(), OrderStatus::Cancelled);
        assert_eq!(fx.inventory.stock_level(lamp.variant_id).await.unwrap(), 10);
        assert_eq!(fx.carts.get_cart(fx.user_id).await.unwrap().items.len(), 1);
    }

    #[tokio::test]
    async fn test_checkout_can_be_retried_after_gateway_failure() {
        let fx = Fixture::new().await;
        let kettle = fx.product("Kettle", Decimal::new(3000, 2), 3).await;
        fx.carts.add_item(fx.user_id, kettle.product_id, 2).await.unwrap();

        let mut coupon = Coupon::new("ONCE", DiscountType::Fixed, Decimal::new(5, 0));
        coupon.per_user_limit = Some(1);
        let coupon = fx.coupons.save_coupon(coupon).await.unwrap();

        let mut sequence = mockall::Sequence::new();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_create_checkout_session()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| Err(PaymentGatewayError::Unavailable("503".to_string())));
        gateway
            .expect_create_checkout_session()
            .times(1)
            .in_sequence(&mut sequence)
            .returning(|_| {
                Ok(CheckoutSession {
                    session_id: "cs_test_retry".to_string(),
                    url: "https://pay.example/cs_test_retry".to_string(),
                })
            });
        let checkout = fx.orchestrator(gateway);

        let first = checkout
            .create_checkout_session("grace@example.com", fx.command(Some("ONCE"), OrderCharges::default()))
            .await;
        assert!(matches!(first, Err(CheckoutError::Gateway { .. })));
        assert_eq!(fx.inventory.stock_level(kettle.variant_id).await.unwrap(), 3);
        assert_eq!(fx.coupons.find_coupon(coupon.id).await.unwrap().usage_count, 0);

        let redirect = checkout
            .create_checkout_session("grace@example.com", fx.command(Some("ONCE"), OrderCharges::default()))
            .await
            .unwrap();

        assert_eq!(redirect.session_id, "cs_test_retry");
        assert_eq!(fx.inventory.stock_level(kettle.variant_id).await.unwrap(), 1);
        assert_eq!(fx.coupons.find_coupon(coupon.id).await.unwrap().usage_count, 1);

        let orders = fx.orders.list_orders(fx.user_id).await.unwrap();
        assert_eq!(orders.len(), 2);
        let cancelled = orders
            .iter()
            .filter(|order| order.status() == OrderStatus::Cancelled)
            .count();
        assert_eq!(cancelled, 1);
        let live = fx.orders.get_order(redirect.order_id, fx.user_id).await.unwrap();
        assert_eq!(live.status(), OrderStatus::Processing);
        assert_eq!(live.coupon_id(), Some(coupon.id));
    }

    #[tokio::test]
    async fn test_checkout_session_with_empty_cart_never_calls_gateway() {
        let fx = Fixture::new().await;
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_create_checkout_session().never();

        let checkout = fx.orchestrator(gateway);
        let result = checkout
            .create_checkout_session("grace@example.com", fx.command(None, OrderCharges::default()))
            .await;

        assert!(matches!(result, Err(CheckoutError::EmptyCart)));
    }
}
