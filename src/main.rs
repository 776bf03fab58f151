use rust_decimal::Decimal;
use serde_json::json;
use std::sync::Arc;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};
use uuid::Uuid;

use storefront_core::checkout::{
    CheckoutOrchestrator, CreateOrder, LoggingNotifier, ResilientGateway, SimulatedGateway,
    WebhookEvent, WebhookHandler,
};
use storefront_core::config::StorefrontConfig;
use storefront_core::domain::address::{AddressInput, AddressService};
use storefront_core::domain::cart::{CartService, ProductListing};
use storefront_core::domain::coupon::{Coupon, CouponEngine, DiscountType};
use storefront_core::domain::inventory::{InventoryLedger, Variant};
use storefront_core::domain::order::{OrderService, PaymentMethod};
use storefront_core::errors::Classify;
use storefront_core::metrics::{self, Metrics};
use storefront_core::store::InMemoryStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Default to INFO level, overridable with RUST_LOG
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,storefront_core=debug")),
        )
        .init();

    tracing::info!("🚀 Starting storefront core demo");

    let config = StorefrontConfig::from_env()?;
    tracing::info!(base_url = %config.base_url, currency = %config.currency, "Configuration loaded");

    // === 1. Metrics ===
    let metrics = Arc::new(Metrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let metrics_registry = Arc::new(metrics.registry().clone());
    let metrics_port = config.metrics_port;
    std::thread::spawn(move || {
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(metrics::start_metrics_server(metrics_registry, metrics_port)) {
            tracing::error!(error = %e, "Metrics server error");
        }
    });

    // === 2. Wiring ===
    let store = InMemoryStore::new();
    let shared = Arc::new(store.clone());

    let inventory = InventoryLedger::new(shared.clone());
    let carts = CartService::new(shared.clone(), shared.clone(), inventory.clone());
    let coupons = CouponEngine::new(shared.clone());
    let orders = OrderService::new(shared.clone(), inventory.clone(), coupons.clone());
    let addresses = AddressService::new(shared.clone());

    let gateway = Arc::new(ResilientGateway::new(
        Arc::new(SimulatedGateway::new(format!("{}/checkout", config.base_url))),
        config.circuit_breaker(),
        config.retry(),
        metrics.clone(),
    ));

    let checkout = CheckoutOrchestrator::new(
        carts.clone(),
        addresses.clone(),
        coupons.clone(),
        inventory.clone(),
        orders.clone(),
        gateway,
        metrics.clone(),
        config.checkout_settings(),
    );

    let webhooks = WebhookHandler::new(
        orders.clone(),
        carts.clone(),
        addresses.clone(),
        Arc::new(LoggingNotifier),
        shared,
        metrics.clone(),
    );

    // === 3. Catalog ===
    let cup = seed_product(&store, "Espresso Cup", Decimal::new(1250, 2), Some(40)).await;
    let kettle = seed_product(&store, "Pour-over Kettle", Decimal::new(5400, 2), Some(5)).await;
    let gift_card = seed_product(&store, "Gift Card", Decimal::new(2500, 2), None).await;

    let mut welcome = Coupon::new("WELCOME10", DiscountType::Percentage, Decimal::new(10, 0));
    welcome.per_user_limit = Some(1);
    coupons.save_coupon(welcome).await?;

    // === 4. Shopper ===
    let user_id = Uuid::new_v4();
    let address = addresses
        .add_address(
            user_id,
            AddressInput {
                recipient: "Ada Lovelace".to_string(),
                line1: "12 St James's Square".to_string(),
                city: "London".to_string(),
                postal_code: "SW1Y 4JH".to_string(),
                country: "GB".to_string(),
                ..AddressInput::default()
            },
        )
        .await?;

    carts.add_item(user_id, cup, 4).await?;
    carts.add_item(user_id, kettle, 1).await?;
    let update = carts.add_item(user_id, gift_card, 1).await?;
    tracing::info!(
        subtotal = %update.totals.subtotal,
        items = update.totals.item_count,
        "🛒 Cart ready"
    );

    // === 5. Checkout ===
    let command = CreateOrder {
        user_id,
        shipping_address_id: address.id,
        payment_method: PaymentMethod::Card,
        coupon_code: Some("welcome10".to_string()),
        charges: config.charges_for(update.totals.subtotal),
    };

    let redirect = match checkout.create_checkout_session("ada@example.com", command).await {
        Ok(redirect) => redirect,
        Err(e) => {
            tracing::error!(kind = e.kind().as_str(), error = %e, "Checkout failed");
            anyhow::bail!(e.user_message());
        }
    };
    tracing::info!(order_id = %redirect.order_id, url = %redirect.url, "💳 Redirecting to payment");

    // === 6. Gateway callbacks ===
    let completed = WebhookEvent {
        id: format!("evt_{}", Uuid::new_v4().simple()),
        event_type: "checkout.session.completed".to_string(),
        data: json!({
            "object": {
                "id": redirect.session_id,
                "metadata": { "order_id": redirect.order_id.to_string() }
            }
        }),
    };
    let stray = WebhookEvent {
        id: format!("evt_{}", Uuid::new_v4().simple()),
        event_type: "checkout.session.completed".to_string(),
        data: json!({ "object": { "id": "cs_unknown" } }),
    };

    // The gateway delivers the completion twice.
    let outcomes = webhooks
        .handle_all(vec![completed.clone(), stray, completed])
        .await;
    for outcome in &outcomes {
        tracing::info!(outcome = ?outcome, "Webhook handled");
    }

    let order = orders.get_order(redirect.order_id, user_id).await?;
    tracing::info!(
        order_number = %order.order_number(),
        status = %order.status(),
        total = %order.total_amount(),
        "✅ Order paid"
    );

    let stats = webhooks.dead_letter_stats().await?;
    tracing::info!(total = stats.total, by_type = ?stats.by_event_type, "💀 Dead letters");

    for variant in inventory.low_stock(5).await? {
        tracing::warn!(variant_id = %variant.id, sku = %variant.sku, stock = variant.stock, "Low stock");
    }

    tracing::info!("🎉 Demo complete, metrics on :{} until Ctrl+C", metrics_port);
    tokio::signal::ctrl_c().await?;

    Ok(())
}

/// Register a product, tracked when `stock` is given. Returns the product id.
async fn seed_product(store: &InMemoryStore, name: &str, price: Decimal, stock: Option<u32>) -> Uuid {
    let product_id = Uuid::new_v4();

    let variant_id = match stock {
        Some(stock) => {
            let variant = Variant::new(product_id, name.to_uppercase().replace(' ', "-"), stock);
            let variant_id = variant.id;
            store.seed_variant(variant).await;
            Some(variant_id)
        }
        None => None,
    };

    store
        .seed_product(ProductListing {
            product_id,
            variant_id,
            name: name.to_string(),
            price,
            image_url: None,
        })
        .await;

    product_id
}
