use async_trait::async_trait;
use mockall::automock;
use rust_decimal::Decimal;
use serde::Serialize;

use crate::domain::address::ShippingAddress;
use crate::domain::order::Order;

// ============================================================================
// Email Notifications
// ============================================================================
//
// Fire-and-forget: callers log a failed send and carry on. Nothing is ever
// rolled back because an email could not be delivered.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfirmationLine {
    pub product_name: String,
    pub quantity: u32,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderConfirmation {
    pub order_number: String,
    pub items: Vec<ConfirmationLine>,
    pub total: Decimal,
    pub shipping_address: Option<String>,
}

impl OrderConfirmation {
    pub fn for_order(order: &Order, shipping_address: Option<&ShippingAddress>) -> Self {
        Self {
            order_number: order.order_number(),
            items: order
                .items()
                .iter()
                .map(|item| ConfirmationLine {
                    product_name: item.product_name.clone(),
                    quantity: item.quantity,
                    price: item.price,
                })
                .collect(),
            total: order.total_amount(),
            shipping_address: shipping_address.map(ShippingAddress::one_line),
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NotificationError {
    #[error("Email delivery failed: {0}")]
    Delivery(String),

    #[error("Invalid recipient address: {0}")]
    InvalidRecipient(String),
}

#[automock]
#[async_trait]
pub trait EmailNotifier: Send + Sync {
    async fn send_order_confirmation(
        &self,
        to: String,
        confirmation: OrderConfirmation,
    ) -> Result<(), NotificationError>;
}

/// Writes confirmations to the log instead of sending them.
pub struct LoggingNotifier;

#[async_trait]
impl EmailNotifier for LoggingNotifier {
    async fn send_order_confirmation(
        &self,
        to: String,
        confirmation: OrderConfirmation,
    ) -> Result<(), NotificationError> {
        if !to.contains('@') {
            return Err(NotificationError::InvalidRecipient(to));
        }

        tracing::info!(
            to = %to,
            order_number = %confirmation.order_number,
            items = confirmation.items.len(),
            total = %confirmation.total,
            "📧 Order confirmation email"
        );
        Ok(())
    }
}
