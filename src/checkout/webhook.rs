use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::address::AddressService;
use crate::domain::cart::{CartError, CartService};
use crate::domain::order::{Order, OrderError, OrderService};
use crate::errors::{Classify, ErrorKind, RepositoryError};
use crate::metrics::Metrics;
use super::notifier::{EmailNotifier, OrderConfirmation};

// ============================================================================
// Payment Webhooks
// ============================================================================
//
// Events arrive already verified. Each one is handled on its own: a failure
// is logged, written to the dead-letter store and counted, and the next event
// is processed as usual.
//
// Redelivery is harmless. The post-payment steps are claimed on the payment
// record, so they run once per payment. If clearing the cart fails, the claim
// is released and the dead-lettered event finishes the job when replayed.
//
// ============================================================================

pub const SESSION_COMPLETED: &str = "checkout.session.completed";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

/// Gateway event envelope. The gateway object sits under `data.object`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    #[serde(default)]
    pub data: Value,
}

impl WebhookEvent {
    pub fn parse(payload: &[u8]) -> Result<Self, WebhookError> {
        Ok(serde_json::from_slice(payload)?)
    }

    fn object(&self) -> &Value {
        &self.data["object"]
    }

    fn metadata(&self, key: &str) -> Option<&str> {
        self.object()["metadata"][key].as_str()
    }

    fn session_id(&self) -> Option<&str> {
        self.object()["id"].as_str()
    }

    fn customer_email(&self) -> Option<String> {
        let object = self.object();
        object["customer_email"]
            .as_str()
            .or_else(|| object["customer_details"]["email"].as_str())
            .map(str::to_string)
    }

    /// Order id from the metadata, if present and well formed.
    pub fn order_id(&self) -> Option<Uuid> {
        self.metadata("order_id")
            .and_then(|raw| Uuid::parse_str(raw).ok())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// The order is paid and its cart was cleared in this call.
    PaymentConfirmed { order_id: Uuid },
    /// Redelivered completion for an order already paid and fulfilled.
    AlreadyProcessed { order_id: Uuid },
    /// Failure recorded; `None` when the event carried no order reference.
    PaymentFailed { order_id: Option<Uuid> },
    Ignored,
    DeadLettered { dead_letter_id: Uuid },
}

impl WebhookOutcome {
    fn label(&self) -> &'static str {
        match self {
            WebhookOutcome::PaymentConfirmed { .. } => "processed",
            WebhookOutcome::AlreadyProcessed { .. } => "duplicate",
            WebhookOutcome::PaymentFailed { .. } => "processed",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::DeadLettered { .. } => "failed",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WebhookError {
    #[error("Malformed webhook payload: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("Event carries neither an order id nor a session id")]
    MissingOrderReference,

    #[error("Invalid order id in metadata: {0}")]
    InvalidOrderId(String),

    #[error("No payment found for session {0}")]
    UnknownSession(String),

    #[error(transparent)]
    Order(#[from] OrderError),

    #[error(transparent)]
    Cart(#[from] CartError),
}

impl Classify for WebhookError {
    fn kind(&self) -> ErrorKind {
        match self {
            WebhookError::Payload(_)
            | WebhookError::MissingOrderReference
            | WebhookError::InvalidOrderId(_) => ErrorKind::Validation,
            WebhookError::UnknownSession(_) => ErrorKind::NotFound,
            WebhookError::Order(e) => e.kind(),
            WebhookError::Cart(e) => e.kind(),
        }
    }
}

// ============================================================================
// Dead Letters
// ============================================================================

/// A webhook event that could not be processed, kept for manual replay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
    pub id: Uuid,
    pub event_id: String,
    pub event_type: String,
    pub order_id: Option<Uuid>,
    /// The whole event, so it can be replayed as-is
    pub payload: Value,
    pub error_message: String,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DeadLetterStats {
    pub total: u64,
    pub by_event_type: HashMap<String, u64>,
}

#[async_trait]
pub trait DeadLetterStore: Send + Sync {
    async fn push_dead_letter(&self, letter: DeadLetter) -> Result<(), RepositoryError>;

    /// Oldest first.
    async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, RepositoryError>;

    async fn dead_letter_stats(&self) -> Result<DeadLetterStats, RepositoryError>;
}

// ============================================================================
// Handler
// ============================================================================

pub struct WebhookHandler {
    orders: OrderService,
    carts: CartService,
    addresses: AddressService,
    notifier: Arc<dyn EmailNotifier>,
    dead_letters: Arc<dyn DeadLetterStore>,
    metrics: Arc<Metrics>,
}

impl WebhookHandler {
    pub fn new(
        orders: OrderService,
        carts: CartService,
        addresses: AddressService,
        notifier: Arc<dyn EmailNotifier>,
        dead_letters: Arc<dyn DeadLetterStore>,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            orders,
            carts,
            addresses,
            notifier,
            dead_letters,
            metrics,
        }
    }

    /// Process one event. Never fails: errors end up in the dead-letter store.
    pub async fn handle(&self, event: WebhookEvent) -> WebhookOutcome {
        let outcome = match self.process(&event).await {
            Ok(outcome) => outcome,
            Err(e) => self.dead_letter(&event, &e).await,
        };

        self.metrics
            .record_webhook_event(&event.event_type, outcome.label());
        outcome
    }

    pub async fn handle_all(&self, events: Vec<WebhookEvent>) -> Vec<WebhookOutcome> {
        let mut outcomes = Vec::with_capacity(events.len());
        for event in events {
            outcomes.push(self.handle(event).await);
        }
        outcomes
    }

    /// Run a dead-lettered event through the handler again.
    pub async fn replay(&self, letter: &DeadLetter) -> Result<WebhookOutcome, WebhookError> {
        let event: WebhookEvent = serde_json::from_value(letter.payload.clone())?;

        tracing::info!(
            dead_letter_id = %letter.id,
            event_id = %event.id,
            event_type = %event.event_type,
            "Replaying dead-lettered webhook"
        );

        Ok(self.handle(event).await)
    }

    pub async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, RepositoryError> {
        self.dead_letters.dead_letters(limit).await
    }

    pub async fn dead_letter_stats(&self) -> Result<DeadLetterStats, RepositoryError> {
        self.dead_letters.dead_letter_stats().await
    }

    async fn process(&self, event: &WebhookEvent) -> Result<WebhookOutcome, WebhookError> {
        match event.event_type.as_str() {
            SESSION_COMPLETED => self.session_completed(event).await,
            PAYMENT_FAILED => self.payment_failed(event).await,
            other => {
                tracing::debug!(event_id = %event.id, event_type = other, "Ignoring webhook event");
                Ok(WebhookOutcome::Ignored)
            }
        }
    }

    async fn session_completed(&self, event: &WebhookEvent) -> Result<WebhookOutcome, WebhookError> {
        let order_id = self.resolve_order_id(event).await?;

        let confirmation = self.orders.confirm_payment(order_id).await?;

        // Orders confirmed without a gateway session have no record to claim.
        let fulfil = self.orders.claim_fulfilment(order_id).await?
            || (confirmation.transitioned()
                && self.orders.payment_for_order(order_id).await?.is_none());

        if !fulfil {
            tracing::info!(
                event_id = %event.id,
                order_id = %order_id,
                "Payment already confirmed, skipping"
            );
            return Ok(WebhookOutcome::AlreadyProcessed { order_id });
        }

        let order = confirmation.order();

        let cleared = match self.carts.clear_cart(order.user_id()).await {
            Ok(cleared) => cleared,
            Err(e) => {
                if let Err(release) = self.orders.release_fulfilment(order_id).await {
                    tracing::error!(order_id = %order_id, error = %release, "Failed to release fulfilment claim");
                }
                return Err(e.into());
            }
        };
        tracing::debug!(order_id = %order_id, user_id = %order.user_id(), cleared = cleared, "Cart cleared");

        self.send_confirmation(event, order).await;

        Ok(WebhookOutcome::PaymentConfirmed { order_id })
    }

    async fn payment_failed(&self, event: &WebhookEvent) -> Result<WebhookOutcome, WebhookError> {
        let order_id = match event.metadata("order_id") {
            Some(raw) => Some(
                Uuid::parse_str(raw).map_err(|_| WebhookError::InvalidOrderId(raw.to_string()))?,
            ),
            None => None,
        };

        tracing::warn!(
            event_id = %event.id,
            order_id = ?order_id,
            "Payment failed at the gateway"
        );

        if let Some(order_id) = order_id {
            if !self.orders.mark_payment_failed(order_id).await? {
                tracing::debug!(order_id = %order_id, "No payment record to mark as failed");
            }
        }

        Ok(WebhookOutcome::PaymentFailed { order_id })
    }

    async fn resolve_order_id(&self, event: &WebhookEvent) -> Result<Uuid, WebhookError> {
        if let Some(raw) = event.metadata("order_id") {
            return Uuid::parse_str(raw).map_err(|_| WebhookError::InvalidOrderId(raw.to_string()));
        }

        let session_id = event
            .session_id()
            .ok_or(WebhookError::MissingOrderReference)?;

        self.orders
            .payment_for_session(session_id)
            .await?
            .map(|payment| payment.order_id)
            .ok_or_else(|| WebhookError::UnknownSession(session_id.to_string()))
    }

    /// Best effort. A failed send is logged and never undoes the payment.
    async fn send_confirmation(&self, event: &WebhookEvent, order: &Order) {
        let recorded_email = match self.orders.payment_for_order(order.id()).await {
            Ok(payment) => payment.and_then(|p| p.customer_email),
            Err(e) => {
                tracing::warn!(order_id = %order.id(), error = %e, "Could not load payment record");
                None
            }
        };

        let Some(email) = recorded_email.or_else(|| event.customer_email()) else {
            tracing::warn!(order_id = %order.id(), "No customer email, confirmation not sent");
            return;
        };

        let address = match self
            .addresses
            .get_address(order.shipping_address_id(), order.user_id())
            .await
        {
            Ok(address) => Some(address),
            Err(e) => {
                tracing::debug!(order_id = %order.id(), error = %e, "Shipping address unavailable for email");
                None
            }
        };

        let confirmation = OrderConfirmation::for_order(order, address.as_ref());
        if let Err(e) = self
            .notifier
            .send_order_confirmation(email, confirmation)
            .await
        {
            tracing::error!(order_id = %order.id(), error = %e, "Failed to send order confirmation");
        }
    }

    async fn dead_letter(&self, event: &WebhookEvent, error: &WebhookError) -> WebhookOutcome {
        let letter = DeadLetter {
            id: Uuid::now_v7(),
            event_id: event.id.clone(),
            event_type: event.event_type.clone(),
            order_id: event.order_id(),
            payload: serde_json::to_value(event).unwrap_or_else(|_| event.data.clone()),
            error_message: error.to_string(),
            failed_at: Utc::now(),
        };
        let dead_letter_id = letter.id;

        tracing::error!(
            event_id = %event.id,
            event_type = %event.event_type,
            order_id = ?letter.order_id,
            error = %error,
            "💀 Webhook event moved to dead-letter store"
        );

        if let Err(e) = self.dead_letters.push_dead_letter(letter).await {
            tracing::error!(event_id = %event.id, error = %e, "Failed to store dead letter");
        }
        self.metrics.record_dead_letter(&event.event_type);

        WebhookOutcome::DeadLettered { dead_letter_id }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
