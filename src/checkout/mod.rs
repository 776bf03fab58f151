// ============================================================================
// Checkout - everything that talks to the payment provider
// ============================================================================
//
// - Payment gateway trait, resilient wrapper and local stand-in
// - Order confirmation emails
// - Orchestrator (cart -> pending order -> payment session)
// - Webhook handling with a dead-letter store
//
// ============================================================================

pub mod payment;
pub mod notifier;
pub mod orchestrator;
pub mod webhook;

pub use payment::{
    CheckoutSession, CheckoutSessionRequest, LineItem, PaymentGateway, PaymentGatewayError,
    ResilientGateway, SimulatedGateway,
};
pub use notifier::{EmailNotifier, LoggingNotifier, NotificationError, OrderConfirmation};
pub use orchestrator::{CheckoutError, CheckoutOrchestrator, CheckoutRedirect, CheckoutSettings, CreateOrder};
pub use webhook::{
    DeadLetter, DeadLetterStats, DeadLetterStore, WebhookError, WebhookEvent, WebhookHandler,
    WebhookOutcome,
};
