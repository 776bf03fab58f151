// ============================================================================
// Storefront Core
// ============================================================================
//
// Inventory ledger, coupon engine, cart, order state machine and the checkout
// flow that ties them to a hosted payment provider.
//
// Layout:
// - errors:   shared error taxonomy
// - domain:   one directory per aggregate
// - store:    in-memory implementation of every repository trait
// - checkout: gateway, orchestrator, webhooks, notifications
// - metrics:  Prometheus registry and /metrics server
// - config:   STOREFRONT_* environment configuration
// - utils:    circuit breaker and retry
//
// ============================================================================

pub mod errors;
pub mod domain;
pub mod store;
pub mod checkout;
pub mod metrics;
pub mod config;
pub mod utils;
