// Private module declaration
mod server;

use prometheus::{HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};

// Re-export for public API
pub use server::start_metrics_server;

use crate::utils::CircuitState;

// ============================================================================
// Metrics Module - Prometheus metrics for the storefront core
// ============================================================================
//
// Covers:
// - Orders created and checkout sessions by outcome
// - Stock reservations by outcome
// - Payment webhook events by type and outcome
// - Dead letters by event type
// - Payment gateway latency, retries and circuit breaker state
//
// Scraped via /metrics (see server.rs).
// ============================================================================

pub struct Metrics {
    registry: Registry,

    // Checkout
    pub orders_created: IntCounter,
    pub checkout_sessions: IntCounterVec,
    pub stock_reservations: IntCounterVec,

    // Webhooks
    pub webhook_events: IntCounterVec,
    pub dead_letters_total: IntCounter,
    pub dead_letters_by_event_type: IntCounterVec,

    // Payment gateway
    pub gateway_request_duration: HistogramVec,
    pub gateway_retry_attempts: IntCounterVec,
    pub circuit_breaker_state: IntGauge,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let orders_created = IntCounter::new("orders_created_total", "Total orders placed at checkout")?;
        registry.register(Box::new(orders_created.clone()))?;

        let checkout_sessions = IntCounterVec::new(
            Opts::new("checkout_sessions_total", "Checkout session attempts by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(checkout_sessions.clone()))?;

        let stock_reservations = IntCounterVec::new(
            Opts::new("stock_reservations_total", "Stock reservations by outcome"),
            &["outcome"],
        )?;
        registry.register(Box::new(stock_reservations.clone()))?;

        let webhook_events = IntCounterVec::new(
            Opts::new("webhook_events_total", "Payment webhook events by type and outcome"),
            &["event_type", "outcome"],
        )?;
        registry.register(Box::new(webhook_events.clone()))?;

        let dead_letters_total = IntCounter::new(
            "dead_letters_total",
            "Total webhook events written to the dead-letter store",
        )?;
        registry.register(Box::new(dead_letters_total.clone()))?;

        let dead_letters_by_event_type = IntCounterVec::new(
            Opts::new("dead_letters_by_event_type", "Dead letters by event type"),
            &["event_type"],
        )?;
        registry.register(Box::new(dead_letters_by_event_type.clone()))?;

        let gateway_request_duration = HistogramVec::new(
            HistogramOpts::new("gateway_request_duration_seconds", "Payment gateway call duration")
                .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]),
            &["operation", "outcome"],
        )?;
        registry.register(Box::new(gateway_request_duration.clone()))?;

        let gateway_retry_attempts = IntCounterVec::new(
            Opts::new("gateway_retry_attempts_total", "Payment gateway attempts by attempt number"),
            &["operation", "attempt"],
        )?;
        registry.register(Box::new(gateway_retry_attempts.clone()))?;

        let circuit_breaker_state = IntGauge::new(
            "gateway_circuit_breaker_state",
            "Payment gateway circuit breaker state (0=Closed, 1=HalfOpen, 2=Open)",
        )?;
        registry.register(Box::new(circuit_breaker_state.clone()))?;

        Ok(Self {
            registry,
            orders_created,
            checkout_sessions,
            stock_reservations,
            webhook_events,
            dead_letters_total,
            dead_letters_by_event_type,
            gateway_request_duration,
            gateway_retry_attempts,
            circuit_breaker_state,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_order_created(&self) {
        self.orders_created.inc();
    }

    /// `outcome` is "created", "rejected" or "gateway_error".
    pub fn record_checkout_session(&self, outcome: &str) {
        self.checkout_sessions.with_label_values(&[outcome]).inc();
    }

    pub fn record_stock_reservation(&self, success: bool) {
        let outcome = if success { "reserved" } else { "insufficient" };
        self.stock_reservations.with_label_values(&[outcome]).inc();
    }

    pub fn record_webhook_event(&self, event_type: &str, outcome: &str) {
        self.webhook_events.with_label_values(&[event_type, outcome]).inc();
    }

    pub fn record_dead_letter(&self, event_type: &str) {
        self.dead_letters_total.inc();
        self.dead_letters_by_event_type.with_label_values(&[event_type]).inc();
    }

    pub fn record_gateway_call(&self, operation: &str, duration_secs: f64, success: bool) {
        let outcome = if success { "success" } else { "failure" };
        self.gateway_request_duration
            .with_label_values(&[operation, outcome])
            .observe(duration_secs);
    }

    pub fn record_gateway_attempt(&self, operation: &str, attempt: u32) {
        self.gateway_retry_attempts
            .with_label_values(&[operation, &attempt.to_string()])
            .inc();
    }

    pub fn update_circuit_breaker_state(&self, state: CircuitState) {
        self.circuit_breaker_state.set(state.gauge_value());
    }
}
