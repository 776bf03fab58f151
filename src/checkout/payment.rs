use async_trait::async_trait;
use mockall::automock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use uuid::Uuid;

use crate::errors::{Classify, ErrorKind};
use crate::metrics::Metrics;
use crate::utils::{
    retry_on_transient, CircuitBreaker, CircuitBreakerConfig, CircuitBreakerError, IsTransient,
    RetryConfig,
};

// ============================================================================
// Payment Gateway
// ============================================================================

/// One line on the hosted payment page. Amounts are in minor units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub name: String,
    pub unit_amount_minor_units: i64,
    pub quantity: u32,
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSessionRequest {
    pub order_id: Uuid,
    pub line_items: Vec<LineItem>,
    pub customer_email: Option<String>,
    pub success_url: String,
    pub cancel_url: String,
    pub metadata: HashMap<String, String>,
    pub discount_minor_units: i64,
    pub currency: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub session_id: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PaymentGatewayError {
    #[error("Payment gateway unavailable: {0}")]
    Unavailable(String),

    #[error("Payment gateway timed out")]
    Timeout,

    #[error("Payment gateway rate limited the request")]
    RateLimited,

    #[error("Payment gateway rejected the request: {0}")]
    Rejected(String),

    #[error("Payment gateway circuit is open")]
    CircuitOpen,
}

impl IsTransient for PaymentGatewayError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            PaymentGatewayError::Unavailable(_)
                | PaymentGatewayError::Timeout
                | PaymentGatewayError::RateLimited
        )
    }
}

impl Classify for PaymentGatewayError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::External
    }
}

#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Open a hosted checkout session for an order.
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError>;
}

// ============================================================================
// Resilient Gateway - circuit breaker + transient retry around a gateway
// ============================================================================

pub struct ResilientGateway {
    inner: Arc<dyn PaymentGateway>,
    breaker: CircuitBreaker,
    retry: RetryConfig,
    metrics: Arc<Metrics>,
}

impl ResilientGateway {
    pub fn new(
        inner: Arc<dyn PaymentGateway>,
        breaker_config: CircuitBreakerConfig,
        retry: RetryConfig,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            inner,
            breaker: CircuitBreaker::new("payment_gateway", breaker_config),
            retry,
            metrics,
        }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }
}

#[async_trait]
impl PaymentGateway for ResilientGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        const OPERATION: &str = "create_checkout_session";
        let order_id = request.order_id;

        let result = retry_on_transient(&self.retry, |attempt| {
            let inner = self.inner.clone();
            let breaker = self.breaker.clone();
            let metrics = self.metrics.clone();
            let request = request.clone();

            async move {
                metrics.record_gateway_attempt(OPERATION, attempt);
                let started = Instant::now();

                let outcome = breaker
                    .call(inner.create_checkout_session(request), |e: &PaymentGatewayError| {
                        e.is_transient()
                    })
                    .await;

                metrics.record_gateway_call(OPERATION, started.elapsed().as_secs_f64(), outcome.is_ok());

                outcome.map_err(|e| match e {
                    CircuitBreakerError::CircuitOpen(_) => PaymentGatewayError::CircuitOpen,
                    CircuitBreakerError::OperationFailed(inner) => inner,
                })
            }
        })
        .await
        .into_result();

        self.metrics
            .update_circuit_breaker_state(self.breaker.state().await);

        if let Err(e) = &result {
            tracing::error!(order_id = %order_id, error = %e, "Checkout session could not be created");
        }

        result
    }
}

// ============================================================================
// Simulated Gateway - local stand-in that always succeeds
// ============================================================================

pub struct SimulatedGateway {
    base_url: String,
}

impl SimulatedGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession, PaymentGatewayError> {
        let session_id = format!("cs_sim_{}", Uuid::new_v4().simple());

        tracing::debug!(
            order_id = %request.order_id,
            session_id = %session_id,
            lines = request.line_items.len(),
            "Simulated checkout session opened"
        );

        Ok(CheckoutSession {
            url: format!("{}/pay/{}", self.base_url.trim_end_matches('/'), session_id),
            session_id,
        })
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
