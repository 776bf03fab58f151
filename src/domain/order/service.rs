use chrono::Utc;
use std::sync::Arc;
use uuid::Uuid;

use crate::domain::coupon::CouponEngine;
use crate::domain::inventory::InventoryLedger;
use crate::errors::RepositoryError;
use super::aggregate::Order;
use super::errors::OrderError;
use super::repository::OrderRepository;
use super::value_objects::{OrderStatus, PaymentRecord, PaymentStatus};

// ============================================================================
// Order Service - reads, admin transitions, cancellation and payment
// ============================================================================

/// Result of `confirm_payment`.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentConfirmation {
    /// The order moved to `paid` in this call.
    Confirmed(Order),
    /// Nothing to do, the order was already paid or past it.
    AlreadyPaid(Order),
}

impl PaymentConfirmation {
    pub fn order(&self) -> &Order {
        match self {
            PaymentConfirmation::Confirmed(order) | PaymentConfirmation::AlreadyPaid(order) => order,
        }
    }

    pub fn transitioned(&self) -> bool {
        matches!(self, PaymentConfirmation::Confirmed(_))
    }
}

#[derive(Clone)]
pub struct OrderService {
    orders: Arc<dyn OrderRepository>,
    inventory: InventoryLedger,
    coupons: CouponEngine,
}

impl OrderService {
    pub fn new(orders: Arc<dyn OrderRepository>, inventory: InventoryLedger, coupons: CouponEngine) -> Self {
        Self {
            orders,
            inventory,
            coupons,
        }
    }

    /// Persist a freshly placed order. Totals were checked by `Order::place`.
    pub async fn place_order(&self, order: Order) -> Result<Order, OrderError> {
        self.orders.create(order.clone()).await?;

        tracing::info!(
            order_id = %order.id(),
            order_number = %order.order_number(),
            user_id = %order.user_id(),
            total = %order.total_amount(),
            items = order.items().len(),
            "Order created"
        );

        Ok(order)
    }

    pub async fn get_order(&self, order_id: Uuid, user_id: Uuid) -> Result<Order, OrderError> {
        let order = self.load(order_id).await?;
        if !order.is_owned_by(user_id) {
            return Err(OrderError::Forbidden);
        }
        Ok(order)
    }

    pub async fn list_orders(&self, user_id: Uuid) -> Result<Vec<Order>, OrderError> {
        Ok(self.orders.find_by_user(user_id).await?)
    }

    /// Admin transition. No ownership check. Cancelling releases the
    /// order's stock and coupon, whichever path it comes through.
    pub async fn update_status(&self, order_id: Uuid, status: OrderStatus) -> Result<Order, OrderError> {
        let mut order = self.load(order_id).await?;
        let previous = order.status();

        order.transition_to(status, Utc::now())?;
        self.persist(order.clone(), previous, None).await?;

        tracing::info!(
            order_id = %order_id,
            from = %previous,
            to = %status,
            "Order status updated"
        );

        if status == OrderStatus::Cancelled {
            self.release_holds(&order, order.user_id()).await;
        }

        Ok(order)
    }

    /// Cancel on behalf of the owner, then put the items back into stock.
    pub async fn cancel_order(&self, order_id: Uuid, user_id: Uuid) -> Result<Order, OrderError> {
        let mut order = self.get_order(order_id, user_id).await?;
        let previous = order.status();

        if !order.can_cancel() {
            return Err(OrderError::InvalidStatusTransition {
                from: previous,
                to: OrderStatus::Cancelled,
            });
        }

        order.transition_to(OrderStatus::Cancelled, Utc::now())?;
        self.persist(order.clone(), previous, None).await?;
        self.release_holds(&order, user_id).await;

        tracing::info!(order_id = %order_id, user_id = %user_id, "Order cancelled");
        Ok(order)
    }

    /// Record the gateway session and move the order to `processing`.
    pub async fn open_payment(
        &self,
        order_id: Uuid,
        session_id: &str,
        customer_email: Option<String>,
    ) -> Result<Order, OrderError> {
        let mut order = self.load(order_id).await?;
        let previous = order.status();

        order.transition_to(OrderStatus::Processing, Utc::now())?;

        let payment = PaymentRecord {
            order_id,
            session_id: session_id.to_string(),
            status: PaymentStatus::Pending,
            amount: order.total_amount(),
            customer_email,
            fulfilled_at: None,
        };
        self.persist(order.clone(), previous, Some(payment)).await?;

        tracing::debug!(order_id = %order_id, session_id = session_id, "Payment session attached");
        Ok(order)
    }

    /// Mark an order paid. Safe to call any number of times.
    pub async fn confirm_payment(&self, order_id: Uuid) -> Result<PaymentConfirmation, OrderError> {
        let mut order = self.load(order_id).await?;
        let previous = order.status();

        if order.status().is_paid_or_beyond() {
            tracing::debug!(order_id = %order_id, status = %previous, "Payment already confirmed");
            return Ok(PaymentConfirmation::AlreadyPaid(order));
        }

        let now = Utc::now();
        if order.status() == OrderStatus::Pending {
            order.transition_to(OrderStatus::Processing, now)?;
        }
        order.transition_to(OrderStatus::Paid, now)?;

        let payment = self
            .orders
            .find_payment(order_id)
            .await?
            .map(|record| PaymentRecord {
                status: PaymentStatus::Completed,
                ..record
            });

        if !self
            .orders
            .save_transition(order.clone(), previous, payment)
            .await?
        {
            // Lost a race with another confirmation.
            let current = self.load(order_id).await?;
            if current.status().is_paid_or_beyond() {
                return Ok(PaymentConfirmation::AlreadyPaid(current));
            }
            return Err(OrderError::Repository(RepositoryError::Conflict(format!(
                "order {} changed during payment confirmation",
                order_id
            ))));
        }

        tracing::info!(
            order_id = %order_id,
            order_number = %order.order_number(),
            total = %order.total_amount(),
            "Payment confirmed"
        );

        Ok(PaymentConfirmation::Confirmed(order))
    }

    /// Flag the payment record as failed. The order status is left alone.
    pub async fn mark_payment_failed(&self, order_id: Uuid) -> Result<bool, OrderError> {
        Ok(self
            .orders
            .set_payment_status(order_id, PaymentStatus::Failed)
            .await?)
    }

    pub async fn payment_for_session(&self, session_id: &str) -> Result<Option<PaymentRecord>, OrderError> {
        Ok(self.orders.find_payment_by_session(session_id).await?)
    }

    pub async fn payment_for_order(&self, order_id: Uuid) -> Result<Option<PaymentRecord>, OrderError> {
        Ok(self.orders.find_payment(order_id).await?)
    }

    /// Claim the post-payment steps for a completed payment. Only one
    /// caller gets `true` until the claim is released.
    pub async fn claim_fulfilment(&self, order_id: Uuid) -> Result<bool, OrderError> {
        Ok(self.orders.claim_fulfilment(order_id, Utc::now()).await?)
    }

    pub async fn release_fulfilment(&self, order_id: Uuid) -> Result<bool, OrderError> {
        Ok(self.orders.release_fulfilment(order_id).await?)
    }

    /// Restock tracked items and give back the coupon redemption of a
    /// cancelled order. Failures are logged; the cancellation stands.
    async fn release_holds(&self, order: &Order, actor_id: Uuid) {
        let reason = format!("Order {} cancelled", order.order_number());

        for item in order.items() {
            let Some(variant_id) = item.variant_id else {
                continue;
            };

            if let Err(e) = self
                .inventory
                .release(variant_id, item.quantity, Some(reason.clone()), actor_id)
                .await
            {
                tracing::error!(
                    order_id = %order.id(),
                    variant_id = %variant_id,
                    error = %e,
                    "Failed to restock cancelled order item"
                );
            }
        }

        if let Some(coupon_id) = order.coupon_id() {
            if let Err(e) = self.coupons.release(coupon_id, order.id()).await {
                tracing::error!(
                    order_id = %order.id(),
                    coupon_id = %coupon_id,
                    error = %e,
                    "Failed to release coupon of cancelled order"
                );
            }
        }
    }

    async fn load(&self, order_id: Uuid) -> Result<Order, OrderError> {
        self.orders
            .find(order_id)
            .await?
            .ok_or(OrderError::NotFound(order_id))
    }

    async fn persist(
        &self,
        order: Order,
        expected: OrderStatus,
        payment: Option<PaymentRecord>,
    ) -> Result<(), OrderError> {
        let order_id = order.id();
        if self.orders.save_transition(order, expected, payment).await? {
            Ok(())
        } else {
            Err(OrderError::Repository(RepositoryError::Conflict(format!(
                "order {} was modified concurrently",
                order_id
            ))))
        }
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
