use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::domain::money::TOTAL_TOLERANCE;
use super::errors::OrderError;
use super::value_objects::{NewOrder, OrderItem, OrderStatus, PaymentMethod};

// ============================================================================
// Order Aggregate - Domain Logic
// ============================================================================
//
// Built once through `Order::place`, which checks the totals. After that the
// only mutation is `transition_to`, which walks the status state machine.
//
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Order {
    // Identity
    id: Uuid,
    user_id: Uuid,

    // Snapshot
    items: Vec<OrderItem>,
    subtotal: Decimal,
    discount_amount: Decimal,
    coupon_code: Option<String>,
    coupon_id: Option<Uuid>,
    tax: Decimal,
    shipping_cost: Decimal,
    total_amount: Decimal,
    shipping_address_id: Uuid,
    payment_method: PaymentMethod,

    // Lifecycle
    status: OrderStatus,
    paid_at: Option<DateTime<Utc>>,
    shipped_at: Option<DateTime<Utc>>,
    delivered_at: Option<DateTime<Utc>>,

    // Audit Trail
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    /// Create a pending order and validate its totals.
    pub fn place(new: NewOrder) -> Result<Self, OrderError> {
        if new.items.is_empty() {
            return Err(OrderError::EmptyItems);
        }

        if let Some(item) = new.items.iter().find(|item| item.quantity == 0) {
            return Err(OrderError::InvalidQuantity(item.quantity));
        }

        let now = Utc::now();
        let order = Self {
            id: Uuid::now_v7(),
            user_id: new.user_id,
            items: new.items,
            subtotal: new.subtotal,
            discount_amount: new.discount_amount,
            coupon_code: new.coupon_code,
            coupon_id: new.coupon_id,
            tax: new.charges.tax,
            shipping_cost: new.charges.shipping_cost,
            total_amount: new.total_amount,
            shipping_address_id: new.shipping_address_id,
            payment_method: new.payment_method,
            status: OrderStatus::Pending,
            paid_at: None,
            shipped_at: None,
            delivered_at: None,
            created_at: now,
            updated_at: now,
        };

        order.validate_total()?;
        Ok(order)
    }

    /// `subtotal − discount + tax + shipping`, unrounded.
    pub fn expected_total(&self) -> Decimal {
        self.subtotal - self.discount_amount + self.tax + self.shipping_cost
    }

    pub fn validate_total(&self) -> Result<(), OrderError> {
        let expected = self.expected_total();
        if (self.total_amount - expected).abs() > TOTAL_TOLERANCE {
            return Err(OrderError::TotalMismatch {
                expected,
                actual: self.total_amount,
            });
        }
        Ok(())
    }

    /// Move to `next` if the state machine allows it, stamping the
    /// paid/shipped/delivered timestamps on the way.
    pub fn transition_to(&mut self, next: OrderStatus, at: DateTime<Utc>) -> Result<(), OrderError> {
        if !self.status.can_transition_to(next) {
            return Err(OrderError::InvalidStatusTransition {
                from: self.status,
                to: next,
            });
        }

        match next {
            OrderStatus::Paid => self.paid_at = Some(at),
            OrderStatus::Shipped => self.shipped_at = Some(at),
            OrderStatus::Delivered => self.delivered_at = Some(at),
            _ => {}
        }

        self.status = next;
        self.updated_at = at;
        Ok(())
    }

    pub fn is_paid(&self) -> bool {
        self.paid_at.is_some() || self.status == OrderStatus::Paid
    }

    pub fn is_shipped(&self) -> bool {
        self.shipped_at.is_some() || self.status == OrderStatus::Shipped
    }

    pub fn is_delivered(&self) -> bool {
        self.delivered_at.is_some() || self.status == OrderStatus::Delivered
    }

    pub fn can_cancel(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Processing)
    }

    pub fn can_refund(&self) -> bool {
        self.is_paid() && !matches!(self.status, OrderStatus::Cancelled | OrderStatus::Refunded)
    }

    /// Human-facing reference, e.g. `ORD-0190A3F2`.
    pub fn order_number(&self) -> String {
        let hex = self.id.simple().to_string();
        format!("ORD-{}", hex[..8].to_uppercase())
    }

    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    // Accessors

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn user_id(&self) -> Uuid {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn subtotal(&self) -> Decimal {
        self.subtotal
    }

    pub fn discount_amount(&self) -> Decimal {
        self.discount_amount
    }

    pub fn coupon_code(&self) -> Option<&str> {
        self.coupon_code.as_deref()
    }

    /// Coupon redeemed for this order, released again on cancellation.
    pub fn coupon_id(&self) -> Option<Uuid> {
        self.coupon_id
    }

    pub fn tax(&self) -> Decimal {
        self.tax
    }

    pub fn shipping_cost(&self) -> Decimal {
        self.shipping_cost
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn shipping_address_id(&self) -> Uuid {
        self.shipping_address_id
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn paid_at(&self) -> Option<DateTime<Utc>> {
        self.paid_at
    }

    pub fn shipped_at(&self) -> Option<DateTime<Utc>> {
        self.shipped_at
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.delivered_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
