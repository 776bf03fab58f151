use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::RepositoryError;
use super::aggregate::Order;
use super::value_objects::{OrderStatus, PaymentRecord, PaymentStatus};

#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(&self, order: Order) -> Result<(), RepositoryError>;

    async fn find(&self, order_id: Uuid) -> Result<Option<Order>, RepositoryError>;

    /// Newest first.
    async fn find_by_user(&self, user_id: Uuid) -> Result<Vec<Order>, RepositoryError>;

    /// Store a transitioned order, but only if the stored row is still in
    /// `expected`. The optional payment record is upserted in the same unit.
    /// Returns `false` when another writer got there first.
    async fn save_transition(
        &self,
        order: Order,
        expected: OrderStatus,
        payment: Option<PaymentRecord>,
    ) -> Result<bool, RepositoryError>;

    async fn find_payment(&self, order_id: Uuid) -> Result<Option<PaymentRecord>, RepositoryError>;

    async fn find_payment_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<PaymentRecord>, RepositoryError>;

    /// Returns whether a record existed.
    async fn set_payment_status(
        &self,
        order_id: Uuid,
        status: PaymentStatus,
    ) -> Result<bool, RepositoryError>;

    /// Stamp `fulfilled_at` if the payment is completed and not yet
    /// fulfilled. Returns `false` when there is nothing to claim.
    async fn claim_fulfilment(
        &self,
        order_id: Uuid,
        at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError>;

    /// Clear a claim whose steps failed so a redelivery can retry them.
    async fn release_fulfilment(&self, order_id: Uuid) -> Result<bool, RepositoryError>;
}
