use async_trait::async_trait;
use uuid::Uuid;

use crate::errors::RepositoryError;
use super::value_objects::{InventoryLogEntry, Reservation, StockAdjustment, StockChange, Variant};

// ============================================================================
// Inventory Repository
// ============================================================================
//
// Every write method applies the stock change AND appends the log entry as a
// single atomic unit. The previous quantity is read inside that unit, so no
// caller-side read-then-write window exists.
//
// Write methods return `Ok(None)` when the variant does not exist.
//
// ============================================================================

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn find_variant(&self, variant_id: Uuid) -> Result<Option<Variant>, RepositoryError>;

    /// Overwrite stock with an absolute value.
    async fn set_stock(
        &self,
        variant_id: Uuid,
        new_quantity: u32,
        change: StockChange,
    ) -> Result<Option<StockAdjustment>, RepositoryError>;

    /// Decrement only if current stock covers `quantity`.
    async fn decrement_if_available(
        &self,
        variant_id: Uuid,
        quantity: u32,
        change: StockChange,
    ) -> Result<Option<Reservation>, RepositoryError>;

    async fn increment(
        &self,
        variant_id: Uuid,
        quantity: u32,
        change: StockChange,
    ) -> Result<Option<StockAdjustment>, RepositoryError>;

    /// Log entries for a variant, oldest first.
    async fn log_entries(&self, variant_id: Uuid) -> Result<Vec<InventoryLogEntry>, RepositoryError>;

    /// Variants whose stock is at or below `threshold`.
    async fn find_low_stock(&self, threshold: u32) -> Result<Vec<Variant>, RepositoryError>;
}
