use std::sync::Arc;
use uuid::Uuid;

use super::errors::InventoryError;
use super::repository::InventoryRepository;
use super::value_objects::{
    ChangeType, InventoryLogEntry, Reservation, StockAdjustment, StockChange, Variant,
};

// ============================================================================
// Inventory Ledger
// ============================================================================
//
// Stock reads and writes. Every mutation leaves exactly one log entry behind,
// written in the same atomic unit as the stock value.
//
// ============================================================================

#[derive(Clone)]
pub struct InventoryLedger {
    repository: Arc<dyn InventoryRepository>,
}

impl InventoryLedger {
    pub fn new(repository: Arc<dyn InventoryRepository>) -> Self {
        Self { repository }
    }

    /// Set a variant's stock to an absolute value.
    pub async fn adjust_stock(
        &self,
        variant_id: Uuid,
        new_quantity: i64,
        change_type: ChangeType,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<StockAdjustment, InventoryError> {
        if self.repository.find_variant(variant_id).await?.is_none() {
            return Err(InventoryError::NotFound(variant_id));
        }

        let new_quantity = u32::try_from(new_quantity)
            .map_err(|_| InventoryError::InvalidQuantity(new_quantity))?;

        let change = StockChange {
            change_type,
            reason,
            actor_id,
        };

        let adjustment = self
            .repository
            .set_stock(variant_id, new_quantity, change)
            .await?
            .ok_or(InventoryError::NotFound(variant_id))?;

        tracing::info!(
            variant_id = %variant_id,
            change_type = change_type.as_str(),
            previous = adjustment.previous_quantity,
            new = adjustment.new_quantity,
            "Stock adjusted"
        );

        Ok(adjustment)
    }

    /// Take `quantity` units out of stock, failing instead of going negative.
    pub async fn reserve(
        &self,
        variant_id: Uuid,
        quantity: u32,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<StockAdjustment, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(0));
        }

        let change = StockChange {
            change_type: ChangeType::Sale,
            reason,
            actor_id,
        };

        match self
            .repository
            .decrement_if_available(variant_id, quantity, change)
            .await?
        {
            None => Err(InventoryError::NotFound(variant_id)),
            Some(Reservation::Insufficient { available }) => {
                tracing::warn!(
                    variant_id = %variant_id,
                    requested = quantity,
                    available = available,
                    "Stock reservation refused"
                );
                Err(InventoryError::InsufficientStock {
                    variant_id,
                    requested: quantity,
                    available,
                })
            }
            Some(Reservation::Reserved(adjustment)) => {
                tracing::debug!(
                    variant_id = %variant_id,
                    quantity = quantity,
                    remaining = adjustment.new_quantity,
                    "Stock reserved"
                );
                Ok(adjustment)
            }
        }
    }

    /// Put `quantity` units back into stock.
    pub async fn release(
        &self,
        variant_id: Uuid,
        quantity: u32,
        reason: Option<String>,
        actor_id: Uuid,
    ) -> Result<StockAdjustment, InventoryError> {
        if quantity == 0 {
            return Err(InventoryError::InvalidQuantity(0));
        }

        let change = StockChange {
            change_type: ChangeType::Return,
            reason,
            actor_id,
        };

        let adjustment = self
            .repository
            .increment(variant_id, quantity, change)
            .await?
            .ok_or(InventoryError::NotFound(variant_id))?;

        tracing::debug!(
            variant_id = %variant_id,
            quantity = quantity,
            stock = adjustment.new_quantity,
            "Stock released"
        );

        Ok(adjustment)
    }

    pub async fn stock_level(&self, variant_id: Uuid) -> Result<u32, InventoryError> {
        self.repository
            .find_variant(variant_id)
            .await?
            .map(|v| v.stock)
            .ok_or(InventoryError::NotFound(variant_id))
    }

    pub async fn history(&self, variant_id: Uuid) -> Result<Vec<InventoryLogEntry>, InventoryError> {
        if self.repository.find_variant(variant_id).await?.is_none() {
            return Err(InventoryError::NotFound(variant_id));
        }
        Ok(self.repository.log_entries(variant_id).await?)
    }

    pub async fn low_stock(&self, threshold: u32) -> Result<Vec<Variant>, InventoryError> {
        Ok(self.repository.find_low_stock(threshold).await?)
    }
}

// ============================================================================
// Unit Tests
// ============================================================================
