use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Inventory Value Objects
// ============================================================================

/// A purchasable SKU-level unit carrying its own stock count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Variant {
    pub id: Uuid,
    pub product_id: Uuid,
    pub sku: String,
    pub stock: u32,
}

impl Variant {
    pub fn new(product_id: Uuid, sku: impl Into<String>, stock: u32) -> Self {
        Self {
            id: Uuid::now_v7(),
            product_id,
            sku: sku.into(),
            stock,
        }
    }

    /// Copy of this variant holding a different stock count
    pub fn with_stock(&self, stock: u32) -> Self {
        Self {
            stock,
            ..self.clone()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeType {
    Restock,
    Sale,
    Return,
    Adjustment,
    Damage,
}

impl ChangeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeType::Restock => "restock",
            ChangeType::Sale => "sale",
            ChangeType::Return => "return",
            ChangeType::Adjustment => "adjustment",
            ChangeType::Damage => "damage",
        }
    }
}

/// Append-only audit record of one stock change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventoryLogEntry {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub change_type: ChangeType,
    pub quantity_change: i64,
    pub previous_quantity: u32,
    pub new_quantity: u32,
    pub reason: Option<String>,
    pub actor_id: Uuid,
    pub created_at: DateTime<Utc>,
}

/// What the caller asks the repository to record alongside a stock write.
/// Quantities are filled in by the repository inside the atomic unit.
#[derive(Debug, Clone, PartialEq)]
pub struct StockChange {
    pub change_type: ChangeType,
    pub reason: Option<String>,
    pub actor_id: Uuid,
}

impl StockChange {
    pub fn into_entry(self, variant_id: Uuid, previous: u32, new: u32) -> InventoryLogEntry {
        InventoryLogEntry {
            id: Uuid::now_v7(),
            variant_id,
            change_type: self.change_type,
            quantity_change: i64::from(new) - i64::from(previous),
            previous_quantity: previous,
            new_quantity: new,
            reason: self.reason,
            actor_id: self.actor_id,
            created_at: Utc::now(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StockAdjustment {
    pub previous_quantity: u32,
    pub new_quantity: u32,
}

/// Outcome of a conditional decrement performed by the repository.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reservation {
    Reserved(StockAdjustment),
    Insufficient { available: u32 },
}
