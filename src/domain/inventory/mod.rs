// ============================================================================
// Inventory Domain - stock levels and their audit trail
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod repository;
pub mod ledger;

pub use value_objects::*;
pub use errors::*;
pub use repository::*;
pub use ledger::*;
