// ============================================================================
// Domain Layer - Business Logic
// ============================================================================
//
// Each aggregate has its own subdirectory with:
// - Value objects
// - Errors
// - Repository traits
// - Aggregate and/or service implementation
//
// Persistence lives behind the repository traits; see `crate::store`.
//
// ============================================================================

pub mod money;
pub mod inventory;
pub mod coupon;
pub mod cart;
pub mod order;
pub mod address;
