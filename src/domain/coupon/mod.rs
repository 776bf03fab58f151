// ============================================================================
// Coupon Domain - discount codes, their validation and redemption
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod repository;
pub mod engine;

pub use value_objects::*;
pub use errors::*;
pub use repository::*;
pub use engine::*;
