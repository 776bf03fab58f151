// ============================================================================
// Order Domain - Business Logic for Order Aggregate
// ============================================================================
//
// This module contains ALL Order-specific code:
// - Value objects (OrderItem, OrderStatus, PaymentRecord)
// - Errors (OrderError enum)
// - Aggregate (Order with the status state machine)
// - Repository trait
// - Service (ownership-checked use-cases, payment confirmation)
//
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod aggregate;
pub mod repository;
pub mod service;

// Re-export for convenience
pub use value_objects::*;
pub use errors::*;
pub use aggregate::*;
pub use repository::*;
pub use service::*;
