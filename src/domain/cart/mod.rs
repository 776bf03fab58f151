// ============================================================================
// Cart Domain - per-user line items, priced and stock-capped
// ============================================================================

pub mod value_objects;
pub mod aggregate;
pub mod errors;
pub mod repository;
pub mod service;

pub use value_objects::*;
pub use aggregate::*;
pub use errors::*;
pub use repository::*;
pub use service::*;
