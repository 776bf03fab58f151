// ============================================================================
// Address Domain - per-user shipping addresses, at most one default
// ============================================================================

pub mod value_objects;
pub mod errors;
pub mod repository;
pub mod service;

pub use value_objects::*;
pub use errors::*;
pub use repository::*;
pub use service::*;
