// ============================================================================
// Store - Persistence Layer
// ============================================================================
//
// Implementations of the repository traits declared in `crate::domain` and
// `crate::checkout`. The in-memory store keeps every table behind a single
// lock, so each trait method is one atomic unit.
//
// ============================================================================

pub mod memory;

pub use memory::InMemoryStore;
