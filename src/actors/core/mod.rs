// ============================================================================
// Core Actor Abstractions
// ============================================================================
//
// The execute/interrupt capability traits and the health model the group
// reports into.
//
// ============================================================================

pub mod actor;
pub mod health;

// Re-export core types
pub use actor::*;
pub use health::*;
