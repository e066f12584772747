// ============================================================================
// Actors Module
// ============================================================================
//
// Structure:
// - core/           - Capability traits (Actor, AsyncActor) and group health
// - infrastructure/ - Ready-made collaborator actors (signals, cancel, health)
//
// ============================================================================

// Private module declarations
mod core;
mod infrastructure;

pub use self::core::{
    Actor, ActorHealth, ActorState, AsyncActor, GroupHealth, HealthReport, HealthStatus, Phase,
};
pub use self::infrastructure::{
    Cancel, CancelHandle, Canceled, HealthServer, HealthServerConfig, HealthServerError, Signal,
    SignalError, Signals,
};
