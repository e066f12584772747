// ============================================================================
// Collaborator Actors
// ============================================================================
//
// Ready-made actors for the usual members of a service group:
// - OS signal listener
// - Cancellation watcher driven from outside the group
// - HTTP health and metrics endpoint
//
// ============================================================================

// Private module declarations
mod cancel;
mod health_server;
mod signals;

// Re-export for public API
pub use cancel::{Cancel, CancelHandle, Canceled};
pub use health_server::{HealthServer, HealthServerConfig, HealthServerError};
pub use signals::{Signal, SignalError, Signals};

/// Single-threaded runtime for blocking actors that wait on async primitives.
fn blocking_runtime() -> std::io::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
}
