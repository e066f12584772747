//! Run a fixed set of actors that live and die together.
//!
//! Each actor is an `execute`/`interrupt` pair. [`Group::run`] starts every
//! `execute` concurrently; the first one to return (with or without an error)
//! makes the group call every `interrupt`, in ascending interrupt priority,
//! and then wait for all actors to return. The first actor's result is the
//! group's result.
//!
//! ```no_run
//! use run_group::{Group, Signals};
//!
//! # fn serve() -> anyhow::Result<()> { Ok(()) }
//! # fn close_listener() {}
//! let mut group: Group<'_, anyhow::Error> = Group::new();
//! group.add(serve, |_| close_listener(), 0);
//! group.add_actor(Signals::shutdown(), 1);
//! group.run()?;
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod actors;
pub mod config;
pub mod group;
pub mod metrics;

pub use actors::{
    Actor, ActorState, AsyncActor, Cancel, CancelHandle, Canceled, GroupHealth, HealthServer,
    HealthServerConfig, HealthServerError, HealthStatus, Phase, Signal, SignalError, Signals,
};
pub use config::SupervisorConfig;
pub use group::{AsyncGroup, Group};
pub use metrics::GroupMetrics;
