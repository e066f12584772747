use clap::Parser;
use std::net::SocketAddr;
use std::time::Duration;

use crate::actors::HealthServerConfig;

// ============================================================================
// Supervisor Configuration
// ============================================================================

/// Command line configuration for the `run-group` supervisor binary
#[derive(Debug, Clone, Parser)]
#[command(
    name = "run-group",
    about = "Runs a heartbeat worker, signal listener and health endpoint as one group"
)]
pub struct SupervisorConfig {
    /// Address for the /health and /metrics endpoint
    #[arg(long, default_value = "127.0.0.1:9090")]
    pub health_addr: SocketAddr,

    /// Seconds between heartbeats
    #[arg(long, default_value_t = 5)]
    pub heartbeat_secs: u64,

    /// Make the heartbeat worker fail after this many seconds
    #[arg(long)]
    pub fail_after_secs: Option<u64>,

    /// Cancel the group cleanly after this many heartbeats
    #[arg(long)]
    pub max_beats: Option<u64>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info,run_group=debug")]
    pub log_filter: String,
}

impl SupervisorConfig {
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_secs(self.heartbeat_secs.max(1))
    }

    pub fn fail_after(&self) -> Option<Duration> {
        self.fail_after_secs.map(Duration::from_secs)
    }

    pub fn health_server(&self) -> HealthServerConfig {
        HealthServerConfig {
            addr: self.health_addr,
            ..HealthServerConfig::default()
        }
    }
}
