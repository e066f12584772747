use actix_web::dev::ServerHandle;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use crate::actors::{Actor, AsyncActor, GroupHealth};
use crate::metrics::{build_server, GroupMetrics, ServerState};

// ============================================================================
// Health Endpoint Actor
// ============================================================================
//
// Serves GET /health (group health as JSON) and GET /metrics (Prometheus)
// until interrupted. As a blocking actor it runs its own actix system on the
// actor's thread; as an async actor it serves on the caller's runtime.
//
// ============================================================================

#[derive(Debug, Clone)]
pub struct HealthServerConfig {
    /// Address to bind; port 0 picks a free port
    pub addr: SocketAddr,
    pub workers: usize,
    /// How long in-flight requests get after an interrupt
    pub shutdown_timeout: Duration,
}

impl Default for HealthServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 9090)),
            workers: 1,
            shutdown_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum HealthServerError {
    #[error("failed to bind health server on {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("health server failed: {0}")]
    Serve(#[from] std::io::Error),
}

#[derive(Default)]
struct Control {
    stopped: bool,
    handle: Option<ServerHandle>,
    bound: Vec<SocketAddr>,
}

pub struct HealthServer {
    config: HealthServerConfig,
    state: ServerState,
    control: Mutex<Control>,
}

impl HealthServer {
    pub fn new(config: HealthServerConfig, health: Arc<GroupHealth>) -> Self {
        Self {
            config,
            state: ServerState {
                health,
                metrics: None,
            },
            control: Mutex::new(Control::default()),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<GroupMetrics>) -> Self {
        self.state.metrics = Some(metrics);
        self
    }

    /// Addresses actually bound, once the server is up.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.control.lock().bound.clone()
    }

    fn serve(&self) -> Result<(), HealthServerError> {
        let system = actix_web::rt::System::new();
        system.block_on(self.run_server())
    }

    async fn run_server(&self) -> Result<(), HealthServerError> {
        if self.control.lock().stopped {
            tracing::debug!("Health server interrupted before it started");
            return Ok(());
        }

        let addr = self.config.addr;
        let (server, bound) = build_server(
            addr,
            self.config.workers,
            self.config.shutdown_timeout,
            self.state.clone(),
        )
        .map_err(|source| HealthServerError::Bind { addr, source })?;

        {
            let mut control = self.control.lock();
            if control.stopped {
                return Ok(());
            }
            control.handle = Some(server.handle());
            control.bound = bound;
        }

        server.await?;
        tracing::info!("Health server stopped");
        Ok(())
    }

    fn stop(&self) {
        let mut control = self.control.lock();
        control.stopped = true;
        if let Some(handle) = control.handle.take() {
            // stop() sends the command right away; the returned future only
            // reports completion, which execute observes instead.
            let _ = handle.stop(true);
        }
    }
}

impl<E> Actor<E> for HealthServer
where
    E: From<HealthServerError>,
{
    fn name(&self) -> &str {
        "health_server"
    }

    fn execute(&self) -> Result<(), E> {
        self.serve().map_err(E::from)
    }

    fn interrupt(&self, _cause: Option<&E>) {
        self.stop();
    }
}

#[async_trait]
impl<E> AsyncActor<E> for HealthServer
where
    E: From<HealthServerError> + Send + 'static,
{
    fn name(&self) -> &str {
        "health_server"
    }

    async fn execute(&self) -> Result<(), E> {
        self.run_server().await.map_err(E::from)
    }

    fn interrupt(&self, _cause: Option<&E>) {
        self.stop();
    }
}
