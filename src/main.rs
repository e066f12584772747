use anyhow::anyhow;
use clap::Parser;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Instant;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use run_group::{
    Cancel, Canceled, Group, GroupHealth, GroupMetrics, HealthServer, SignalError, Signals,
    SupervisorConfig,
};

fn main() -> anyhow::Result<()> {
    let config = SupervisorConfig::parse();

    // Initialize structured logging with environment-based filtering
    // RUST_LOG takes precedence over --log-filter
    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .init();

    tracing::info!("🚀 Starting run-group supervisor");

    let health = Arc::new(GroupHealth::new());
    let metrics = Arc::new(GroupMetrics::new()?);
    tracing::info!("📊 Metrics registry created with {} metrics", metrics.registry().gather().len());

    let cancel = Cancel::new();
    let cancel_handle = cancel.handle();

    let mut group: Group<'_, anyhow::Error> = Group::new()
        .with_health(Arc::clone(&health))
        .with_metrics(Arc::clone(&metrics))
        .describe_errors(|e: &anyhow::Error| format!("{e:#}"));

    // === Heartbeat worker: the actual work of this process ===
    let (stop_heartbeat, heartbeat_stopped) = mpsc::channel::<()>();
    let interval = config.heartbeat_interval();
    let fail_after = config.fail_after();
    let max_beats = config.max_beats;
    group.add_named(
        "heartbeat",
        move || {
            let started = Instant::now();
            let mut beats: u64 = 0;
            loop {
                match heartbeat_stopped.recv_timeout(interval) {
                    Err(RecvTimeoutError::Timeout) => {}
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => return Ok(()),
                }

                beats += 1;
                tracing::info!(beats, uptime_secs = started.elapsed().as_secs(), "💓 Heartbeat");

                if let Some(limit) = fail_after {
                    if started.elapsed() >= limit {
                        return Err(anyhow!("heartbeat gave up after {} beats", beats));
                    }
                }
                if max_beats.is_some_and(|max| beats >= max) {
                    cancel_handle.cancel();
                }
            }
        },
        move |_| {
            let _ = stop_heartbeat.send(());
        },
        0,
    );

    // === Shutdown sources ===
    group.add_actor(cancel, 1);
    group.add_actor(Signals::shutdown(), 2);

    // === Health endpoint: stopped last so probes can watch the shutdown ===
    let server = HealthServer::new(config.health_server(), Arc::clone(&health))
        .with_metrics(Arc::clone(&metrics));
    group.add_actor(server, 3);

    tracing::info!(actors = group.len(), "Running actor group");
    match group.run() {
        Ok(()) => {
            tracing::info!("🎉 Group stopped cleanly");
            Ok(())
        }
        Err(e) if e.is::<Canceled>() => {
            tracing::info!("🛑 Group canceled");
            Ok(())
        }
        Err(e) => match e.downcast_ref::<SignalError>().and_then(SignalError::signal) {
            Some(signal) => {
                tracing::info!(signal = %signal, "🛑 Shut down by signal");
                Ok(())
            }
            None => {
                tracing::error!(error = %e, "Group stopped with an error");
                Err(e)
            }
        },
    }
}
