// Private module declaration
mod server;

use prometheus::{Histogram, HistogramOpts, IntCounterVec, IntGauge, Opts, Registry};

pub(crate) use server::{build_server, ServerState};

// ============================================================================
// Metrics Module - Prometheus metrics for group runs
// ============================================================================
//
// Provides metrics for:
// - Actors currently executing
// - Actor exits by outcome (ok, error, panic)
// - Interrupts issued during shutdown
// - Which actor triggered shutdown
// - Time spent draining after the trigger
//
// All metrics are registered with Prometheus and can be scraped via /metrics
// ============================================================================

/// Outcome of an actor's `execute`, used as a metric label
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Ok,
    Error,
    Panic,
}

impl Outcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Outcome::Ok => "ok",
            Outcome::Error => "error",
            Outcome::Panic => "panic",
        }
    }
}

pub struct GroupMetrics {
    registry: Registry,

    pub actors_running: IntGauge,
    pub actor_exits: IntCounterVec,
    pub interrupts: IntCounterVec,
    pub triggers: IntCounterVec,
    pub drain_duration: Histogram,
}

impl GroupMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let actors_running = IntGauge::new(
            "run_group_actors_running",
            "Number of actors whose execute has not returned yet",
        )?;
        registry.register(Box::new(actors_running.clone()))?;

        let actor_exits = IntCounterVec::new(
            Opts::new("run_group_actor_exits_total", "Actor execute returns by outcome"),
            &["actor", "outcome"],
        )?;
        registry.register(Box::new(actor_exits.clone()))?;

        let interrupts = IntCounterVec::new(
            Opts::new("run_group_interrupts_total", "Interrupts issued to actors"),
            &["actor"],
        )?;
        registry.register(Box::new(interrupts.clone()))?;

        let triggers = IntCounterVec::new(
            Opts::new("run_group_triggers_total", "Actors whose exit triggered group shutdown"),
            &["actor", "outcome"],
        )?;
        registry.register(Box::new(triggers.clone()))?;

        let drain_duration = Histogram::with_opts(
            HistogramOpts::new(
                "run_group_drain_duration_seconds",
                "Time from the trigger until every actor returned",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        )?;
        registry.register(Box::new(drain_duration.clone()))?;

        Ok(Self {
            registry,
            actors_running,
            actor_exits,
            interrupts,
            triggers,
            drain_duration,
        })
    }

    /// Get the Prometheus registry for exposing metrics via HTTP
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn record_started(&self) {
        self.actors_running.inc();
    }

    pub fn record_exit(&self, actor: &str, outcome: Outcome) {
        self.actors_running.dec();
        self.actor_exits.with_label_values(&[actor, outcome.as_str()]).inc();
    }

    pub fn record_interrupt(&self, actor: &str) {
        self.interrupts.with_label_values(&[actor]).inc();
    }

    pub fn record_trigger(&self, actor: &str, outcome: Outcome) {
        self.triggers.with_label_values(&[actor, outcome.as_str()]).inc();
    }

    pub fn observe_drain(&self, duration_secs: f64) {
        self.drain_duration.observe(duration_secs);
    }
}
