use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

// ============================================================================
// Group Health
// ============================================================================
//
// Tracks where a group is in its lifecycle and what each actor is doing.
// The group updates it while running; the health endpoint reads it.
//
//   Idle -> Running -> Triggered -> Draining -> Done
//
// ============================================================================

/// Lifecycle phase of a group run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Running,
    Triggered,
    Draining,
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Running => "running",
            Phase::Triggered => "triggered",
            Phase::Draining => "draining",
            Phase::Done => "done",
        };
        f.write_str(name)
    }
}

/// State of a single actor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum ActorState {
    Pending,
    Running,
    Interrupted,
    Exited,
    Failed(String),
}

impl ActorState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, ActorState::Exited | ActorState::Failed(_))
    }
}

/// Health status of the group as a whole
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
    Healthy,
    Degraded(String),
    Unhealthy(String),
}

impl HealthStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, HealthStatus::Healthy)
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, HealthStatus::Degraded(_))
    }

    pub fn is_unhealthy(&self) -> bool {
        matches!(self, HealthStatus::Unhealthy(_))
    }
}

/// Health information for one actor
#[derive(Debug, Clone, Serialize)]
pub struct ActorHealth {
    pub index: usize,
    pub name: String,
    pub state: ActorState,
    pub last_change: DateTime<Utc>,
}

/// Snapshot returned by [`GroupHealth::report`]
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub phase: Phase,
    pub actors: Vec<ActorHealth>,
    pub check_time: DateTime<Utc>,
}

struct Inner {
    phase: Phase,
    actors: BTreeMap<usize, ActorHealth>,
}

/// Shared view of a group's lifecycle, safe to read while the group runs.
pub struct GroupHealth {
    inner: RwLock<Inner>,
}

impl Default for GroupHealth {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupHealth {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                phase: Phase::Idle,
                actors: BTreeMap::new(),
            }),
        }
    }

    /// Start tracking an actor in the `Pending` state.
    pub fn track(&self, index: usize, name: impl Into<String>) {
        self.inner.write().actors.insert(
            index,
            ActorHealth {
                index,
                name: name.into(),
                state: ActorState::Pending,
                last_change: Utc::now(),
            },
        );
    }

    pub fn set_state(&self, index: usize, state: ActorState) {
        let mut inner = self.inner.write();
        if let Some(actor) = inner.actors.get_mut(&index) {
            tracing::trace!(actor = %actor.name, state = ?state, "Actor state changed");
            actor.state = state;
            actor.last_change = Utc::now();
        }
    }

    /// Mark an actor interrupted unless it has already exited.
    pub fn mark_interrupted(&self, index: usize) {
        let mut inner = self.inner.write();
        if let Some(actor) = inner.actors.get_mut(&index) {
            if !actor.state.is_terminal() {
                actor.state = ActorState::Interrupted;
                actor.last_change = Utc::now();
            }
        }
    }

    pub fn set_phase(&self, phase: Phase) {
        self.inner.write().phase = phase;
    }

    pub fn phase(&self) -> Phase {
        self.inner.read().phase
    }

    pub fn state(&self, index: usize) -> Option<ActorState> {
        self.inner.read().actors.get(&index).map(|a| a.state.clone())
    }

    pub fn overall_status(&self) -> HealthStatus {
        let inner = self.inner.read();
        Self::compute_overall_status(&inner)
    }

    pub fn report(&self) -> HealthReport {
        let inner = self.inner.read();
        HealthReport {
            status: Self::compute_overall_status(&inner),
            phase: inner.phase,
            actors: inner.actors.values().cloned().collect(),
            check_time: Utc::now(),
        }
    }

    fn compute_overall_status(inner: &Inner) -> HealthStatus {
        let mut failed = Vec::new();
        let mut stopped = Vec::new();

        for actor in inner.actors.values() {
            match &actor.state {
                ActorState::Failed(reason) => failed.push(format!("{}: {}", actor.name, reason)),
                ActorState::Exited | ActorState::Interrupted => stopped.push(actor.name.as_str()),
                ActorState::Pending | ActorState::Running => {}
            }
        }

        if !failed.is_empty() {
            return HealthStatus::Unhealthy(failed.join(", "));
        }

        match inner.phase {
            Phase::Idle => HealthStatus::Degraded("group not started".to_string()),
            Phase::Running if stopped.is_empty() => HealthStatus::Healthy,
            Phase::Running => HealthStatus::Degraded(format!("stopped: {}", stopped.join(", "))),
            phase => HealthStatus::Degraded(format!("group {}", phase)),
        }
    }
}
