use std::sync::Arc;
use std::time::Duration;

use crate::actors::{ActorState, GroupHealth, Phase};
use crate::metrics::{GroupMetrics, Outcome};

/// Turns an actor's failure value into text for logs and health reports.
pub(crate) type Describe<'a, E> = dyn Fn(&E) -> String + Send + Sync + 'a;

/// Fans lifecycle events out to the optional health and metrics sinks.
#[derive(Clone, Default)]
pub(crate) struct Observer {
    pub health: Option<Arc<GroupHealth>>,
    pub metrics: Option<Arc<GroupMetrics>>,
}

impl Observer {
    pub fn phase(&self, phase: Phase) {
        tracing::debug!(phase = %phase, "Group phase changed");
        if let Some(health) = &self.health {
            health.set_phase(phase);
        }
    }

    pub fn registered(&self, index: usize, name: &str) {
        if let Some(health) = &self.health {
            health.track(index, name);
        }
    }

    pub fn started(&self, index: usize, name: &str) {
        tracing::debug!(actor = %name, index, "Actor started");
        if let Some(health) = &self.health {
            health.set_state(index, ActorState::Running);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_started();
        }
    }

    /// Failure values are opaque to the group; they only show up as text
    /// when `describe` is set.
    pub fn exited<E>(
        &self,
        index: usize,
        name: &str,
        exit: &Exit<E>,
        describe: Option<&Describe<'_, E>>,
    ) {
        let outcome = exit.outcome();
        let state = match exit {
            Exit::Returned(Ok(())) => {
                tracing::debug!(actor = %name, index, "Actor returned");
                ActorState::Exited
            }
            Exit::Returned(Err(e)) => match describe {
                Some(describe) => {
                    let reason = describe(e);
                    tracing::warn!(actor = %name, index, error = %reason, "Actor returned an error");
                    ActorState::Failed(reason)
                }
                None => {
                    tracing::warn!(actor = %name, index, "Actor returned an error");
                    ActorState::Failed("returned an error".to_string())
                }
            },
            Exit::Panicked(_) => {
                tracing::error!(actor = %name, index, "Actor panicked");
                ActorState::Failed("panicked".to_string())
            }
        };
        if let Some(health) = &self.health {
            health.set_state(index, state);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_exit(name, outcome);
        }
    }

    pub fn triggered<E>(&self, name: &str, exit: &Exit<E>) {
        tracing::info!(actor = %name, outcome = exit.outcome().as_str(), "Actor exit triggered group shutdown");
        self.phase(Phase::Triggered);
        if let Some(metrics) = &self.metrics {
            metrics.record_trigger(name, exit.outcome());
        }
    }

    pub fn interrupting(&self, index: usize, name: &str, priority: i32) {
        tracing::debug!(actor = %name, index, priority, "Interrupting actor");
        if let Some(health) = &self.health {
            health.mark_interrupted(index);
        }
        if let Some(metrics) = &self.metrics {
            metrics.record_interrupt(name);
        }
    }

    pub fn drained(&self, elapsed: Duration) {
        tracing::info!(drain_ms = elapsed.as_millis() as u64, "All actors stopped");
        if let Some(metrics) = &self.metrics {
            metrics.observe_drain(elapsed.as_secs_f64());
        }
        self.phase(Phase::Done);
    }
}

/// How an actor's `execute` ended.
pub(crate) enum Exit<E> {
    Returned(Result<(), E>),
    Panicked(Box<dyn std::any::Any + Send + 'static>),
}

impl<E> Exit<E> {
    pub fn outcome(&self) -> Outcome {
        match self {
            Exit::Returned(Ok(())) => Outcome::Ok,
            Exit::Returned(Err(_)) => Outcome::Error,
            Exit::Panicked(_) => Outcome::Panic,
        }
    }

    /// The value handed to every interrupt. A panic is not a failure value,
    /// so it reads as `None`.
    pub fn cause(&self) -> Option<&E> {
        match self {
            Exit::Returned(Err(e)) => Some(e),
            _ => None,
        }
    }

    /// Unwrap into the group's result, resuming a captured panic.
    pub fn into_result(self) -> Result<(), E> {
        match self {
            Exit::Returned(result) => result,
            Exit::Panicked(payload) => std::panic::resume_unwind(payload),
        }
    }
}
