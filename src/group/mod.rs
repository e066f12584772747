mod async_group;
mod observer;

pub use async_group::AsyncGroup;

use std::panic::{self, AssertUnwindSafe};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::Instant;

use crate::actors::{Actor, GroupHealth, Phase};
use crate::metrics::GroupMetrics;
use observer::{Describe, Exit, Observer};

// ============================================================================
// Actor Group
// ============================================================================
//
// Runs a fixed set of actors concurrently. The first actor to return ends
// the run for everyone:
//
//   1. every execute starts on its own thread
//   2. the first result to arrive becomes the trigger
//   3. interrupts fire one by one, ascending priority, ties in add order
//   4. the remaining results are drained
//   5. the trigger is returned
//
// A group runs once; `run` consumes it.
//
// ============================================================================

type Execute<'a, E> = Box<dyn FnOnce() -> Result<(), E> + Send + 'a>;
type Interrupt<'a, E> = Box<dyn FnOnce(Option<&E>) + Send + 'a>;

struct ActorRecord<'a, E> {
    name: String,
    index: usize,
    priority: i32,
    execute: Execute<'a, E>,
    interrupt: Interrupt<'a, E>,
}

struct PendingInterrupt<'a, E> {
    name: String,
    index: usize,
    priority: i32,
    interrupt: Interrupt<'a, E>,
}

/// A set of blocking actors that live and die together.
///
/// Actors run on scoped threads, so `execute` and `interrupt` may borrow
/// anything that outlives the group.
pub struct Group<'a, E> {
    actors: Vec<ActorRecord<'a, E>>,
    observer: Observer,
    describe: Option<Box<Describe<'a, E>>>,
}

impl<E> Default for Group<'_, E> {
    fn default() -> Self {
        Self {
            actors: Vec::new(),
            observer: Observer::default(),
            describe: None,
        }
    }
}

impl<'a, E> Group<'a, E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Report actor and phase changes into `health`.
    pub fn with_health(mut self, health: Arc<GroupHealth>) -> Self {
        for actor in &self.actors {
            health.track(actor.index, actor.name.as_str());
        }
        self.observer.health = Some(health);
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<GroupMetrics>) -> Self {
        self.observer.metrics = Some(metrics);
        self
    }

    /// Render failure values for logs and health. Without it an error shows
    /// up only as an `error` outcome.
    pub fn describe_errors<D>(mut self, describe: D) -> Self
    where
        D: Fn(&E) -> String + Send + Sync + 'a,
    {
        self.describe = Some(Box::new(describe));
        self
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    /// Add an actor. `execute` must return soon after `interrupt` is called,
    /// and `interrupt` must be safe to call after `execute` has returned.
    /// Interrupts fire in ascending `interrupt_priority`.
    pub fn add<X, I>(&mut self, execute: X, interrupt: I, interrupt_priority: i32)
    where
        X: FnOnce() -> Result<(), E> + Send + 'a,
        I: FnOnce(Option<&E>) + Send + 'a,
    {
        let name = format!("actor-{}", self.actors.len());
        self.add_named(name, execute, interrupt, interrupt_priority);
    }

    pub fn add_named<X, I>(
        &mut self,
        name: impl Into<String>,
        execute: X,
        interrupt: I,
        interrupt_priority: i32,
    ) where
        X: FnOnce() -> Result<(), E> + Send + 'a,
        I: FnOnce(Option<&E>) + Send + 'a,
    {
        let index = self.actors.len();
        let name = name.into();
        self.observer.registered(index, &name);
        self.actors.push(ActorRecord {
            name,
            index,
            priority: interrupt_priority,
            execute: Box::new(execute),
            interrupt: Box::new(interrupt),
        });
    }

    pub fn add_actor<A>(&mut self, actor: A, interrupt_priority: i32)
    where
        A: Actor<E> + 'a,
        E: 'a,
    {
        let actor = Arc::new(actor);
        let name = actor.name().to_owned();
        let runner = Arc::clone(&actor);
        self.add_named(
            name,
            move || runner.execute(),
            move |cause: Option<&E>| actor.interrupt(cause),
            interrupt_priority,
        );
    }
}

impl<'a, E> Group<'a, E>
where
    E: Send,
{
    /// Run every actor until the first one returns, interrupt the rest and
    /// wait for all of them. Returns the first actor's result.
    ///
    /// A panicking `execute` also ends the run. Interrupts then receive
    /// `None` and the panic resumes once every actor has stopped.
    pub fn run(self) -> Result<(), E> {
        let Group {
            actors,
            observer,
            describe,
        } = self;
        if actors.is_empty() {
            tracing::debug!("Group has no actors");
            return Ok(());
        }

        let total = actors.len();
        let (tx, rx) = mpsc::sync_channel::<(usize, Exit<E>)>(total);
        let describe = describe.as_deref();

        thread::scope(|scope| {
            observer.phase(Phase::Running);
            let mut pending = Vec::with_capacity(total);
            let mut names = Vec::with_capacity(total);

            for record in actors {
                let ActorRecord {
                    name,
                    index,
                    priority,
                    execute,
                    interrupt,
                } = record;

                observer.started(index, &name);
                let tx = tx.clone();
                let observer = &observer;
                let thread_name = name.clone();
                scope.spawn(move || {
                    let exit = match panic::catch_unwind(AssertUnwindSafe(execute)) {
                        Ok(result) => Exit::Returned(result),
                        Err(payload) => Exit::Panicked(payload),
                    };
                    observer.exited(index, &thread_name, &exit, describe);
                    // The channel holds one slot per actor, so this never blocks.
                    let _ = tx.send((index, exit));
                });

                names.push(name.clone());
                pending.push(PendingInterrupt {
                    name,
                    index,
                    priority,
                    interrupt,
                });
            }

            let (trigger_index, trigger) = match rx.recv() {
                Ok(exit) => exit,
                Err(_) => unreachable!("the group holds a sender for the whole run"),
            };
            let started = Instant::now();
            observer.triggered(&names[trigger_index], &trigger);

            pending.sort_by_key(|p| (p.priority, p.index));
            let cause = trigger.cause();
            for p in pending {
                observer.interrupting(p.index, &p.name, p.priority);
                (p.interrupt)(cause);
            }

            observer.phase(Phase::Draining);
            for _ in 1..total {
                match rx.recv() {
                    Ok((index, Exit::Panicked(_))) => {
                        tracing::error!(actor = %names[index], "Actor panicked while draining");
                    }
                    Ok(_) => {}
                    Err(_) => unreachable!("the group holds a sender for the whole run"),
                }
            }
            observer.drained(started.elapsed());

            trigger.into_result()
        })
    }
}
