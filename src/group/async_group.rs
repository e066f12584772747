use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinError;

use super::observer::{Describe, Exit, Observer};
use crate::actors::{AsyncActor, GroupHealth, Phase};
use crate::metrics::GroupMetrics;

// ============================================================================
// Async Actor Group
// ============================================================================
//
// Same lifetime rule as `Group`, for futures on a tokio runtime. Each execute
// is spawned as its own task; interrupts are plain calls made by whoever is
// awaiting `run`.
//
// ============================================================================

type Interrupt<E> = Box<dyn FnOnce(Option<&E>) + Send + 'static>;

struct AsyncActorRecord<E> {
    name: String,
    index: usize,
    priority: i32,
    execute: BoxFuture<'static, Result<(), E>>,
    interrupt: Interrupt<E>,
}

pub struct AsyncGroup<E> {
    actors: Vec<AsyncActorRecord<E>>,
    observer: Observer,
    describe: Option<Arc<Describe<'static, E>>>,
}

impl<E> Default for AsyncGroup<E> {
    fn default() -> Self {
        Self {
            actors: Vec::new(),
            observer: Observer::default(),
            describe: None,
        }
    }
}

impl<E> AsyncGroup<E>
where
    E: Send + 'static,
{
    pub fn new() -> Self {
        Self::default()
    }

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

    /// See [`Group::describe_errors`](crate::Group::describe_errors).
    pub fn describe_errors<D>(mut self, describe: D) -> Self
    where
        D: Fn(&E) -> String + Send + Sync + 'static,
    {
        self.describe = Some(Arc::new(describe));
        self
    }

    pub fn len(&self) -> usize {
        self.actors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }

    pub fn add<F, I>(&mut self, execute: F, interrupt: I, interrupt_priority: i32)
    where
        F: Future<Output = Result<(), E>> + Send + 'static,
        I: FnOnce(Option<&E>) + Send + 'static,
    {
        let name = format!("actor-{}", self.actors.len());
        self.add_named(name, execute, interrupt, interrupt_priority);
    }

    pub fn add_named<F, I>(
        &mut self,
        name: impl Into<String>,
        execute: F,
        interrupt: I,
        interrupt_priority: i32,
    ) where
        F: Future<Output = Result<(), E>> + Send + 'static,
        I: FnOnce(Option<&E>) + Send + 'static,
    {
        let index = self.actors.len();
        let name = name.into();
        self.observer.registered(index, &name);
        self.actors.push(AsyncActorRecord {
            name,
            index,
            priority: interrupt_priority,
            execute: execute.boxed(),
            interrupt: Box::new(interrupt),
        });
    }

    pub fn add_actor<A>(&mut self, actor: A, interrupt_priority: i32)
    where
        A: AsyncActor<E> + 'static,
    {
        let actor = Arc::new(actor);
        let name = actor.name().to_owned();
        let runner = Arc::clone(&actor);
        self.add_named(
            name,
            async move { runner.execute().await },
            move |cause: Option<&E>| actor.interrupt(cause),
            interrupt_priority,
        );
    }
}

impl<E> AsyncGroup<E>
where
    E: Send + 'static,
{
    /// Async counterpart of [`Group::run`](crate::Group::run).
    ///
    /// Must be awaited to completion: dropping the future mid-run leaves the
    /// spawned actors running detached.
    pub async fn run(self) -> Result<(), E> {
        let AsyncGroup {
            actors,
            observer,
            describe,
        } = self;
        if actors.is_empty() {
            tracing::debug!("Group has no actors");
            return Ok(());
        }

        let total = actors.len();
        let mut names = Vec::with_capacity(total);
        let mut pending = Vec::with_capacity(total);
        let mut running = FuturesUnordered::new();

        observer.phase(Phase::Running);
        for record in actors {
            let AsyncActorRecord {
                name,
                index,
                priority,
                execute,
                interrupt,
            } = record;

            observer.started(index, &name);
            let handle = tokio::spawn(execute);
            let task_observer = observer.clone();
            let task_name = name.clone();
            let task_describe = describe.clone();
            running.push(handle.map(move |joined| {
                let exit = into_exit(joined);
                task_observer.exited(index, &task_name, &exit, task_describe.as_deref());
                (index, exit)
            }));

            names.push(name);
            pending.push((priority, index, interrupt));
        }

        let (trigger_index, trigger) = match running.next().await {
            Some(exit) => exit,
            None => unreachable!("at least one actor was spawned"),
        };
        let started = Instant::now();
        observer.triggered(&names[trigger_index], &trigger);

        pending.sort_by_key(|(priority, index, _)| (*priority, *index));
        {
            let cause = trigger.cause();
            for (priority, index, interrupt) in pending {
                observer.interrupting(index, &names[index], priority);
                interrupt(cause);
            }
        }

        observer.phase(Phase::Draining);
        while let Some((index, exit)) = running.next().await {
            if let Exit::Panicked(_) = exit {
                tracing::error!(actor = %names[index], "Actor panicked while draining");
            }
        }
        observer.drained(started.elapsed());

        trigger.into_result()
    }
}

fn into_exit<E>(joined: Result<Result<(), E>, JoinError>) -> Exit<E> {
    match joined {
        Ok(result) => Exit::Returned(result),
        Err(e) if e.is_panic() => Exit::Panicked(e.into_panic()),
        // Tasks are never aborted by the group; only a runtime shutdown gets here.
        Err(e) => Exit::Panicked(Box::new(e.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actors::ActorState;
    use parking_lot::Mutex;
    use std::fmt;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    #[derive(Debug, Clone, PartialEq)]
    struct TestError(&'static str);

    impl fmt::Display for TestError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str(self.0)
        }
    }

    async fn run_with_timeout(group: AsyncGroup<TestError>) -> Result<(), TestError> {
        timeout(Duration::from_secs(2), group.run())
            .await
            .expect("group did not return")
    }

    /// Adds an actor that waits until interrupted, recording the interrupt.
    fn add_waiter(
        group: &mut AsyncGroup<TestError>,
        label: &'static str,
        priority: i32,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) {
        let (stop, wait) = oneshot::channel::<()>();
        let log = Arc::clone(log);
        group.add_named(
            label,
            async move {
                let _ = wait.await;
                Ok(())
            },
            move |_| {
                log.lock().push(label);
                let _ = stop.send(());
            },
            priority,
        );
    }

    #[tokio::test]
    async fn test_empty_group_returns_immediately() {
        let group = AsyncGroup::new();
        assert_eq!(run_with_timeout(group).await, Ok(()));
    }

    #[tokio::test]
    async fn test_single_actor_returns_its_error() {
        let causes = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&causes);

        let mut group = AsyncGroup::new();
        group.add(
            async { Err(TestError("foobar")) },
            move |cause: Option<&TestError>| seen.lock().push(cause.cloned()),
            -1,
        );

        assert_eq!(run_with_timeout(group).await, Err(TestError("foobar")));
        assert_eq!(*causes.lock(), vec![Some(TestError("foobar"))]);
    }

    #[tokio::test]
    async fn test_boom_scenario() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut group = AsyncGroup::new();

        let log = Arc::clone(&calls);
        group.add_named(
            "a",
            async { Err(TestError("boom")) },
            move |_| log.lock().push("a"),
            2,
        );
        add_waiter(&mut group, "b", 1, &calls);

        assert_eq!(run_with_timeout(group).await, Err(TestError("boom")));
        assert_eq!(*calls.lock(), vec!["b", "a"]);
    }

    #[tokio::test]
    async fn test_first_to_finish_wins() {
        let interrupted = Arc::new(AtomicUsize::new(0));
        let exited = Arc::new(AtomicUsize::new(0));
        let (stop, wait) = oneshot::channel::<()>();

        let mut group = AsyncGroup::new();
        group.add(async { Err(TestError("interrupt")) }, |_| {}, 2);

        let counter = Arc::clone(&interrupted);
        let done = Arc::clone(&exited);
        group.add(
            async move {
                let _ = wait.await;
                done.fetch_add(1, Ordering::SeqCst);
                Ok(())
            },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = stop.send(());
            },
            1,
        );

        assert_eq!(run_with_timeout(group).await, Err(TestError("interrupt")));
        assert_eq!(interrupted.load(Ordering::SeqCst), 1);
        assert_eq!(exited.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_later_errors_are_discarded() {
        let (stop, wait) = oneshot::channel::<()>();
        let mut group = AsyncGroup::new();
        group.add(async { Err(TestError("first")) }, |_| {}, 0);
        group.add(
            async move {
                let _ = wait.await;
                Err(TestError("second"))
            },
            move |_| {
                let _ = stop.send(());
            },
            1,
        );

        assert_eq!(run_with_timeout(group).await, Err(TestError("first")));
    }

    #[tokio::test]
    async fn test_equal_priorities_keep_add_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut group = AsyncGroup::new();

        add_waiter(&mut group, "w0", 7, &calls);
        add_waiter(&mut group, "w1", 7, &calls);
        add_waiter(&mut group, "w2", 7, &calls);
        add_waiter(&mut group, "w3", -1, &calls);
        group.add(async { Ok(()) }, |_| {}, 100);

        assert_eq!(run_with_timeout(group).await, Ok(()));
        assert_eq!(*calls.lock(), vec!["w3", "w0", "w1", "w2"]);
    }

    #[derive(Debug, PartialEq)]
    enum Opaque {
        Stop,
    }

    #[tokio::test]
    async fn test_error_type_needs_no_display() {
        let mut group: AsyncGroup<Opaque> = AsyncGroup::new();
        group.add(async { Err(Opaque::Stop) }, |_| {}, 0);

        let result = timeout(Duration::from_secs(2), group.run()).await.unwrap();
        assert_eq!(result, Err(Opaque::Stop));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_interrupts_follow_priority_order() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let mut group = AsyncGroup::new();

        add_waiter(&mut group, "p3", 3, &calls);
        add_waiter(&mut group, "p-1", -1, &calls);
        add_waiter(&mut group, "p7", 7, &calls);
        add_waiter(&mut group, "p0", 0, &calls);
        group.add_named(
            "trigger",
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            },
            |_| {},
            5,
        );

        assert_eq!(run_with_timeout(group).await, Ok(()));
        assert_eq!(*calls.lock(), vec!["p-1", "p0", "p3", "p7"]);
    }

    #[tokio::test]
    async fn test_no_actor_outlives_run() {
        let running = Arc::new(AtomicUsize::new(0));
        let mut group = AsyncGroup::new();

        for i in 0..5 {
            let (stop, wait) = oneshot::channel::<()>();
            let counter = Arc::clone(&running);
            counter.fetch_add(1, Ordering::SeqCst);
            group.add(
                async move {
                    if i == 0 {
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    } else {
                        let _ = wait.await;
                        tokio::time::sleep(Duration::from_millis(5)).await;
                    }
                    counter.fetch_sub(1, Ordering::SeqCst);
                    Ok(())
                },
                move |_| {
                    let _ = stop.send(());
                },
                i,
            );
        }

        assert_eq!(run_with_timeout(group).await, Ok(()));
        assert_eq!(running.load(Ordering::SeqCst), 0);
    }

    struct Ticker {
        stop: tokio::sync::Notify,
        ticks: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl AsyncActor<TestError> for Ticker {
        fn name(&self) -> &str {
            "ticker"
        }

        async fn execute(&self) -> Result<(), TestError> {
            let mut interval = tokio::time::interval(Duration::from_millis(1));
            loop {
                tokio::select! {
                    _ = interval.tick() => {
                        self.ticks.fetch_add(1, Ordering::SeqCst);
                    }
                    _ = self.stop.notified() => return Ok(()),
                }
            }
        }

        fn interrupt(&self, _cause: Option<&TestError>) {
            self.stop.notify_one();
        }
    }

    #[tokio::test]
    async fn test_add_actor_with_health() {
        let health = Arc::new(GroupHealth::new());
        let mut group = AsyncGroup::new()
            .with_health(Arc::clone(&health))
            .describe_errors(|e: &TestError| e.to_string());
        group.add_actor(
            Ticker {
                stop: tokio::sync::Notify::new(),
                ticks: AtomicUsize::new(0),
            },
            0,
        );
        group.add_named(
            "deadline",
            async {
                tokio::time::sleep(Duration::from_millis(20)).await;
                Err(TestError("deadline"))
            },
            |_| {},
            1,
        );

        assert_eq!(run_with_timeout(group).await, Err(TestError("deadline")));
        assert_eq!(health.phase(), Phase::Done);
        assert_eq!(health.state(0), Some(ActorState::Exited));
        assert_eq!(
            health.state(1),
            Some(ActorState::Failed("deadline".to_string()))
        );
    }

    #[tokio::test]
    async fn test_panicking_actor_resumes_after_drain() {
        let interrupted = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&interrupted);
        let (stop, wait) = oneshot::channel::<()>();

        let mut group: AsyncGroup<TestError> = AsyncGroup::new();
        group.add(
            async {
                if true {
                    panic!("actor bug");
                }
                Ok(())
            },
            |_| {},
            0,
        );
        group.add(
            async move {
                let _ = wait.await;
                Ok(())
            },
            move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
                let _ = stop.send(());
            },
            1,
        );

        let result = tokio::spawn(group.run()).await;
        assert!(result.unwrap_err().is_panic());
        assert_eq!(interrupted.load(Ordering::SeqCst), 1);
    }
}
