use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;

use crate::actors::{Actor, AsyncActor};

// ============================================================================
// Cancellation Watcher Actor
// ============================================================================
//
// Lets code outside the group end it. Execute waits for whichever comes
// first: a `CancelHandle::cancel` call (execute fails with `Canceled`) or
// the group's interrupt (execute returns cleanly).
//
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("group canceled")]
pub struct Canceled;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stop {
    Canceled,
    Interrupted,
}

struct Trigger {
    tx: Mutex<Option<oneshot::Sender<Stop>>>,
}

impl Trigger {
    /// First caller wins; later calls are no-ops.
    fn fire(&self, stop: Stop) -> bool {
        match self.tx.lock().take() {
            Some(tx) => tx.send(stop).is_ok(),
            None => false,
        }
    }

    fn is_fired(&self) -> bool {
        self.tx.lock().is_none()
    }
}

/// Cancels the [`Cancel`] actor it was taken from. Cheap to clone.
#[derive(Clone)]
pub struct CancelHandle {
    trigger: Arc<Trigger>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        if self.trigger.fire(Stop::Canceled) {
            tracing::info!("Cancellation requested");
        }
    }

    /// True once the watcher was either canceled or interrupted.
    pub fn is_stopped(&self) -> bool {
        self.trigger.is_fired()
    }
}

pub struct Cancel {
    trigger: Arc<Trigger>,
    rx: Mutex<Option<oneshot::Receiver<Stop>>>,
}

impl Default for Cancel {
    fn default() -> Self {
        Self::new()
    }
}

impl Cancel {
    pub fn new() -> Self {
        let (tx, rx) = oneshot::channel();
        Self {
            trigger: Arc::new(Trigger {
                tx: Mutex::new(Some(tx)),
            }),
            rx: Mutex::new(Some(rx)),
        }
    }

    pub fn handle(&self) -> CancelHandle {
        CancelHandle {
            trigger: Arc::clone(&self.trigger),
        }
    }

    fn take_receiver(&self) -> Option<oneshot::Receiver<Stop>> {
        let rx = self.rx.lock().take();
        if rx.is_none() {
            tracing::warn!("Cancel watcher executed more than once");
        }
        rx
    }

    fn settle(received: Result<Stop, oneshot::error::RecvError>) -> Result<(), Canceled> {
        match received {
            Ok(Stop::Canceled) => Err(Canceled),
            // The trigger owns the sender, so a closed channel means it fired.
            Ok(Stop::Interrupted) | Err(_) => Ok(()),
        }
    }
}

impl<E> Actor<E> for Cancel
where
    E: From<Canceled>,
{
    fn name(&self) -> &str {
        "cancel"
    }

    /// Blocks the calling thread; must not be called from inside an async runtime.
    fn execute(&self) -> Result<(), E> {
        let Some(rx) = self.take_receiver() else {
            return Ok(());
        };
        Self::settle(rx.blocking_recv()).map_err(E::from)
    }

    fn interrupt(&self, _cause: Option<&E>) {
        self.trigger.fire(Stop::Interrupted);
    }
}

#[async_trait]
impl<E> AsyncActor<E> for Cancel
where
    E: From<Canceled> + Send + 'static,
{
    fn name(&self) -> &str {
        "cancel"
    }

    async fn execute(&self) -> Result<(), E> {
        let Some(rx) = self.take_receiver() else {
            return Ok(());
        };
        Self::settle(rx.await).map_err(E::from)
    }

    fn interrupt(&self, _cause: Option<&E>) {
        self.trigger.fire(Stop::Interrupted);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AsyncGroup, Group};
    use std::time::Duration;

    #[test]
    fn test_cancel_fails_execute() {
        let cancel = Cancel::new();
        let handle = cancel.handle();
        handle.cancel();

        let result: Result<(), Canceled> = Actor::execute(&cancel);
        assert_eq!(result, Err(Canceled));
        assert!(handle.is_stopped());
    }

    #[test]
    fn test_interrupt_wins_over_later_cancel() {
        let cancel = Cancel::new();
        let handle = cancel.handle();
        Actor::<Canceled>::interrupt(&cancel, None);
        handle.cancel();

        let result: Result<(), Canceled> = Actor::execute(&cancel);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_handle_cancels_running_group() {
        let cancel = Cancel::new();
        let handle = cancel.handle();

        let mut group: Group<'_, Canceled> = Group::new();
        group.add_actor(cancel, 0);
        let (stop, wait) = std::sync::mpsc::channel::<()>();
        group.add(
            move || {
                let _ = wait.recv();
                Ok(())
            },
            move |cause| {
                assert_eq!(cause, Some(&Canceled));
                let _ = stop.send(());
            },
            1,
        );

        std::thread::scope(|s| {
            s.spawn(|| {
                std::thread::sleep(Duration::from_millis(20));
                handle.cancel();
            });
            assert_eq!(group.run(), Err(Canceled));
        });
    }

    #[tokio::test]
    async fn test_async_group_interrupts_watcher() {
        let cancel = Cancel::new();
        let handle = cancel.handle();

        let mut group: AsyncGroup<Canceled> = AsyncGroup::new();
        group.add_actor(cancel, 1);
        group.add(
            async {
                tokio::time::sleep(Duration::from_millis(10)).await;
                Ok(())
            },
            |_| {},
            0,
        );

        assert_eq!(group.run().await, Ok(()));
        assert!(handle.is_stopped());
    }
}
