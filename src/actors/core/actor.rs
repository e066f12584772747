use async_trait::async_trait;
use std::sync::Arc;

// ============================================================================
// Actor Capability Traits
// ============================================================================
//
// An actor is an execute/interrupt pair. The group runs `execute` on its own
// thread (or task) and calls `interrupt` from the thread driving the group,
// so both methods take `&self` and implementors must be `Send + Sync`.
//
// ============================================================================

/// A blocking unit of work managed by a [`Group`](crate::Group).
pub trait Actor<E>: Send + Sync {
    /// Name used in logs, health reports and metric labels.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Run until the work finishes or [`interrupt`](Actor::interrupt) forces a return.
    fn execute(&self) -> Result<(), E>;

    /// Ask `execute` to return.
    ///
    /// `cause` is the failure of the actor that triggered shutdown, or `None`
    /// when it finished cleanly. Called exactly once per run, possibly after
    /// `execute` has already returned.
    fn interrupt(&self, cause: Option<&E>);
}

/// Async counterpart of [`Actor`], run by an [`AsyncGroup`](crate::AsyncGroup).
#[async_trait]
pub trait AsyncActor<E>: Send + Sync
where
    E: Send + 'static,
{
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn execute(&self) -> Result<(), E>;

    fn interrupt(&self, cause: Option<&E>);
}

impl<E, T> Actor<E> for &T
where
    T: Actor<E> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    fn execute(&self) -> Result<(), E> {
        (**self).execute()
    }

    fn interrupt(&self, cause: Option<&E>) {
        (**self).interrupt(cause)
    }
}

#[async_trait]
impl<E, T> AsyncActor<E> for Arc<T>
where
    E: Send + 'static,
    T: AsyncActor<E> + ?Sized,
{
    fn name(&self) -> &str {
        (**self).name()
    }

    async fn execute(&self) -> Result<(), E> {
        (**self).execute().await
    }

    fn interrupt(&self, cause: Option<&E>) {
        (**self).interrupt(cause)
    }
}
