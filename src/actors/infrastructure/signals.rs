use async_trait::async_trait;
use futures_util::future::BoxFuture;
use futures_util::stream::{FuturesUnordered, StreamExt};
use futures_util::FutureExt;
use std::fmt;
use tokio::sync::Notify;

use super::blocking_runtime;
use crate::actors::{Actor, AsyncActor};

// ============================================================================
// Signal Listener Actor
// ============================================================================
//
// Waits for an OS signal. Receiving one ends execute with an error so the
// whole group shuts down; an interrupt ends it cleanly.
//
// ============================================================================

/// Signals the listener can wait for. Off unix only `Interrupt` (Ctrl-C)
/// is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Terminate,
    Hangup,
    Quit,
}

impl fmt::Display for Signal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Signal::Interrupt => "SIGINT",
            Signal::Terminate => "SIGTERM",
            Signal::Hangup => "SIGHUP",
            Signal::Quit => "SIGQUIT",
        };
        f.write_str(name)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    #[error("received signal {0}")]
    Received(Signal),

    #[error("failed to install handler for {signal}: {source}")]
    Install {
        signal: Signal,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to start signal runtime: {0}")]
    Runtime(#[source] std::io::Error),
}

impl SignalError {
    /// The signal that ended the listener, if that is what happened.
    pub fn signal(&self) -> Option<Signal> {
        match self {
            SignalError::Received(signal) => Some(*signal),
            _ => None,
        }
    }
}

pub struct Signals {
    signals: Vec<Signal>,
    stop: Notify,
}

impl Signals {
    pub fn new(signals: impl IntoIterator<Item = Signal>) -> Self {
        Self {
            signals: signals.into_iter().collect(),
            stop: Notify::new(),
        }
    }

    /// SIGINT and SIGTERM, the usual pair for a service.
    pub fn shutdown() -> Self {
        Self::new([Signal::Interrupt, Signal::Terminate])
    }

    pub fn signals(&self) -> &[Signal] {
        &self.signals
    }

    async fn wait(&self) -> Result<(), SignalError> {
        let mut listeners = FuturesUnordered::new();
        for signal in &self.signals {
            if let Some(listener) = listen(*signal)? {
                listeners.push(listener);
            }
        }

        tracing::info!(signals = ?self.signals, "Listening for signals");

        tokio::select! {
            Some(signal) = listeners.next() => {
                tracing::info!(signal = %signal, "Received signal");
                Err(SignalError::Received(signal))
            }
            _ = self.stop.notified() => {
                tracing::debug!("Signal listener interrupted");
                Ok(())
            }
        }
    }
}

#[cfg(unix)]
fn listen(signal: Signal) -> Result<Option<BoxFuture<'static, Signal>>, SignalError> {
    use tokio::signal::unix::{signal as unix_signal, SignalKind};

    let kind = match signal {
        Signal::Interrupt => SignalKind::interrupt(),
        Signal::Terminate => SignalKind::terminate(),
        Signal::Hangup => SignalKind::hangup(),
        Signal::Quit => SignalKind::quit(),
    };
    let mut stream = unix_signal(kind).map_err(|source| SignalError::Install { signal, source })?;

    Ok(Some(
        async move {
            stream.recv().await;
            signal
        }
        .boxed(),
    ))
}

#[cfg(not(unix))]
fn listen(signal: Signal) -> Result<Option<BoxFuture<'static, Signal>>, SignalError> {
    match signal {
        Signal::Interrupt => Ok(Some(
            async move {
                let _ = tokio::signal::ctrl_c().await;
                signal
            }
            .boxed(),
        )),
        other => {
            tracing::warn!(signal = %other, "Signal not supported on this platform");
            Ok(None)
        }
    }
}

impl<E> Actor<E> for Signals
where
    E: From<SignalError>,
{
    fn name(&self) -> &str {
        "signals"
    }

    fn execute(&self) -> Result<(), E> {
        let runtime = blocking_runtime().map_err(SignalError::Runtime)?;
        runtime.block_on(self.wait()).map_err(E::from)
    }

    fn interrupt(&self, _cause: Option<&E>) {
        self.stop.notify_one();
    }
}

#[async_trait]
impl<E> AsyncActor<E> for Signals
where
    E: From<SignalError> + Send + 'static,
{
    fn name(&self) -> &str {
        "signals"
    }

    async fn execute(&self) -> Result<(), E> {
        self.wait().await.map_err(E::from)
    }

    fn interrupt(&self, _cause: Option<&E>) {
        self.stop.notify_one();
    }
}
