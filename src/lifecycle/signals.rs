//! OS signal handling.
//!
//! # Responsibilities
//! - Register signal handlers (SIGHUP, SIGTERM, SIGINT)
//! - Report which signal arrived
//! - After shutdown has begun, hand a repeated signal to an escape hatch
//!
//! # Design Decisions
//! - Uses Tokio's signal handling (async-safe)
//! - All three signals mean "shut down"; none is treated differently
//! - Handlers are installed up front so a failure surfaces at startup
//! - The repeat listener runs on its own thread and outlives the background
//!   runtime

use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};

use crate::lifecycle::shutdown::Shutdown;

/// Name given to the repeat-signal listener thread.
pub const REPEAT_LISTENER_THREAD_NAME: &str = "txbridge-signal-repeat";

/// A recognised termination signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Hangup,
    Terminate,
    Interrupt,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TerminationSignal::Hangup => "SIGHUP",
            TerminationSignal::Terminate => "SIGTERM",
            TerminationSignal::Interrupt => "SIGINT",
        };
        f.write_str(name)
    }
}

/// Installed termination signal listeners.
///
/// Must be created inside a Tokio runtime.
#[cfg(unix)]
pub struct TerminationSignals {
    hangup: tokio::signal::unix::Signal,
    terminate: tokio::signal::unix::Signal,
    interrupt: tokio::signal::unix::Signal,
}

#[cfg(unix)]
impl TerminationSignals {
    /// Install listeners for hangup, terminate and interrupt.
    pub fn install() -> io::Result<Self> {
        use tokio::signal::unix::{signal, SignalKind};

        Ok(Self {
            hangup: signal(SignalKind::hangup())?,
            terminate: signal(SignalKind::terminate())?,
            interrupt: signal(SignalKind::interrupt())?,
        })
    }

    /// Wait for the next termination signal.
    pub async fn recv(&mut self) -> TerminationSignal {
        tokio::select! {
            _ = self.hangup.recv() => TerminationSignal::Hangup,
            _ = self.terminate.recv() => TerminationSignal::Terminate,
            _ = self.interrupt.recv() => TerminationSignal::Interrupt,
        }
    }
}

/// Installed termination signal listeners (Ctrl-C only off Unix).
#[cfg(not(unix))]
pub struct TerminationSignals {
    _private: (),
}

#[cfg(not(unix))]
impl TerminationSignals {
    pub fn install() -> io::Result<Self> {
        Ok(Self { _private: () })
    }

    pub async fn recv(&mut self) -> TerminationSignal {
        match tokio::signal::ctrl_c().await {
            Ok(()) => TerminationSignal::Interrupt,
            Err(e) => {
                tracing::error!(error = %e, "Ctrl-C listener failed");
                std::future::pending().await
            }
        }
    }
}

/// Call `on_repeat` with the first termination signal received after
/// `shutdown` has been triggered.
///
/// Listeners are installed only once shutdown has begun, so the signal that
/// started it is not seen again. The thread is detached in practice: it
/// parks until a signal arrives or the process exits.
pub fn spawn_repeat_listener<F>(shutdown: Shutdown, on_repeat: F) -> io::Result<JoinHandle<()>>
where
    F: FnOnce(TerminationSignal) + Send + 'static,
{
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    thread::Builder::new()
        .name(REPEAT_LISTENER_THREAD_NAME.to_string())
        .spawn(move || {
            runtime.block_on(async move {
                shutdown.wait().await;
                let mut signals = match TerminationSignals::install() {
                    Ok(signals) => signals,
                    Err(e) => {
                        tracing::warn!(error = %e, "Repeat signal listener unavailable");
                        return;
                    }
                };
                let signal = signals.recv().await;
                tracing::warn!(signal = %signal, "Termination signal repeated during shutdown");
                on_repeat(signal);
            });
        })
}
