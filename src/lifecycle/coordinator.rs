//! Background worker startup and coordinated shutdown.
//!
//! # Responsibilities
//! - Start the stream subscriber on its own thread and current-thread runtime
//! - Install termination signal handlers before the foreground starts work
//! - On a signal: set the shutdown flag, cancel outstanding tasks, stop the runtime
//! - Join the background thread with a deadline
//!
//! # Design Decisions
//! - The foreground never receives a signal directly; it observes the flag
//! - Cancelling a task that already finished is not an error
//! - A join that misses its deadline is fatal and reported, never retried

use crossbeam_channel::{bounded, RecvTimeoutError};
use std::io;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use thiserror::Error;
use tokio::task::JoinSet;

use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::TerminationSignals;
use crate::subscriber::StreamSubscriber;

/// Name given to the background thread.
pub const SUBSCRIBER_THREAD_NAME: &str = "txbridge-subscriber";

/// Failures of the startup/unwind protocol itself.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The OS refused to spawn the background thread.
    #[error("Failed to spawn background thread: {0}")]
    Spawn(#[source] io::Error),

    /// Runtime or signal handlers could not be set up.
    #[error("Background startup failed: {0}")]
    Startup(String),

    /// The background thread did not stop in time.
    #[error("Background subscriber did not stop within {} seconds", .0.as_secs())]
    JoinTimeout(Duration),

    /// The background thread panicked.
    #[error("Background subscriber panicked")]
    Panicked,
}

/// Result type for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

/// Owns the background subscriber thread.
pub struct ShutdownCoordinator {
    shutdown: Shutdown,
    handle: JoinHandle<()>,
    done_rx: crossbeam_channel::Receiver<()>,
}

impl ShutdownCoordinator {
    /// Spawn the background thread and wait until its signal handlers are live.
    pub fn start(subscriber: StreamSubscriber, shutdown: Shutdown) -> LifecycleResult<Self> {
        let (ready_tx, ready_rx) = bounded::<io::Result<()>>(1);
        // Never sent on: the sender is dropped when the thread exits, panics included.
        let (done_tx, done_rx) = bounded::<()>(1);

        let background_shutdown = shutdown.clone();
        let handle = thread::Builder::new()
            .name(SUBSCRIBER_THREAD_NAME.to_string())
            .spawn(move || {
                let _done = done_tx;
                run_background(subscriber, background_shutdown, ready_tx);
            })
            .map_err(LifecycleError::Spawn)?;

        let ready = ready_rx.recv();
        match ready {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                let _ = handle.join();
                return Err(LifecycleError::Startup(e.to_string()));
            }
            Err(_) => {
                let _ = handle.join();
                return Err(LifecycleError::Startup(
                    "background thread exited before reporting readiness".to_string(),
                ));
            }
        }

        tracing::info!(thread = SUBSCRIBER_THREAD_NAME, "Background subscriber started");

        Ok(Self {
            shutdown,
            handle,
            done_rx,
        })
    }

    /// Whether the background thread has exited.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Set the shutdown flag, then join with `timeout`.
    pub fn shutdown(self, timeout: Duration) -> LifecycleResult<()> {
        self.shutdown.trigger();
        self.join(timeout)
    }

    /// Block until the background thread terminates, at most `timeout`.
    pub fn join(self, timeout: Duration) -> LifecycleResult<()> {
        tracing::info!(timeout_secs = timeout.as_secs(), "Waiting for stream subscriber to stop");

        match self.done_rx.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {}
            Err(RecvTimeoutError::Timeout) => {
                tracing::error!(
                    timeout_secs = timeout.as_secs(),
                    "Stream subscriber did not stop; connection or cancellation failed to unwind"
                );
                return Err(LifecycleError::JoinTimeout(timeout));
            }
        }

        self.handle.join().map_err(|_| LifecycleError::Panicked)?;
        tracing::info!("Stream subscriber joined");
        Ok(())
    }
}

fn run_background(
    subscriber: StreamSubscriber,
    shutdown: Shutdown,
    ready_tx: crossbeam_channel::Sender<io::Result<()>>,
) {
    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(rt) => rt,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    runtime.block_on(async move {
        let mut signals = match TerminationSignals::install() {
            Ok(signals) => signals,
            Err(e) => {
                let _ = ready_tx.send(Err(e));
                return;
            }
        };

        let mut tasks = JoinSet::new();
        tasks.spawn(subscriber.run());
        let _ = ready_tx.send(Ok(()));

        tokio::select! {
            signal = signals.recv() => {
                tracing::info!(signal = %signal, "Termination signal received");
                shutdown.trigger();
            }
            _ = shutdown.wait() => {
                tracing::debug!("Shutdown requested by foreground");
            }
        }

        let cancelled = cancel_outstanding(&mut tasks).await;
        tracing::debug!(tasks = cancelled, "Background tasks cancelled");
    });
}

/// Abort every task in `tasks` and wait for all of them to finish.
///
/// Safe to call repeatedly and on tasks that already completed.
pub async fn cancel_outstanding(tasks: &mut JoinSet<()>) -> usize {
    let outstanding = tasks.len();
    tasks.abort_all();
    while let Some(result) = tasks.join_next().await {
        match result {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => tracing::error!(error = %e, "Background task panicked"),
        }
    }
    outstanding
}
