//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (coordinator.rs):
//!     Spawn background thread → build runtime → install signals → report ready
//!
//! Signals (signals.rs):
//!     SIGHUP/SIGTERM/SIGINT → set shutdown flag → cancel background tasks
//!     repeated signal during shutdown → process exit (main.rs)
//!
//! Shutdown (shutdown.rs):
//!     Flag observed by the engine at its next wait → main joins the background
//!     thread with a deadline → exit
//! ```
//!
//! # Design Decisions
//! - Two contexts unwind independently: background by task cancellation,
//!   foreground by polling the flag
//! - Shutdown has timeout: a join past the deadline is a fatal error

pub mod coordinator;
pub mod shutdown;
pub mod signals;

pub use coordinator::{LifecycleError, LifecycleResult, ShutdownCoordinator};
pub use shutdown::Shutdown;
pub use signals::{spawn_repeat_listener, TerminationSignal, TerminationSignals};
