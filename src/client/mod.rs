//! External action submission.
//!
//! # Data Flow
//! ```text
//! Environment variables (API key)
//!     → http.rs (blocking REST calls with timeout)
//!     → types.rs (Submission { key, target })
//!     → engine (records the key, waits for its confirmation)
//! ```
//!
//! # Design Decisions
//! - The client is injected into the engine; there is no process-wide instance
//! - Calls block the foreground thread; nothing else runs there meanwhile
//! - Errors propagate as-is: no retries, no failover

pub mod http;
pub mod types;

pub use http::HttpActionClient;
pub use types::{
    ActionClient, ActionError, ActionResult, DeployRequest, InvokeRequest, Submission,
};
