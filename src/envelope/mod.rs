//! Notification envelopes.
//!
//! # Data Flow
//! ```text
//! WebSocket text frame
//!     → decode.rs (JSON → tagged Envelope)
//!     → channel (FIFO)
//!     → engine (match by correlation key)
//! ```
//!
//! # Design Decisions
//! - Envelopes are immutable once decoded; ownership moves, nothing is shared
//! - Unknown `type` values are not errors: they decode to `Unrecognized`
//! - A recognised `type` with missing fields is malformed and gets dropped

pub mod decode;
pub mod types;

pub use decode::DecodeError;
pub use types::{
    CorrelationKey, DeploymentConfirmation, Envelope, EnvelopeKind, EventConfirmation,
};
