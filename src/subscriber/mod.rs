//! Stream subscriber subsystem.
//!
//! # Data Flow
//! ```text
//! WebSocket feed
//!     → stream.rs (connect, register, read frames)
//!     → protocol.rs (ack / heartbeat / envelope)
//!     → channel::NotificationSender::push
//! ```
//!
//! The subscriber runs inside the background runtime owned by
//! `lifecycle::ShutdownCoordinator`; it never touches correlation state.

pub mod protocol;
pub mod stream;
pub mod types;

pub use stream::StreamSubscriber;
pub use types::{StreamError, StreamResult};
