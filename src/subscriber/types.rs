//! Stream subscriber error definitions.

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// Errors that end a notification stream connection.
#[derive(Debug, Error)]
pub enum StreamError {
    /// WebSocket transport error.
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),

    /// Connection was not established in time.
    #[error("Connect timeout after {0} seconds")]
    ConnectTimeout(u64),

    /// No `register:ack` within the connect timeout.
    #[error("Registration not acknowledged after {0} seconds")]
    HandshakeTimeout(u64),

    /// Server closed the socket before acknowledging registration.
    #[error("Connection closed during registration handshake")]
    ClosedDuringHandshake,

    /// Registration is enabled but no read key was supplied.
    #[error("Registration enabled but no read key configured")]
    MissingReadKey,

    /// Nothing arrived after a ping.
    #[error("Stream unresponsive: no frame within {0} seconds of a ping")]
    Unresponsive(u64),
}

/// Result type for stream operations.
pub type StreamResult<T> = Result<T, StreamError>;
