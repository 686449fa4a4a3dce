//! Notification feed wire protocol.
//!
//! ```text
//! client → {"command": "register", "key": <read key>}
//! server → {"command": "register:ack", "sessionID": <id>}
//! server → {"type": "heartbeat"}          client → {"command": "heartbeat", "sessionID": <id>}
//! server → {"type": "event" | "contractmon" | "otm" | ..., ...}
//! ```

use serde_json::{json, Value};

use crate::envelope::{DecodeError, Envelope};

/// Classified inbound frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Inbound {
    /// Registration accepted.
    RegisterAck { session_id: String },
    /// Server liveness probe; answered, never enqueued.
    Heartbeat,
    /// Anything destined for the engine.
    Envelope(Envelope),
}

/// Classify a text frame.
pub fn classify(text: &str) -> Result<Inbound, DecodeError> {
    let value: Value = serde_json::from_str(text)?;

    if value.get("command").and_then(Value::as_str) == Some("register:ack") {
        let session_id = match value.get("sessionID") {
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
            None => String::new(),
        };
        return Ok(Inbound::RegisterAck { session_id });
    }

    if value.get("type").and_then(Value::as_str) == Some("heartbeat") {
        return Ok(Inbound::Heartbeat);
    }

    Envelope::from_value(value).map(Inbound::Envelope)
}

/// Registration request sent right after connecting.
pub fn register_command(read_key: &str) -> String {
    json!({ "command": "register", "key": read_key }).to_string()
}

/// Reply to a server heartbeat.
pub fn heartbeat_command(session_id: &str) -> String {
    json!({ "command": "heartbeat", "sessionID": session_id }).to_string()
}
