//! Frame decoding.

use serde_json::Value;
use thiserror::Error;

use crate::envelope::types::{DeploymentConfirmation, Envelope, EventConfirmation};

/// Wire `type` values that carry a deployment confirmation.
pub const DEPLOYMENT_TYPES: &[&str] = &["contractmon", "otm"];

/// Wire `type` value for event notifications.
pub const EVENT_TYPE: &str = "event";

/// Reasons a frame could not become an [`Envelope`].
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Payload is not valid JSON.
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Payload is JSON but not an object.
    #[error("expected a JSON object, got {0}")]
    NotAnObject(&'static str),

    /// Recognised `type` whose fields do not match.
    #[error("malformed '{kind}' frame: {source}")]
    Fields {
        kind: String,
        #[source]
        source: serde_json::Error,
    },
}

impl Envelope {
    /// Decode a text frame.
    pub fn decode(text: &str) -> Result<Self, DecodeError> {
        let value: Value = serde_json::from_str(text)?;
        Self::from_value(value)
    }

    /// Decode an already-parsed JSON value.
    pub fn from_value(value: Value) -> Result<Self, DecodeError> {
        if !value.is_object() {
            return Err(DecodeError::NotAnObject(json_type_name(&value)));
        }

        let kind = value.get("type").and_then(Value::as_str).map(str::to_owned);

        match kind.as_deref() {
            Some(k) if DEPLOYMENT_TYPES.contains(&k) => {
                serde_json::from_value::<DeploymentConfirmation>(value)
                    .map(Envelope::DeploymentConfirmation)
                    .map_err(|source| DecodeError::Fields { kind: k.to_string(), source })
            }
            Some(EVENT_TYPE) => serde_json::from_value::<EventConfirmation>(value)
                .map(Envelope::EventConfirmation)
                .map_err(|source| DecodeError::Fields {
                    kind: EVENT_TYPE.to_string(),
                    source,
                }),
            _ => Ok(Envelope::Unrecognized { kind, body: value }),
        }
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
