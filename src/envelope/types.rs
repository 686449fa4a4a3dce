//! Envelope and correlation key types.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Opaque identifier linking a submitted action to its confirmation.
///
/// Compared by exact string equality. No normalisation is applied.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationKey(String);

impl CorrelationKey {
    /// Wrap a raw key.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// The raw key.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CorrelationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CorrelationKey {
    fn from(key: &str) -> Self {
        Self(key.to_string())
    }
}

impl From<String> for CorrelationKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

/// Confirmation that a deployment action was mined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "DeploymentFrame")]
pub struct DeploymentConfirmation {
    /// Key of the deploying action.
    #[serde(rename = "txHash")]
    pub key: CorrelationKey,
    /// Identifier of the deployed target, when the feed includes it.
    #[serde(rename = "contract", skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
}

/// Wire shape of a deployment frame. Feeds name the target `contract`,
/// `contractAddress` or `target`, sometimes more than one at once.
#[derive(Deserialize)]
struct DeploymentFrame {
    #[serde(rename = "txHash")]
    key: CorrelationKey,
    #[serde(default)]
    contract: Option<String>,
    #[serde(default, rename = "contractAddress")]
    contract_address: Option<String>,
    #[serde(default)]
    target: Option<String>,
}

impl From<DeploymentFrame> for DeploymentConfirmation {
    fn from(frame: DeploymentFrame) -> Self {
        Self {
            key: frame.key,
            target: frame.contract.or(frame.contract_address).or(frame.target),
        }
    }
}

/// Confirmation that an action emitted a named event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventConfirmation {
    /// Key of the action that emitted the event.
    #[serde(rename = "txHash")]
    pub key: CorrelationKey,
    /// Event name, e.g. `ContractIncremented`.
    pub event_name: String,
    /// Free-form event payload.
    #[serde(default)]
    pub event_data: Map<String, Value>,
    /// Creation timestamp (seconds since epoch).
    pub ctime: i64,
}

/// One decoded unit from the notification stream.
#[derive(Debug, Clone, PartialEq)]
pub enum Envelope {
    /// `contractmon` / `otm` notifications.
    DeploymentConfirmation(DeploymentConfirmation),
    /// `event` notifications.
    EventConfirmation(EventConfirmation),
    /// Anything else. Passed through and ignored downstream.
    Unrecognized {
        /// The `type` field, if there was one.
        kind: Option<String>,
        /// The raw frame body.
        body: Value,
    },
}

/// Discriminant of an [`Envelope`], used for filtering and metric labels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EnvelopeKind {
    Deployment,
    Event,
    Unrecognized,
}

impl EnvelopeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EnvelopeKind::Deployment => "deployment",
            EnvelopeKind::Event => "event",
            EnvelopeKind::Unrecognized => "unrecognized",
        }
    }
}

impl Envelope {
    pub fn kind(&self) -> EnvelopeKind {
        match self {
            Envelope::DeploymentConfirmation(_) => EnvelopeKind::Deployment,
            Envelope::EventConfirmation(_) => EnvelopeKind::Event,
            Envelope::Unrecognized { .. } => EnvelopeKind::Unrecognized,
        }
    }

    /// Correlation key carried by the envelope, if any.
    pub fn correlation_key(&self) -> Option<&CorrelationKey> {
        match self {
            Envelope::DeploymentConfirmation(c) => Some(&c.key),
            Envelope::EventConfirmation(e) => Some(&e.key),
            Envelope::Unrecognized { .. } => None,
        }
    }
}
