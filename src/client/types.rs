//! Action submission types and error definitions.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::envelope::CorrelationKey;

/// Errors that can occur while submitting an external action.
#[derive(Debug, Error)]
pub enum ActionError {
    /// Transport failure or non-success HTTP status.
    #[error("API request failed: {0}")]
    Request(String),

    /// Request did not complete in time.
    #[error("API timeout after {0} seconds")]
    Timeout(u64),

    /// The API reported failure in its response body.
    #[error("API rejected action: {0}")]
    Rejected(String),

    /// Response did not contain a correlation key.
    #[error("API response missing correlation key")]
    MissingKey,

    /// Local input (e.g. contract source) could not be read.
    #[error("Invalid action input: {0}")]
    Input(String),

    /// Credentials are not available.
    #[error("Credentials not available: {0}")]
    Credentials(String),
}

/// Result type for action submission.
pub type ActionResult<T> = Result<T, ActionError>;

/// Deploy a new target (contract).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployRequest {
    /// Human label used in logs, e.g. "source" or "audit".
    pub label: String,
    /// Contract name as known to the API.
    pub contract_name: String,
    /// Optional path to the contract source.
    pub source_path: Option<String>,
    /// Constructor inputs.
    pub inputs: Map<String, Value>,
}

/// Call a method on a deployed target.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvokeRequest {
    /// Target identifier (contract address).
    pub target: String,
    /// Method name.
    pub method: String,
    /// Named parameters.
    pub params: Map<String, Value>,
}

/// What the API hands back for an accepted action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Submission {
    /// Key the confirmation will carry.
    pub key: CorrelationKey,
    /// Deployed target, for deploy actions.
    pub target: Option<String>,
}

/// Blocking "submit an action, get back a correlation key" service.
///
/// Implementations must not retry on their own: a retried submission may
/// produce a duplicate action.
pub trait ActionClient {
    /// Submit a deployment.
    fn deploy(&self, request: &DeployRequest) -> ActionResult<Submission>;

    /// Submit a method call.
    fn invoke(&self, request: &InvokeRequest) -> ActionResult<Submission>;
}

impl<C: ActionClient + ?Sized> ActionClient for &C {
    fn deploy(&self, request: &DeployRequest) -> ActionResult<Submission> {
        (**self).deploy(request)
    }

    fn invoke(&self, request: &InvokeRequest) -> ActionResult<Submission> {
        (**self).invoke(request)
    }
}

impl<C: ActionClient + ?Sized> ActionClient for Box<C> {
    fn deploy(&self, request: &DeployRequest) -> ActionResult<Submission> {
        (**self).deploy(request)
    }

    fn invoke(&self, request: &InvokeRequest) -> ActionResult<Submission> {
        (**self).invoke(request)
    }
}
