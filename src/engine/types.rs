//! Engine states, outcomes and error definitions.

use thiserror::Error;

use crate::client::ActionError;
use crate::envelope::CorrelationKey;

/// Errors that end a deployment phase or correlation loop.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Shutdown was requested. Not a failure: callers match on it once at the top.
    #[error("Interrupted by shutdown")]
    Interrupted,

    /// An external action could not be submitted. Never retried here.
    #[error(transparent)]
    Action(#[from] ActionError),

    /// A matched event lacked a field the follow-up needs.
    #[error("Event payload missing field '{field}'")]
    Payload { field: String },

    /// A deployment produced no target identifier.
    #[error("Deployment '{0}' returned no target")]
    MissingTarget(String),

    /// The client returned a key that is already pending or was matched before.
    /// Nothing could ever confirm the new action.
    #[error("Action key '{0}' was already in use")]
    DuplicateKey(CorrelationKey),

    /// Every notification producer is gone.
    #[error("Notification channel closed")]
    ChannelClosed,
}

impl EngineError {
    /// Whether this is the shutdown control-flow signal rather than a failure.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, EngineError::Interrupted)
    }
}

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Why an envelope was discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DropReason {
    /// `type` the engine does not know.
    Unrecognized,
    /// Known kind, but not the one being waited for.
    WrongKind,
    /// Key not pending.
    UnknownKey,
    /// Key already matched once.
    AlreadyConsumed,
}

impl DropReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DropReason::Unrecognized => "unrecognized",
            DropReason::WrongKind => "wrong_kind",
            DropReason::UnknownKey => "unknown_key",
            DropReason::AlreadyConsumed => "already_consumed",
        }
    }
}

/// Deployment phase state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeploymentPhase {
    Waiting,
    AllConfirmed,
}

/// Correlation loop state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorrelationState {
    /// Nothing outstanding.
    Idle,
    /// Keys awaiting their confirmation, oldest first.
    AwaitingMatch(Vec<CorrelationKey>),
}

/// What happened to the envelope handled in one step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Handled {
    /// The wait timed out.
    #[default]
    Empty,
    /// A pending key was confirmed and its follow-up submitted.
    Matched {
        key: CorrelationKey,
        follow_up: CorrelationKey,
    },
    /// The envelope was discarded.
    Dropped(DropReason),
}

/// Result of one correlation step.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StepOutcome {
    /// Key of the action submitted during this step, if any.
    pub submitted: Option<CorrelationKey>,
    pub handled: Handled,
}

/// A submitted deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deployment {
    pub label: String,
    pub key: CorrelationKey,
    pub target: Option<String>,
}

impl Deployment {
    /// The target identifier, or an error naming the deployment.
    pub fn require_target(&self) -> EngineResult<&str> {
        self.target
            .as_deref()
            .ok_or_else(|| EngineError::MissingTarget(self.label.clone()))
    }
}

/// One completed round-trip.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub key: CorrelationKey,
    pub follow_up: CorrelationKey,
}

/// Summary returned by `CorrelationEngine::run`.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CorrelationReport {
    pub matches: Vec<MatchRecord>,
    pub dropped: u64,
}
