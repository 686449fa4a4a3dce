//! Transaction correlation engine.
//!
//! # Data Flow
//! ```text
//! Deployment phase:
//!     deploy actions → PendingDeploymentSet → DeploymentConfirmation* → ALL_CONFIRMED
//!
//! Correlation loop (per round):
//!     IDLE → plan.next_action → AWAITING_MATCH(key)
//!          → EventConfirmation(key, expected event) → plan.follow_up → IDLE
//! ```
//!
//! # Design Decisions
//! - Matching is by correlation key only, never by position in the stream
//! - A key is matched at most once; repeats are dropped and counted
//! - Non-matching envelopes are acknowledged and discarded, never requeued
//! - Shutdown surfaces as `EngineError::Interrupted`, checked at every wait return

pub mod correlator;
pub mod pending;
pub mod plan;
pub mod types;

pub use correlator::CorrelationEngine;
pub use pending::{ConfirmOutcome, PendingAction, PendingActions, PendingDeploymentSet};
pub use plan::{AuditLogPlan, RoundPlan};
pub use types::{
    CorrelationReport, CorrelationState, Deployment, DeploymentPhase, DropReason, EngineError,
    EngineResult, Handled, MatchRecord, StepOutcome,
};
