//! Round plans: what to submit, what to wait for, what to do on a match.

use rand::Rng;
use serde_json::{Map, Value};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::client::InvokeRequest;
use crate::config::WorkflowConfig;
use crate::engine::types::{EngineError, EngineResult};
use crate::envelope::EventConfirmation;

/// Drives the correlation loop.
pub trait RoundPlan {
    /// Action to submit for round `round` (zero-based).
    fn next_action(&mut self, round: u64) -> InvokeRequest;

    /// Event name that confirms an action from `next_action`.
    fn expected_event(&self) -> &str;

    /// Dependent action built from a matched event.
    fn follow_up(&mut self, event: &EventConfirmation) -> EngineResult<InvokeRequest>;
}

/// Update a source contract, then record each confirmed update in an audit log.
#[derive(Debug, Clone)]
pub struct AuditLogPlan {
    source_target: String,
    audit_target: String,
    update_method: String,
    expected_event: String,
    audit_method: String,
}

impl AuditLogPlan {
    pub fn new(workflow: &WorkflowConfig, source_target: impl Into<String>, audit_target: impl Into<String>) -> Self {
        Self {
            source_target: source_target.into(),
            audit_target: audit_target.into(),
            update_method: workflow.update_method.clone(),
            expected_event: workflow.expected_event.clone(),
            audit_method: workflow.audit_method.clone(),
        }
    }
}

impl RoundPlan for AuditLogPlan {
    fn next_action(&mut self, _round: u64) -> InvokeRequest {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs();

        let mut params = Map::new();
        params.insert("incrValue".to_string(), Value::from(rand::thread_rng().gen_range(1..255u32)));
        params.insert("_note".to_string(), Value::from(format!("NewNote{}", now)));

        InvokeRequest {
            target: self.source_target.clone(),
            method: self.update_method.clone(),
            params,
        }
    }

    fn expected_event(&self) -> &str {
        &self.expected_event
    }

    fn follow_up(&mut self, event: &EventConfirmation) -> EngineResult<InvokeRequest> {
        let mut params = Map::new();
        params.insert("_newNote".to_string(), event_field(event, "newNote")?);
        params.insert("_changedBy".to_string(), event_field(event, "incrementedBy")?);
        params.insert("_incrementValue".to_string(), event_field(event, "incrementedValue")?);
        params.insert("_timestamp".to_string(), Value::from(event.ctime));

        Ok(InvokeRequest {
            target: self.audit_target.clone(),
            method: self.audit_method.clone(),
            params,
        })
    }
}

fn event_field(event: &EventConfirmation, field: &str) -> EngineResult<Value> {
    event
        .event_data
        .get(field)
        .cloned()
        .ok_or_else(|| EngineError::Payload { field: field.to_string() })
}
