//! Correlation bookkeeping: pending deployments and pending actions.

use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Instant;

use crate::engine::types::DropReason;
use crate::envelope::CorrelationKey;

/// How many consumed keys are remembered for duplicate detection.
pub const CONSUMED_HISTORY: usize = 1024;

/// Result of confirming a deployment key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Newly confirmed; carries the deployment label.
    Confirmed(String),
    /// Already confirmed earlier.
    AlreadyConfirmed,
    /// Not part of this set. Ignored.
    Unknown,
}

/// Keys that must all be confirmed before the deployment phase ends.
#[derive(Debug, Default)]
pub struct PendingDeploymentSet {
    members: HashMap<CorrelationKey, (String, bool)>,
}

impl PendingDeploymentSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an unconfirmed member.
    pub fn insert(&mut self, key: CorrelationKey, label: impl Into<String>) {
        self.members.insert(key, (label.into(), false));
    }

    /// Mark `key` confirmed. Unknown keys change nothing.
    pub fn confirm(&mut self, key: &CorrelationKey) -> ConfirmOutcome {
        match self.members.get_mut(key) {
            Some((_, true)) => ConfirmOutcome::AlreadyConfirmed,
            Some((label, confirmed)) => {
                *confirmed = true;
                ConfirmOutcome::Confirmed(label.clone())
            }
            None => ConfirmOutcome::Unknown,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.members.values().all(|(_, confirmed)| *confirmed)
    }

    /// Members still unconfirmed.
    pub fn remaining(&self) -> usize {
        self.members.values().filter(|(_, confirmed)| !confirmed).count()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

/// Metadata kept for an action awaiting confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    /// Zero-based submission index.
    pub round: u64,
    /// Method that was called.
    pub method: String,
    pub submitted_at: Instant,
}

/// Outstanding actions keyed by correlation key.
///
/// A key is matched at most once: `take` removes it and remembers it as
/// consumed, so a repeated confirmation is reported as such.
#[derive(Debug, Default)]
pub struct PendingActions {
    pending: HashMap<CorrelationKey, PendingAction>,
    consumed: HashSet<CorrelationKey>,
    consumed_order: VecDeque<CorrelationKey>,
}

impl PendingActions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a submitted action. Returns `false` if the key was already
    /// pending or consumed, in which case nothing changes.
    pub fn insert(&mut self, key: CorrelationKey, action: PendingAction) -> bool {
        if self.pending.contains_key(&key) || self.consumed.contains(&key) {
            return false;
        }
        self.pending.insert(key, action);
        true
    }

    /// Consume a pending key.
    pub fn take(&mut self, key: &CorrelationKey) -> Result<PendingAction, DropReason> {
        match self.pending.remove(key) {
            Some(action) => {
                self.remember_consumed(key.clone());
                Ok(action)
            }
            None if self.consumed.contains(key) => Err(DropReason::AlreadyConsumed),
            None => Err(DropReason::UnknownKey),
        }
    }

    /// Pending keys, oldest submission first.
    pub fn keys(&self) -> Vec<CorrelationKey> {
        let mut entries: Vec<_> = self.pending.iter().collect();
        entries.sort_by_key(|(_, action)| action.round);
        entries.into_iter().map(|(key, _)| key.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    fn remember_consumed(&mut self, key: CorrelationKey) {
        if self.consumed_order.len() == CONSUMED_HISTORY {
            if let Some(oldest) = self.consumed_order.pop_front() {
                self.consumed.remove(&oldest);
            }
        }
        self.consumed.insert(key.clone());
        self.consumed_order.push_back(key);
    }
}
