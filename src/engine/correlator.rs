//! Foreground correlation engine.
//!
//! # Responsibilities
//! - Deployment phase: submit deploys, wait for every confirmation
//! - Correlation loop: submit an action, match its event, submit the follow-up
//! - Acknowledge every popped envelope exactly once
//! - Observe the shutdown flag at each wait return and before each submission

use std::time::{Duration, Instant};

use crate::channel::{NotificationReceiver, PopError};
use crate::client::{ActionClient, DeployRequest};
use crate::config::EngineConfig;
use crate::engine::pending::{ConfirmOutcome, PendingAction, PendingActions, PendingDeploymentSet};
use crate::engine::plan::RoundPlan;
use crate::engine::types::{
    CorrelationReport, CorrelationState, Deployment, DeploymentPhase, DropReason, EngineError,
    EngineResult, Handled, MatchRecord, StepOutcome,
};
use crate::envelope::{CorrelationKey, Envelope, EventConfirmation};
use crate::lifecycle::Shutdown;
use crate::observability::metrics;

/// Consumes the notification channel and correlates confirmations with
/// previously submitted actions.
///
/// Runs entirely on the calling thread. All correlation state lives here and
/// is never shared with the background subscriber.
pub struct CorrelationEngine<C: ActionClient> {
    client: C,
    inbox: NotificationReceiver,
    shutdown: Shutdown,
    config: EngineConfig,
    pending: PendingActions,
    /// Actions submitted by the correlation loop.
    submitted: u64,
    /// Dependent actions submitted.
    completed: u64,
}

impl<C: ActionClient> CorrelationEngine<C> {
    pub fn new(client: C, inbox: NotificationReceiver, shutdown: Shutdown, config: EngineConfig) -> Self {
        Self {
            client,
            inbox,
            shutdown,
            config,
            pending: PendingActions::new(),
            submitted: 0,
            completed: 0,
        }
    }

    /// Submit every deployment and block until all of them are confirmed.
    ///
    /// Confirmations may arrive in any order. A deployment whose response
    /// carried no target picks it up from its confirmation when present.
    pub fn deploy(&mut self, requests: &[DeployRequest]) -> EngineResult<Vec<Deployment>> {
        let mut set = PendingDeploymentSet::new();
        let mut deployments = Vec::with_capacity(requests.len());

        for request in requests {
            self.ensure_running()?;
            let submission = self.client.deploy(request)?;
            metrics::record_action_submitted("deploy");
            tracing::info!(label = %request.label, key = %submission.key, "Deployment submitted");

            set.insert(submission.key.clone(), request.label.clone());
            deployments.push(Deployment {
                label: request.label.clone(),
                key: submission.key,
                target: submission.target,
            });
        }

        let mut phase = if set.is_complete() {
            DeploymentPhase::AllConfirmed
        } else {
            DeploymentPhase::Waiting
        };

        while phase == DeploymentPhase::Waiting {
            let Some(envelope) = self.next_envelope()? else {
                tracing::trace!(remaining = set.remaining(), "Waiting for deployment confirmations");
                continue;
            };

            match &envelope {
                Envelope::DeploymentConfirmation(confirmation) => match set.confirm(&confirmation.key) {
                    ConfirmOutcome::Confirmed(label) => {
                        if let Some(deployment) = deployments
                            .iter_mut()
                            .find(|d| d.key == confirmation.key && d.target.is_none())
                        {
                            deployment.target = confirmation.target.clone();
                        }
                        metrics::record_deployment_confirmed();
                        tracing::info!(
                            label = %label,
                            key = %confirmation.key,
                            remaining = set.remaining(),
                            "Deployment confirmed"
                        );
                    }
                    ConfirmOutcome::AlreadyConfirmed => {
                        self.record_drop(&envelope, DropReason::AlreadyConsumed);
                    }
                    ConfirmOutcome::Unknown => {
                        self.record_drop(&envelope, DropReason::UnknownKey);
                    }
                },
                Envelope::EventConfirmation(_) => {
                    self.record_drop(&envelope, DropReason::WrongKind);
                }
                Envelope::Unrecognized { .. } => {
                    self.record_drop(&envelope, DropReason::Unrecognized);
                }
            }
            self.inbox.acknowledge();

            if set.is_complete() {
                phase = DeploymentPhase::AllConfirmed;
            }
        }

        tracing::info!(count = deployments.len(), "All deployments confirmed");
        Ok(deployments)
    }

    /// One iteration of the correlation loop.
    ///
    /// Submits the plan's next action if a slot is free and rounds remain,
    /// then waits up to `poll_interval_ms` for one envelope and handles it.
    pub fn step<P: RoundPlan>(&mut self, plan: &mut P) -> EngineResult<StepOutcome> {
        let mut outcome = StepOutcome::default();

        if self.pending.len() < self.config.max_in_flight && self.rounds_remaining() {
            self.ensure_running()?;
            let action = plan.next_action(self.submitted);
            let submission = self.client.invoke(&action)?;
            metrics::record_action_submitted("invoke");

            let pending = PendingAction {
                round: self.submitted,
                method: action.method,
                submitted_at: Instant::now(),
            };
            if !self.pending.insert(submission.key.clone(), pending) {
                tracing::error!(key = %submission.key, "Submitted action reused a known key");
                return Err(EngineError::DuplicateKey(submission.key));
            }
            tracing::info!(round = self.submitted, key = %submission.key, "Action submitted");
            self.submitted += 1;
            outcome.submitted = Some(submission.key);
        }

        let Some(envelope) = self.next_envelope()? else {
            return Ok(outcome);
        };
        let handled = self.correlate(plan, &envelope);
        self.inbox.acknowledge();
        outcome.handled = handled?;
        Ok(outcome)
    }

    /// Step until `rounds` dependent actions have been submitted.
    ///
    /// With `rounds = 0` this only returns on error or interruption.
    pub fn run<P: RoundPlan>(&mut self, plan: &mut P) -> EngineResult<CorrelationReport> {
        let mut report = CorrelationReport::default();

        while self.config.rounds == 0 || self.completed < self.config.rounds {
            let outcome = self.step(plan)?;
            match outcome.handled {
                Handled::Matched { key, follow_up } => report.matches.push(MatchRecord { key, follow_up }),
                Handled::Dropped(_) => report.dropped += 1,
                Handled::Empty => {}
            }
        }

        tracing::info!(
            rounds = report.matches.len(),
            dropped = report.dropped,
            "Correlation loop finished"
        );
        Ok(report)
    }

    /// Current correlation state.
    pub fn state(&self) -> CorrelationState {
        if self.pending.is_empty() {
            CorrelationState::Idle
        } else {
            CorrelationState::AwaitingMatch(self.pending.keys())
        }
    }

    /// Dependent actions submitted so far.
    pub fn completed(&self) -> u64 {
        self.completed
    }

    /// The injected client.
    pub fn client(&self) -> &C {
        &self.client
    }

    fn rounds_remaining(&self) -> bool {
        self.config.rounds == 0 || self.submitted < self.config.rounds
    }

    fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.config.poll_interval_ms)
    }

    fn ensure_running(&self) -> EngineResult<()> {
        if self.shutdown.is_triggered() {
            Err(EngineError::Interrupted)
        } else {
            Ok(())
        }
    }

    /// Wait for the next envelope. `None` means the wait timed out.
    ///
    /// An envelope popped after shutdown was requested is acknowledged and
    /// discarded.
    fn next_envelope(&mut self) -> EngineResult<Option<Envelope>> {
        self.ensure_running()?;
        match self.inbox.pop(Some(self.poll_interval())) {
            Ok(envelope) => {
                if self.shutdown.is_triggered() {
                    self.inbox.acknowledge();
                    return Err(EngineError::Interrupted);
                }
                Ok(Some(envelope))
            }
            Err(PopError::Empty) => {
                self.ensure_running()?;
                Ok(None)
            }
            Err(PopError::Disconnected) => {
                self.ensure_running()?;
                Err(EngineError::ChannelClosed)
            }
        }
    }

    fn correlate<P: RoundPlan>(&mut self, plan: &mut P, envelope: &Envelope) -> EngineResult<Handled> {
        let event = match envelope {
            Envelope::EventConfirmation(event) if event.event_name == plan.expected_event() => event,
            Envelope::Unrecognized { .. } => return Ok(self.record_drop(envelope, DropReason::Unrecognized)),
            _ => return Ok(self.record_drop(envelope, DropReason::WrongKind)),
        };

        let action = match self.pending.take(&event.key) {
            Ok(action) => action,
            Err(reason) => return Ok(self.record_drop(envelope, reason)),
        };
        metrics::record_correlation_matched();
        tracing::info!(
            round = action.round,
            key = %event.key,
            elapsed_ms = action.submitted_at.elapsed().as_millis() as u64,
            "Action confirmed"
        );

        let follow_up = self.submit_follow_up(plan, event)?;
        Ok(Handled::Matched {
            key: event.key.clone(),
            follow_up,
        })
    }

    fn submit_follow_up<P: RoundPlan>(
        &mut self,
        plan: &mut P,
        event: &EventConfirmation,
    ) -> EngineResult<CorrelationKey> {
        self.ensure_running()?;
        let request = plan.follow_up(event)?;
        let submission = self.client.invoke(&request)?;
        metrics::record_action_submitted("follow_up");
        self.completed += 1;
        tracing::info!(
            key = %event.key,
            follow_up = %submission.key,
            method = %request.method,
            "Dependent action submitted"
        );
        Ok(submission.key)
    }

    fn record_drop(&self, envelope: &Envelope, reason: DropReason) -> Handled {
        metrics::record_envelope_dropped(reason.as_str());
        tracing::debug!(
            kind = envelope.kind().as_str(),
            key = ?envelope.correlation_key().map(|k| k.as_str()),
            reason = reason.as_str(),
            "Envelope dropped"
        );
        Handled::Dropped(reason)
    }
}
