//! Workflow orchestrator.
//!
//! Owns the session context and the last derived view, decides which actions
//! are offered, and turns every backend failure into state instead of an
//! error. The view is only ever replaced whole by a successful refresh.

use serde::Serialize;

use crate::chronicle::{ActionAck, ActionClient, Decision, LedgerClient};
use crate::core::{aggregate, replay_receipt, GateStates, GateStatus, ReadinessBundle};
use crate::error::{GatewatchError, Result};
use crate::policy::QuarantinePolicy;
use crate::workflow::session::{ActionKind, PendingAction, SessionContext};

/// Derived state shown to the operator.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WorkflowView {
    pub project_id: String,
    pub receipt_id: Option<String>,
    /// All pending when no receipt is selected.
    pub gates: GateStates,
    pub readiness: ReadinessBundle,
}

/// Result of submitting one action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The backend accepted the action.
    Accepted { ack: ActionAck },
    /// The backend refused the action; expected and recoverable.
    Rejected { message: String },
    /// The submission did not reach a decision.
    Failed { message: String },
    /// The session moved on before the response arrived.
    Discarded,
    /// Policy or gate state does not offer the action.
    NotOffered { reason: String },
}

impl ActionOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ActionOutcome::Accepted { .. })
    }
}

/// Coordinates fetch, derivation and submission for one operator session.
pub struct Orchestrator<L, A> {
    ledger: L,
    actions: A,
    policy: QuarantinePolicy,
    agent_id: String,
    session: SessionContext,
    view: Option<WorkflowView>,
    last_error: Option<String>,
}

impl<L: LedgerClient, A: ActionClient> Orchestrator<L, A> {
    /// Create an orchestrator; an invalid policy is rejected here.
    pub fn new(
        ledger: L,
        actions: A,
        policy: QuarantinePolicy,
        agent_id: impl Into<String>,
        session: SessionContext,
    ) -> Result<Self> {
        policy.ensure_valid()?;
        Ok(Self {
            ledger,
            actions,
            policy,
            agent_id: agent_id.into(),
            session,
            view: None,
            last_error: None,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn policy(&self) -> &QuarantinePolicy {
        &self.policy
    }

    /// The last successfully derived view.
    pub fn view(&self) -> Option<&WorkflowView> {
        self.view.as_ref()
    }

    /// The most recent user-visible error, cleared by the next success.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Switch to another receipt. In-flight responses for the old one are dropped.
    pub fn select_receipt(&mut self, receipt_id: impl Into<String>) {
        self.session.receipt_id = Some(receipt_id.into());
        self.view = None;
    }

    pub fn select_ticket(&mut self, ticket_id: impl Into<String>) {
        self.session.ticket_id = Some(ticket_id.into());
    }

    /// Start over with no receipt or ticket.
    pub fn reset_session(&mut self) {
        self.session.reset();
        self.view = None;
        tracing::debug!(epoch = self.session.epoch(), "session reset");
    }

    /// Fetch the latest snapshot (and events, with a receipt) and rederive.
    ///
    /// On failure the previous view is kept and the error is recorded.
    pub fn refresh(&mut self) -> Result<&WorkflowView> {
        match self.fetch_view() {
            Ok(view) => {
                self.last_error = None;
                Ok(&*self.view.insert(view))
            }
            Err(e) => {
                tracing::warn!(
                    project_id = %self.session.project_id,
                    error = %e,
                    "refresh failed, keeping last view"
                );
                self.last_error = Some(e.to_string());
                Err(e)
            }
        }
    }

    fn fetch_view(&self) -> Result<WorkflowView> {
        let project_id = &self.session.project_id;
        let snapshot = self.ledger.get_project_snapshot(project_id)?;
        let gates = match &self.session.receipt_id {
            Some(receipt_id) => replay_receipt(&self.ledger.get_events(receipt_id)?, receipt_id),
            None => GateStates::new(),
        };
        Ok(WorkflowView {
            project_id: project_id.clone(),
            receipt_id: self.session.receipt_id.clone(),
            gates,
            readiness: aggregate(&snapshot),
        })
    }

    /// Actions offered right now, in workflow order.
    pub fn available_actions(&self) -> Vec<ActionKind> {
        ActionKind::ALL
            .into_iter()
            .filter(|kind| self.unavailable_reason(*kind).is_none())
            .collect()
    }

    /// Why an action is not offered, or `None` if it is.
    pub fn unavailable_reason(&self, kind: ActionKind) -> Option<String> {
        if !self.policy.offers(kind, &self.agent_id) {
            return Some(format!(
                "{} is disabled by the quarantine policy for agent '{}'",
                kind, self.agent_id
            ));
        }
        let Some(view) = &self.view else {
            return Some("no view loaded; refresh first".to_string());
        };
        let gates = &view.gates;
        let has_receipt = self.session.receipt_id.is_some();

        let ready = match kind {
            ActionKind::SubmitIntent => !has_receipt && gates.g1 == GateStatus::Pending,
            ActionKind::AuthorizeExecution => has_receipt && gates.g2 == GateStatus::Waiting,
            ActionKind::ExecuteTicket => {
                has_receipt
                    && self.session.ticket_id.is_some()
                    && gates.g2 == GateStatus::Passed
                    && gates.g3 == GateStatus::Pending
            }
            ActionKind::Approve | ActionKind::Reject => {
                has_receipt && gates.g4 == GateStatus::Waiting
            }
        };
        if !ready {
            return Some(format!("{} is not available at gate {}", kind, kind.gate()));
        }

        if kind == ActionKind::ExecuteTicket {
            if let Some(ticket_id) = self.session.ticket_id.as_deref() {
                let is_ready = view
                    .readiness
                    .eligible_runnable
                    .iter()
                    .any(|t| t.ticket_id == ticket_id);
                if !is_ready {
                    return Some(format!("ticket {} is not ready", ticket_id));
                }
            }
        }

        if kind == ActionKind::ExecuteTicket
            && self.policy.single_attempt_only()
            && view.readiness.active_count > 0
        {
            return Some(format!(
                "single-attempt execution: {} ticket(s) already executing",
                view.readiness.active_count
            ));
        }
        None
    }

    /// Submit an intent for the current project and ticket.
    pub fn submit_intent(&mut self, intent: &str) -> ActionOutcome {
        let project_id = self.session.project_id.clone();
        let agent_id = self.agent_id.clone();
        self.run(ActionKind::SubmitIntent, |actions, pending| {
            actions.submit_intent(&project_id, pending.ticket_id.as_deref(), intent, &agent_id)
        })
    }

    /// Authorize execution of the current receipt.
    pub fn authorize(&mut self) -> ActionOutcome {
        let agent_id = self.agent_id.clone();
        self.run(ActionKind::AuthorizeExecution, |actions, pending| {
            actions.authorize_execution(receipt_of(pending)?, &agent_id)
        })
    }

    /// Start executing the current ticket.
    pub fn execute(&mut self) -> ActionOutcome {
        let project_id = self.session.project_id.clone();
        let agent_id = self.agent_id.clone();
        self.run(ActionKind::ExecuteTicket, |actions, pending| {
            let ticket_id = pending
                .ticket_id
                .as_deref()
                .ok_or_else(|| GatewatchError::invalid_state("no ticket selected"))?;
            actions.execute_ticket(&project_id, ticket_id, &agent_id)
        })
    }

    /// Record the G4 decision for the current receipt.
    pub fn decide(&mut self, decision: Decision) -> ActionOutcome {
        let kind = match decision {
            Decision::Approve => ActionKind::Approve,
            Decision::Reject => ActionKind::Reject,
        };
        let agent_id = self.agent_id.clone();
        self.run(kind, |actions, pending| {
            actions.submit_approval(receipt_of(pending)?, decision, &agent_id)
        })
    }

    fn run<F>(&mut self, kind: ActionKind, submit: F) -> ActionOutcome
    where
        F: FnOnce(&A, &PendingAction) -> Result<ActionAck>,
    {
        if let Some(reason) = self.unavailable_reason(kind) {
            tracing::info!(action = %kind, reason = %reason, "action not offered");
            return ActionOutcome::NotOffered { reason };
        }

        let pending = self.session.begin_action(kind);
        tracing::info!(
            action = %kind,
            receipt_id = ?pending.receipt_id,
            ticket_id = ?pending.ticket_id,
            "submitting action"
        );
        let result = submit(&self.actions, &pending);
        self.complete_action(pending, result)
    }

    /// Settle a submission, discarding it if the session has moved on.
    pub fn complete_action(
        &mut self,
        pending: PendingAction,
        result: Result<ActionAck>,
    ) -> ActionOutcome {
        if !self.session.is_current(&pending) {
            tracing::info!(
                action = %pending.kind,
                epoch = pending.epoch,
                "discarding response for a superseded session"
            );
            return ActionOutcome::Discarded;
        }

        let outcome = match result {
            Ok(ack) if ack.accepted => {
                if pending.kind == ActionKind::SubmitIntent {
                    if let Some(receipt_id) = &ack.receipt_id {
                        self.session.receipt_id = Some(receipt_id.clone());
                    }
                }
                self.last_error = None;
                ActionOutcome::Accepted { ack }
            }
            Ok(ack) => ActionOutcome::Rejected {
                message: ack
                    .message
                    .unwrap_or_else(|| format!("{} rejected by backend", pending.kind)),
            },
            Err(e @ GatewatchError::Conflict { .. }) => ActionOutcome::Rejected {
                message: e.to_string(),
            },
            Err(e) => ActionOutcome::Failed {
                message: e.to_string(),
            },
        };

        match &outcome {
            ActionOutcome::Accepted { ack } => {
                tracing::info!(
                    action = %pending.kind,
                    chronicle_event_id = %ack.chronicle_event_id,
                    "action accepted"
                );
                // A failed refresh leaves last_error set and the old view in place
                let _ = self.refresh();
            }
            ActionOutcome::Rejected { message } | ActionOutcome::Failed { message } => {
                tracing::warn!(action = %pending.kind, error = %message, "action did not succeed");
                self.last_error = Some(message.clone());
            }
            ActionOutcome::Discarded | ActionOutcome::NotOffered { .. } => {}
        }

        outcome
    }
}

fn receipt_of(pending: &PendingAction) -> Result<&str> {
    pending
        .receipt_id
        .as_deref()
        .ok_or_else(|| GatewatchError::invalid_state("no receipt selected"))
}
