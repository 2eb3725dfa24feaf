//! Session context owned by the orchestrator.
//!
//! The only mutable state in the workflow is which receipt and ticket are
//! current. It lives here as an explicit value; derivation never sees it.

use serde::{Deserialize, Serialize};

use crate::core::Gate;

/// A governed action the operator can submit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    SubmitIntent,
    AuthorizeExecution,
    ExecuteTicket,
    Approve,
    Reject,
}

impl ActionKind {
    pub const ALL: [ActionKind; 5] = [
        ActionKind::SubmitIntent,
        ActionKind::AuthorizeExecution,
        ActionKind::ExecuteTicket,
        ActionKind::Approve,
        ActionKind::Reject,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ActionKind::SubmitIntent => "submit_intent",
            ActionKind::AuthorizeExecution => "authorize_execution",
            ActionKind::ExecuteTicket => "execute_ticket",
            ActionKind::Approve => "approve",
            ActionKind::Reject => "reject",
        }
    }

    /// Gate the action advances.
    pub fn gate(&self) -> Gate {
        match self {
            ActionKind::SubmitIntent => Gate::Intent,
            ActionKind::AuthorizeExecution | ActionKind::ExecuteTicket => Gate::Execute,
            ActionKind::Approve | ActionKind::Reject => Gate::Apply,
        }
    }
}

impl std::fmt::Display for ActionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which receipt and ticket the operator is working on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    pub project_id: String,
    pub receipt_id: Option<String>,
    pub ticket_id: Option<String>,
    /// Bumped on every reset; responses from an older epoch are stale.
    epoch: u64,
}

impl SessionContext {
    pub fn new(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            receipt_id: None,
            ticket_id: None,
            epoch: 0,
        }
    }

    pub fn with_receipt(mut self, receipt_id: impl Into<String>) -> Self {
        self.receipt_id = Some(receipt_id.into());
        self
    }

    pub fn with_ticket(mut self, ticket_id: impl Into<String>) -> Self {
        self.ticket_id = Some(ticket_id.into());
        self
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Drop the current receipt and ticket and start a new epoch.
    pub fn reset(&mut self) {
        self.receipt_id = None;
        self.ticket_id = None;
        self.epoch += 1;
    }

    /// Capture the identity an action is submitted under.
    pub fn begin_action(&self, kind: ActionKind) -> PendingAction {
        PendingAction {
            kind,
            epoch: self.epoch,
            receipt_id: self.receipt_id.clone(),
            ticket_id: self.ticket_id.clone(),
        }
    }

    /// Whether a response to `pending` still belongs to this session.
    pub fn is_current(&self, pending: &PendingAction) -> bool {
        pending.epoch == self.epoch
            && pending.receipt_id == self.receipt_id
            && pending.ticket_id == self.ticket_id
    }
}

/// An in-flight submission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingAction {
    pub kind: ActionKind,
    pub epoch: u64,
    pub receipt_id: Option<String>,
    pub ticket_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reset_clears_identity_and_bumps_epoch() {
        let mut session = SessionContext::new("proj")
            .with_receipt("r-1")
            .with_ticket("T-1");
        session.reset();

        assert_eq!(session.project_id, "proj");
        assert!(session.receipt_id.is_none());
        assert!(session.ticket_id.is_none());
        assert_eq!(session.epoch(), 1);
    }

    #[test]
    fn test_pending_action_goes_stale_on_reset() {
        let mut session = SessionContext::new("proj").with_receipt("r-1");
        let pending = session.begin_action(ActionKind::AuthorizeExecution);
        assert!(session.is_current(&pending));

        session.reset();
        assert!(!session.is_current(&pending));

        // Same identity again is still a new epoch
        session.receipt_id = Some("r-1".to_string());
        assert!(!session.is_current(&pending));
    }

    #[test]
    fn test_pending_action_goes_stale_on_identity_change() {
        let mut session = SessionContext::new("proj").with_receipt("r-1");
        let pending = session.begin_action(ActionKind::Approve);

        session.receipt_id = Some("r-2".to_string());
        assert!(!session.is_current(&pending));
    }

    #[test]
    fn test_action_gates() {
        assert_eq!(ActionKind::SubmitIntent.gate(), Gate::Intent);
        assert_eq!(ActionKind::ExecuteTicket.gate(), Gate::Execute);
        assert_eq!(ActionKind::Reject.gate(), Gate::Apply);
    }
}
