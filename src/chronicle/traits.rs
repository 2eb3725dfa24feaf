//! Collaborator traits for the Chronicle ledger.
//!
//! `LedgerClient` is the read side (events and snapshots), `ActionClient` the
//! write side (governed submissions). Both are synchronous; the orchestrator
//! treats every call as a suspension point.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::core::{LedgerEvent, ReadinessSnapshot};
use crate::error::Result;

/// Human decision at G4.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Decision {
    Approve,
    Reject,
}

impl Decision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Decision::Approve => "approve",
            Decision::Reject => "reject",
        }
    }
}

/// Backend acknowledgement of a submitted action.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ActionAck {
    /// Whether the backend accepted the action.
    pub accepted: bool,
    /// Ledger id recorded for the action.
    pub chronicle_event_id: String,
    /// Receipt created or touched by the action.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    /// Backend message, typically present on rejection.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ActionAck {
    /// An accepted acknowledgement.
    pub fn accepted(chronicle_event_id: impl Into<String>, receipt_id: Option<String>) -> Self {
        Self {
            accepted: true,
            chronicle_event_id: chronicle_event_id.into(),
            receipt_id,
            message: None,
        }
    }

    /// A rejected acknowledgement.
    pub fn rejected(chronicle_event_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            accepted: false,
            chronicle_event_id: chronicle_event_id.into(),
            receipt_id: None,
            message: Some(message.into()),
        }
    }
}

/// Read side of the ledger.
pub trait LedgerClient: Send + Sync {
    /// Fetch the ordered event stream of a receipt.
    ///
    /// Returns `NotFound` if the ledger has never seen the receipt.
    fn get_events(&self, receipt_id: &str) -> Result<Vec<LedgerEvent>>;

    /// Fetch the current readiness snapshot of a project.
    fn get_project_snapshot(&self, project_id: &str) -> Result<ReadinessSnapshot>;
}

/// Write side of the ledger.
pub trait ActionClient: Send + Sync {
    /// Submit an intent, creating a new receipt (G1).
    fn submit_intent(
        &self,
        project_id: &str,
        ticket_id: Option<&str>,
        intent: &str,
        actor_id: &str,
    ) -> Result<ActionAck>;

    /// Authorize execution of a receipt (G2).
    fn authorize_execution(&self, receipt_id: &str, actor_id: &str) -> Result<ActionAck>;

    /// Record the human decision for a receipt (G4).
    fn submit_approval(
        &self,
        receipt_id: &str,
        decision: Decision,
        actor_id: &str,
    ) -> Result<ActionAck>;

    /// Start executing a ticket with an agent.
    ///
    /// The backend is the authority on single-attempt execution and answers
    /// with `Conflict` while another ticket is executing.
    fn execute_ticket(&self, project_id: &str, ticket_id: &str, agent_id: &str)
        -> Result<ActionAck>;
}

impl<T: LedgerClient + ?Sized> LedgerClient for Arc<T> {
    fn get_events(&self, receipt_id: &str) -> Result<Vec<LedgerEvent>> {
        (**self).get_events(receipt_id)
    }

    fn get_project_snapshot(&self, project_id: &str) -> Result<ReadinessSnapshot> {
        (**self).get_project_snapshot(project_id)
    }
}

impl<T: ActionClient + ?Sized> ActionClient for Arc<T> {
    fn submit_intent(
        &self,
        project_id: &str,
        ticket_id: Option<&str>,
        intent: &str,
        actor_id: &str,
    ) -> Result<ActionAck> {
        (**self).submit_intent(project_id, ticket_id, intent, actor_id)
    }

    fn authorize_execution(&self, receipt_id: &str, actor_id: &str) -> Result<ActionAck> {
        (**self).authorize_execution(receipt_id, actor_id)
    }

    fn submit_approval(
        &self,
        receipt_id: &str,
        decision: Decision,
        actor_id: &str,
    ) -> Result<ActionAck> {
        (**self).submit_approval(receipt_id, decision, actor_id)
    }

    fn execute_ticket(
        &self,
        project_id: &str,
        ticket_id: &str,
        agent_id: &str,
    ) -> Result<ActionAck> {
        (**self).execute_ticket(project_id, ticket_id, agent_id)
    }
}
