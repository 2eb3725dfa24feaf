//! Act command for Gatewatch.
//!
//! Submits one governed action through the orchestrator. The orchestrator
//! refreshes first, so policy and the current gate state decide whether the
//! action is offered at all.

use serde::Serialize;

use crate::chronicle::{ActionClient, Decision, LedgerClient};
use crate::core::GateStates;
use crate::error::exit_codes;
use crate::workflow::{ActionKind, ActionOutcome, Orchestrator};

/// Options for the act command.
#[derive(Debug, Clone, Default)]
pub struct ActOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// The action to submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActRequest {
    Intent { text: String },
    Authorize,
    Execute,
    Approve,
    Reject,
}

impl ActRequest {
    pub fn kind(&self) -> ActionKind {
        match self {
            ActRequest::Intent { .. } => ActionKind::SubmitIntent,
            ActRequest::Authorize => ActionKind::AuthorizeExecution,
            ActRequest::Execute => ActionKind::ExecuteTicket,
            ActRequest::Approve => ActionKind::Approve,
            ActRequest::Reject => ActionKind::Reject,
        }
    }
}

/// Output format for the act command.
#[derive(Debug, Clone, Serialize)]
pub struct ActOutput {
    pub success: bool,
    pub action: ActionKind,
    pub outcome: ActionOutcome,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gates: Option<GateStates>,
    /// What can be done next.
    pub available_actions: Vec<ActionKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ActOutput {
    /// Process exit code for this outcome.
    pub fn exit_code(&self) -> i32 {
        match self.outcome {
            ActionOutcome::Accepted { .. } => exit_codes::OK,
            ActionOutcome::Rejected { .. } | ActionOutcome::NotOffered { .. } => {
                exit_codes::REJECTED
            }
            ActionOutcome::Failed { .. } | ActionOutcome::Discarded => exit_codes::ERROR,
        }
    }
}

/// The act command implementation.
pub struct ActCommand<L, A> {
    orchestrator: Orchestrator<L, A>,
}

impl<L: LedgerClient, A: ActionClient> ActCommand<L, A> {
    pub fn new(orchestrator: Orchestrator<L, A>) -> Self {
        Self { orchestrator }
    }

    pub fn orchestrator(&self) -> &Orchestrator<L, A> {
        &self.orchestrator
    }

    /// Run the act command.
    pub fn run(&mut self, request: &ActRequest) -> ActOutput {
        let kind = request.kind();

        let outcome = match self.orchestrator.refresh() {
            Err(e) => ActionOutcome::Failed {
                message: format!("refresh failed: {}", e),
            },
            Ok(_) => match request {
                ActRequest::Intent { text } => self.orchestrator.submit_intent(text),
                ActRequest::Authorize => self.orchestrator.authorize(),
                ActRequest::Execute => self.orchestrator.execute(),
                ActRequest::Approve => self.orchestrator.decide(Decision::Approve),
                ActRequest::Reject => self.orchestrator.decide(Decision::Reject),
            },
        };

        let error = match &outcome {
            ActionOutcome::Rejected { message } | ActionOutcome::Failed { message } => {
                Some(message.clone())
            }
            ActionOutcome::NotOffered { reason } => Some(reason.clone()),
            ActionOutcome::Discarded => Some("response arrived for a superseded session".into()),
            ActionOutcome::Accepted { .. } => None,
        };

        ActOutput {
            success: outcome.is_accepted(),
            action: kind,
            receipt_id: self.orchestrator.session().receipt_id.clone(),
            gates: self.orchestrator.view().map(|v| v.gates),
            available_actions: self.orchestrator.available_actions(),
            outcome,
            error,
        }
    }

    /// Format the output for display.
    pub fn format_output(&self, output: &ActOutput, options: &ActOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        let mut text = match &output.outcome {
            ActionOutcome::Accepted { ack } => {
                format!("{} accepted (event {})\n", output.action, ack.chronicle_event_id)
            }
            _ => format!(
                "{} not completed: {}\n",
                output.action,
                output.error.as_deref().unwrap_or("unknown error")
            ),
        };

        if let Some(receipt_id) = &output.receipt_id {
            text.push_str(&format!("Receipt {}\n", receipt_id));
        }
        if let Some(gates) = &output.gates {
            text.push_str(&super::gates_cmd::format_gates(gates));
        }
        if !output.available_actions.is_empty() {
            let names: Vec<&str> = output.available_actions.iter().map(|a| a.as_str()).collect();
            text.push_str(&format!("Available: {}\n", names.join(", ")));
        }
        text
    }
}
