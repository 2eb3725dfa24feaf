//! Gates command for Gatewatch.
//!
//! Replays a receipt's events and shows G1..G4 plus the next human action.

use serde::{Deserialize, Serialize};

use crate::chronicle::LedgerClient;
use crate::core::{replay_receipt, GateStates};

/// Options for the gates command.
#[derive(Debug, Clone, Default)]
pub struct GatesOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// Output format for the gates command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatesOutput {
    pub success: bool,
    pub receipt_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gates: Option<GateStates>,
    /// Label of the gate awaiting a human, e.g. "G2 execute".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_action: Option<String>,
    pub complete: bool,
    pub event_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GatesOutput {
    pub fn success(receipt_id: impl Into<String>, gates: GateStates, event_count: usize) -> Self {
        Self {
            success: true,
            receipt_id: receipt_id.into(),
            next_action: gates.next_actionable().map(|g| g.to_string()),
            complete: gates.is_complete(),
            gates: Some(gates),
            event_count,
            error: None,
        }
    }

    pub fn failure(receipt_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            receipt_id: receipt_id.into(),
            gates: None,
            next_action: None,
            complete: false,
            event_count: 0,
            error: Some(error.into()),
        }
    }
}

/// The gates command implementation.
pub struct GatesCommand<L> {
    ledger: L,
}

impl<L: LedgerClient> GatesCommand<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Run the gates command.
    pub fn run(&self, receipt_id: &str) -> GatesOutput {
        match self.ledger.get_events(receipt_id) {
            Ok(events) => {
                GatesOutput::success(receipt_id, replay_receipt(&events, receipt_id), events.len())
            }
            Err(e) => GatesOutput::failure(receipt_id, e.to_string()),
        }
    }

    /// Format the output for display.
    pub fn format_output(&self, output: &GatesOutput, options: &GatesOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        if !output.success {
            return format!(
                "Could not load receipt {}: {}\n",
                output.receipt_id,
                output.error.as_deref().unwrap_or("unknown error")
            );
        }

        let mut text = format!(
            "Receipt {} ({} events)\n",
            output.receipt_id, output.event_count
        );
        if let Some(gates) = &output.gates {
            text.push_str(&format_gates(gates));
        }
        match &output.next_action {
            Some(gate) => text.push_str(&format!("Next: {}\n", gate)),
            None if output.complete => text.push_str("Workflow complete.\n"),
            None => text.push_str("No human action pending.\n"),
        }
        text
    }
}

/// Render gate statuses one per line.
pub fn format_gates(gates: &GateStates) -> String {
    gates
        .iter()
        .map(|(gate, status)| format!("  {:<16} {}\n", gate.to_string(), status))
        .collect()
}
