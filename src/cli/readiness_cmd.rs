//! Readiness command for Gatewatch.
//!
//! Shows what can happen next in a project: ranked eligible tickets, blocking
//! reasons, lanes, backpressure, pending approvals and the parallel set.

use serde::{Deserialize, Serialize};

use crate::chronicle::LedgerClient;
use crate::core::{aggregate, ReadinessBundle};

/// Options for the readiness command.
#[derive(Debug, Clone, Default)]
pub struct ReadinessOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Show collapsed passing safety checks.
    pub expand: bool,
}

/// Output format for the readiness command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessOutput {
    pub success: bool,
    pub project_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bundle: Option<ReadinessBundle>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReadinessOutput {
    pub fn success(bundle: ReadinessBundle) -> Self {
        Self {
            success: true,
            project_id: bundle.project_id.clone(),
            bundle: Some(bundle),
            error: None,
        }
    }

    pub fn failure(project_id: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            success: false,
            project_id: project_id.into(),
            bundle: None,
            error: Some(error.into()),
        }
    }
}

/// The readiness command implementation.
pub struct ReadinessCommand<L> {
    ledger: L,
}

impl<L: LedgerClient> ReadinessCommand<L> {
    pub fn new(ledger: L) -> Self {
        Self { ledger }
    }

    /// Run the readiness command.
    pub fn run(&self, project_id: &str) -> ReadinessOutput {
        match self.ledger.get_project_snapshot(project_id) {
            Ok(snapshot) => ReadinessOutput::success(aggregate(&snapshot)),
            Err(e) => ReadinessOutput::failure(project_id, e.to_string()),
        }
    }

    /// Format the output for display.
    pub fn format_output(&self, output: &ReadinessOutput, options: &ReadinessOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        match &output.bundle {
            Some(bundle) if output.success => format_bundle(bundle, options.expand),
            _ => format!(
                "Could not load project {}: {}\n",
                output.project_id,
                output.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}

/// Render a bundle as sectioned text.
pub fn format_bundle(bundle: &ReadinessBundle, expand: bool) -> String {
    let mut lines = Vec::new();

    lines.push(format!(
        "Project {} (as of {})",
        bundle.project_id,
        bundle.computed_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));

    if bundle.backpressure.active {
        let mut line = "BACKPRESSURE: consider pausing new starts".to_string();
        if let Some(secs) = bundle.backpressure.recommended_pause_seconds {
            line.push_str(&format!(" for {}s", secs));
        }
        lines.push(line);
        for reason in &bundle.backpressure.reasons {
            lines.push(format!("  - {}", reason));
        }
    }

    lines.push(String::new());
    lines.push(format!(
        "Eligible ({}), executing: {}",
        bundle.eligible_runnable.len(),
        bundle.active_count
    ));
    if bundle.eligible_runnable.is_empty() {
        lines.push("  (none)".to_string());
    }
    for ticket in &bundle.eligible_runnable {
        let score = ticket
            .score
            .map(|s| format!(" [{:.2}]", s))
            .unwrap_or_default();
        let marker = if ticket.rank == 1 { " <- next" } else { "" };
        lines.push(format!(
            "  {}. {} {}{}{}",
            ticket.rank, ticket.ticket_id, ticket.title, score, marker
        ));
        for reason in &ticket.reasons {
            lines.push(format!("       {}", reason));
        }
    }

    if !bundle.blocking.is_empty() {
        lines.push(String::new());
        lines.push(format!("Blocked ({})", bundle.blocking.len()));
        for blocked in &bundle.blocking {
            lines.push(format!("  {}: {}", blocked.ticket_id, blocked.primary));
            for more in &blocked.additional {
                lines.push(format!("      also: {}", more));
            }
        }
    }

    if !bundle.lanes.is_empty() {
        lines.push(String::new());
        lines.push("Lanes".to_string());
        for lane in &bundle.lanes {
            let state = if lane.at_capacity { " (at capacity)" } else { "" };
            lines.push(format!(
                "  {}: {}/{}{}",
                lane.lane, lane.active, lane.limit, state
            ));
        }
    }

    if !bundle.pending_approvals.is_empty() {
        lines.push(String::new());
        lines.push(format!(
            "Pending approvals ({})",
            bundle.pending_approvals.len()
        ));
        for approval in &bundle.pending_approvals {
            lines.push(format!(
                "  {} at {} since {}",
                approval.ticket_id,
                approval.gate,
                approval.waiting_since.format("%Y-%m-%d %H:%M")
            ));
        }
    }

    if let Some(set) = &bundle.parallel_set {
        lines.push(String::new());
        lines.push(format!(
            "Parallel set {} [{}] {}: overall {}",
            set.proposal_id,
            set.ticket_ids.join(", "),
            set.status.as_str(),
            set.safety.overall.tag()
        ));
        if !set.not_ready.is_empty() {
            lines.push(format!("  not ready: {}", set.not_ready.join(", ")));
        }
        for line in set.safety.groups().render_tree(expand).lines() {
            lines.push(format!("  {}", line));
        }
    }

    if bundle.has_defects() {
        lines.push(String::new());
        lines.push("Snapshot defects".to_string());
        for orphan in &bundle.orphan_explanations {
            lines.push(format!(
                "  explanations for unknown ticket {} ({})",
                orphan.ticket_id,
                orphan.explanations.len()
            ));
        }
        for id in &bundle.duplicates {
            lines.push(format!("  ticket {} listed in more than one bucket", id));
        }
    }

    lines.join("\n") + "\n"
}
