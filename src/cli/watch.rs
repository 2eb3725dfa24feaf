//! Watch command for Gatewatch.
//!
//! Polls the ledger and prints the derived view on every tick. Read-only:
//! nothing is ever submitted from here.

use serde::Serialize;

use crate::chronicle::{ActionClient, LedgerClient};
use crate::workflow::{ActionKind, Orchestrator, Poller, WorkflowView};

/// Options for the watch command.
#[derive(Debug, Clone, Default)]
pub struct WatchOptions {
    /// Emit one JSON object per tick.
    pub json: bool,
    /// Suppress per-tick output.
    pub quiet: bool,
    /// Show collapsed passing safety checks.
    pub expand: bool,
}

/// One tick as emitted in JSON mode.
#[derive(Debug, Serialize)]
struct TickReport<'a> {
    tick: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    view: Option<&'a WorkflowView>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a str>,
    available_actions: Vec<ActionKind>,
}

/// Output format for the watch command.
#[derive(Debug, Clone, Serialize)]
pub struct WatchOutput {
    pub success: bool,
    pub ticks: u64,
    pub failures: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// The watch command implementation.
pub struct WatchCommand<L, A> {
    orchestrator: Orchestrator<L, A>,
    poller: Poller,
}

impl<L: LedgerClient, A: ActionClient> WatchCommand<L, A> {
    pub fn new(orchestrator: Orchestrator<L, A>, poller: Poller) -> Self {
        Self {
            orchestrator,
            poller,
        }
    }

    /// Poll until the tick limit, handing each rendered tick to `emit`.
    ///
    /// Succeeds when the last tick produced a view.
    pub fn run<F>(&mut self, options: &WatchOptions, mut emit: F) -> WatchOutput
    where
        F: FnMut(&str),
    {
        let summary = self.poller.run(&mut self.orchestrator, |tick, orch| {
            if !options.quiet {
                emit(&render_tick(tick, orch, options));
            }
            true
        });

        let error = self.orchestrator.last_error().map(str::to_string);
        WatchOutput {
            success: error.is_none() && self.orchestrator.view().is_some(),
            ticks: summary.ticks,
            failures: summary.failures,
            error,
        }
    }
}

/// Render one tick as text or a JSON line.
pub fn render_tick<L, A>(tick: u64, orch: &Orchestrator<L, A>, options: &WatchOptions) -> String
where
    L: LedgerClient,
    A: ActionClient,
{
    if options.json {
        let report = TickReport {
            tick,
            view: orch.view(),
            error: orch.last_error(),
            available_actions: orch.available_actions(),
        };
        return serde_json::to_string(&report).unwrap_or_else(|_| "{}".to_string());
    }

    let mut text = format!("--- tick {} ---\n", tick);
    if let Some(error) = orch.last_error() {
        text.push_str(&format!("refresh failed: {} (showing last view)\n", error));
    }

    match orch.view() {
        Some(view) => {
            if let Some(receipt_id) = &view.receipt_id {
                text.push_str(&format!("Receipt {}\n", receipt_id));
                text.push_str(&super::gates_cmd::format_gates(&view.gates));
            }
            text.push_str(&super::readiness_cmd::format_bundle(
                &view.readiness,
                options.expand,
            ));
        }
        None => text.push_str("no data yet\n"),
    }

    let actions = orch.available_actions();
    if !actions.is_empty() {
        let names: Vec<&str> = actions.iter().map(|a| a.as_str()).collect();
        text.push_str(&format!("Available: {}\n", names.join(", ")));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronicle::{ActionClient, MemoryChronicle};
    use crate::core::{ReadinessSnapshot, TicketEntry};
    use crate::policy::QuarantinePolicy;
    use crate::workflow::SessionContext;
    use chrono::Utc;
    use std::sync::Arc;
    use std::time::Duration;

    fn chronicle() -> Arc<MemoryChronicle> {
        let chronicle = Arc::new(MemoryChronicle::new());
        let mut snapshot = ReadinessSnapshot::new("proj", Utc::now());
        snapshot.buckets.ready = vec![TicketEntry::new("T-1", "first")];
        chronicle.put_snapshot(snapshot);
        chronicle
    }

    fn command(
        chronicle: &Arc<MemoryChronicle>,
        session: SessionContext,
        ticks: u64,
    ) -> WatchCommand<Arc<MemoryChronicle>, Arc<MemoryChronicle>> {
        let orch = Orchestrator::new(
            Arc::clone(chronicle),
            Arc::clone(chronicle),
            QuarantinePolicy::default(),
            "codex",
            session,
        )
        .unwrap();
        WatchCommand::new(orch, Poller::new(Duration::ZERO).with_max_ticks(ticks))
    }

    #[test]
    fn test_watch_emits_each_tick() {
        let chronicle = chronicle();
        let mut cmd = command(&chronicle, SessionContext::new("proj"), 3);

        let mut emitted = Vec::new();
        let output = cmd.run(&WatchOptions::default(), |s| emitted.push(s.to_string()));

        assert!(output.success);
        assert_eq!(output.ticks, 3);
        assert_eq!(output.failures, 0);
        assert_eq!(emitted.len(), 3);
        assert!(emitted[0].starts_with("--- tick 1 ---"));
        assert!(emitted[2].contains("1. T-1 first <- next"));
        assert!(emitted[2].contains("Available: submit_intent"));
    }

    #[test]
    fn test_watch_shows_gates_for_receipt() {
        let chronicle = chronicle();
        let ack = chronicle
            .submit_intent("proj", Some("T-1"), "do it", "alice")
            .unwrap();
        let receipt_id = ack.receipt_id.unwrap();
        let mut cmd = command(
            &chronicle,
            SessionContext::new("proj").with_receipt(&receipt_id),
            1,
        );

        let mut emitted = Vec::new();
        cmd.run(&WatchOptions::default(), |s| emitted.push(s.to_string()));

        assert!(emitted[0].contains(&format!("Receipt {}", receipt_id)));
        assert!(emitted[0].contains("G1 intent"));
    }

    #[test]
    fn test_watch_reports_failures() {
        let chronicle = chronicle();
        chronicle.fail_fetches(Some("ledger down"));
        let mut cmd = command(&chronicle, SessionContext::new("proj"), 2);

        let mut emitted = Vec::new();
        let output = cmd.run(&WatchOptions::default(), |s| emitted.push(s.to_string()));

        assert!(!output.success);
        assert_eq!(output.failures, 2);
        assert!(output.error.unwrap().contains("ledger down"));
        assert!(emitted[0].contains("no data yet"));
    }

    #[test]
    fn test_watch_json_lines() {
        let chronicle = chronicle();
        let mut cmd = command(&chronicle, SessionContext::new("proj"), 2);

        let mut emitted = Vec::new();
        let options = WatchOptions {
            json: true,
            ..Default::default()
        };
        cmd.run(&options, |s| emitted.push(s.to_string()));

        assert_eq!(emitted.len(), 2);
        for (i, line) in emitted.iter().enumerate() {
            assert!(!line.contains('\n'));
            let parsed: serde_json::Value = serde_json::from_str(line).unwrap();
            assert_eq!(parsed["tick"], i as u64 + 1);
            assert_eq!(parsed["view"]["project_id"], "proj");
        }
    }

    #[test]
    fn test_watch_quiet_emits_nothing() {
        let chronicle = chronicle();
        let mut cmd = command(&chronicle, SessionContext::new("proj"), 2);

        let mut count = 0;
        let options = WatchOptions {
            quiet: true,
            ..Default::default()
        };
        let output = cmd.run(&options, |_| count += 1);

        assert_eq!(count, 0);
        assert_eq!(output.ticks, 2);
    }
}
