//! Local-directory ledger adapter.
//!
//! Layout under the ledger root:
//!
//! ```text
//! receipts/<receipt_id>.jsonl   append-only event log, one event per line
//! projects/<project_id>.json    current readiness snapshot
//! ```
//!
//! Snapshots are replaced atomically via temp file + rename.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::chronicle::{action_event, generate_id, start_ticket};
use crate::chronicle::{ActionAck, ActionClient, Decision, LedgerClient};
use crate::core::{EventType, LedgerEvent, ReadinessSnapshot};
use crate::error::{GatewatchError, Result};

/// Ledger backed by a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileChronicle {
    root: PathBuf,
}

impl FileChronicle {
    /// Open a ledger directory, creating its layout if missing.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        for dir in [root.join("receipts"), root.join("projects")] {
            if !dir.exists() {
                fs::create_dir_all(&dir).map_err(|e| GatewatchError::storage(&dir, e))?;
            }
        }
        tracing::debug!(root = %root.display(), "opened file ledger");
        Ok(Self { root })
    }

    /// Ledger root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn receipt_path(&self, receipt_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join("receipts")
            .join(format!("{}.jsonl", checked_id(receipt_id)?)))
    }

    fn project_path(&self, project_id: &str) -> Result<PathBuf> {
        Ok(self
            .root
            .join("projects")
            .join(format!("{}.json", checked_id(project_id)?)))
    }

    /// Append one event to a receipt log, creating the log if needed.
    pub fn append_event(&self, receipt_id: &str, event: &LedgerEvent) -> Result<()> {
        let path = self.receipt_path(receipt_id)?;
        let json = serde_json::to_string(event)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| GatewatchError::storage(&path, e))?;
        writeln!(file, "{}", json).map_err(|e| GatewatchError::storage(&path, e))?;

        tracing::debug!(
            receipt_id = %receipt_id,
            event_type = %event.event_type,
            "appended ledger event"
        );
        Ok(())
    }

    /// Replace a project's snapshot.
    pub fn put_snapshot(&self, snapshot: &ReadinessSnapshot) -> Result<()> {
        let final_path = self.project_path(&snapshot.project_id)?;
        let temp_path = self
            .root
            .join("projects")
            .join(format!(".{}.json.tmp", snapshot.project_id));

        let json = serde_json::to_string_pretty(snapshot)?;
        {
            let mut file =
                fs::File::create(&temp_path).map_err(|e| GatewatchError::storage(&temp_path, e))?;
            file.write_all(json.as_bytes())
                .map_err(|e| GatewatchError::storage(&temp_path, e))?;
            file.sync_all()
                .map_err(|e| GatewatchError::storage(&temp_path, e))?;
        }
        fs::rename(&temp_path, &final_path).map_err(|e| GatewatchError::storage(&final_path, e))?;
        Ok(())
    }

    fn require_receipt(&self, receipt_id: &str) -> Result<()> {
        if self.receipt_path(receipt_id)?.exists() {
            Ok(())
        } else {
            Err(GatewatchError::not_found(format!("receipt {}", receipt_id)))
        }
    }

    fn record(
        &self,
        event_type: EventType,
        receipt_id: &str,
        actor_id: &str,
        payload: serde_json::Value,
    ) -> Result<ActionAck> {
        let event = action_event(event_type, receipt_id, actor_id, payload);
        self.append_event(receipt_id, &event)?;
        Ok(ActionAck::accepted(
            event.event_id,
            Some(receipt_id.to_string()),
        ))
    }
}

/// Reject ids that would escape the ledger directory.
fn checked_id(id: &str) -> Result<&str> {
    let valid = !id.is_empty()
        && !id.starts_with('.')
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(id)
    } else {
        Err(GatewatchError::ledger(format!("invalid ledger id '{}'", id)))
    }
}

impl LedgerClient for FileChronicle {
    fn get_events(&self, receipt_id: &str) -> Result<Vec<LedgerEvent>> {
        let path = self.receipt_path(receipt_id)?;
        if !path.exists() {
            return Err(GatewatchError::not_found(format!("receipt {}", receipt_id)));
        }

        let content = fs::read_to_string(&path).map_err(|e| GatewatchError::storage(&path, e))?;

        let mut events = Vec::new();
        for (line_num, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEvent>(line) {
                Ok(event) => events.push(event),
                Err(e) => tracing::warn!(
                    receipt_id = %receipt_id,
                    line = line_num + 1,
                    error = %e,
                    "skipping malformed ledger event"
                ),
            }
        }

        Ok(events)
    }

    fn get_project_snapshot(&self, project_id: &str) -> Result<ReadinessSnapshot> {
        let path = self.project_path(project_id)?;
        if !path.exists() {
            return Err(GatewatchError::not_found(format!("project {}", project_id)));
        }
        let content = fs::read_to_string(&path).map_err(|e| GatewatchError::storage(&path, e))?;
        Ok(serde_json::from_str(&content)?)
    }
}

impl ActionClient for FileChronicle {
    fn submit_intent(
        &self,
        project_id: &str,
        ticket_id: Option<&str>,
        intent: &str,
        actor_id: &str,
    ) -> Result<ActionAck> {
        // The project must exist before a receipt can reference it
        self.get_project_snapshot(project_id)?;

        let receipt_id = loop {
            let candidate = generate_id("rcpt");
            if !self.receipt_path(&candidate)?.exists() {
                break candidate;
            }
        };

        let payload = serde_json::json!({
            "projectId": project_id,
            "ticketId": ticket_id,
            "intent": intent,
        });
        let ack = self.record(EventType::IntentSubmitted, &receipt_id, actor_id, payload)?;
        tracing::info!(receipt_id = %receipt_id, project_id = %project_id, "receipt created");
        Ok(ack)
    }

    fn authorize_execution(&self, receipt_id: &str, actor_id: &str) -> Result<ActionAck> {
        self.require_receipt(receipt_id)?;
        self.record(
            EventType::ExecutionAuthorized,
            receipt_id,
            actor_id,
            serde_json::Value::Null,
        )
    }

    fn submit_approval(
        &self,
        receipt_id: &str,
        decision: Decision,
        actor_id: &str,
    ) -> Result<ActionAck> {
        self.require_receipt(receipt_id)?;
        let event_type = match decision {
            Decision::Approve => EventType::ApprovalDecision,
            Decision::Reject => EventType::PatchRejected,
        };
        let payload = serde_json::json!({ "decision": decision.as_str() });
        self.record(event_type, receipt_id, actor_id, payload)
    }

    fn execute_ticket(
        &self,
        project_id: &str,
        ticket_id: &str,
        agent_id: &str,
    ) -> Result<ActionAck> {
        let mut snapshot = self.get_project_snapshot(project_id)?;
        start_ticket(&mut snapshot, ticket_id)?;
        self.put_snapshot(&snapshot)?;

        tracing::info!(
            project_id = %project_id,
            ticket_id = %ticket_id,
            agent_id = %agent_id,
            "ticket execution started"
        );
        Ok(ActionAck::accepted(generate_id("evt"), None))
    }
}
