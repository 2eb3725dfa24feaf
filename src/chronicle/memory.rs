//! In-memory ledger for tests.
//!
//! Thread-safe double of the Chronicle backend with failure injection and a
//! lagging mode where accepted submissions stay invisible to reads until
//! [`MemoryChronicle::catch_up`] is called.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::chronicle::{action_event, generate_id, start_ticket};
use crate::chronicle::{ActionAck, ActionClient, Decision, LedgerClient};
use crate::core::{EventType, LedgerEvent, ReadinessSnapshot};
use crate::error::{GatewatchError, Result};

#[derive(Debug, Default)]
struct LedgerState {
    receipts: HashMap<String, Vec<LedgerEvent>>,
    snapshots: HashMap<String, ReadinessSnapshot>,
    /// Accepted but not yet visible (lagging mode).
    unseen: Vec<LedgerEvent>,
    lagging: bool,
    fetch_failure: Option<String>,
    action_failure: Option<String>,
    reads: usize,
    submissions: usize,
}

/// In-memory ledger.
#[derive(Debug, Default)]
pub struct MemoryChronicle {
    state: RwLock<LedgerState>,
}

impl MemoryChronicle {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store or replace a project snapshot.
    pub fn put_snapshot(&self, snapshot: ReadinessSnapshot) {
        self.write()
            .snapshots
            .insert(snapshot.project_id.clone(), snapshot);
    }

    /// Append an event directly, bypassing lag and failure injection.
    pub fn push_event(&self, receipt_id: &str, event: LedgerEvent) {
        self.write()
            .receipts
            .entry(receipt_id.to_string())
            .or_default()
            .push(event);
    }

    /// Make every read fail with the given message; `None` heals.
    pub fn fail_fetches(&self, message: Option<&str>) {
        self.write().fetch_failure = message.map(str::to_string);
    }

    /// Make every submission fail with the given message; `None` heals.
    pub fn fail_actions(&self, message: Option<&str>) {
        self.write().action_failure = message.map(str::to_string);
    }

    /// Toggle lagging mode.
    pub fn set_lagging(&self, lagging: bool) {
        self.write().lagging = lagging;
    }

    /// Make every accepted-but-unseen event visible.
    pub fn catch_up(&self) -> usize {
        let mut state = self.write();
        let unseen = std::mem::take(&mut state.unseen);
        let count = unseen.len();
        for event in unseen {
            let receipt_id = event.receipt_id.clone().unwrap_or_default();
            state.receipts.entry(receipt_id).or_default().push(event);
        }
        count
    }

    /// Number of read calls served.
    pub fn read_count(&self) -> usize {
        self.read().reads
    }

    /// Number of submissions received, including failed ones.
    pub fn submission_count(&self) -> usize {
        self.read().submissions
    }

    fn begin_submission(&self) -> Result<()> {
        let mut state = self.write();
        state.submissions += 1;
        match &state.action_failure {
            Some(message) => Err(GatewatchError::ledger(message.clone())),
            None => Ok(()),
        }
    }

    fn record(&self, event: LedgerEvent) -> ActionAck {
        let event_id = event.event_id.clone();
        let receipt_id = event.receipt_id.clone();
        let mut state = self.write();
        if state.lagging {
            state.unseen.push(event);
        } else {
            state
                .receipts
                .entry(receipt_id.clone().unwrap_or_default())
                .or_default()
                .push(event);
        }
        ActionAck::accepted(event_id, receipt_id)
    }

    fn knows_receipt(&self, receipt_id: &str) -> bool {
        let state = self.read();
        state.receipts.contains_key(receipt_id)
            || state
                .unseen
                .iter()
                .any(|e| e.receipt_id.as_deref() == Some(receipt_id))
    }

    fn require_receipt(&self, receipt_id: &str) -> Result<()> {
        if self.knows_receipt(receipt_id) {
            Ok(())
        } else {
            Err(GatewatchError::not_found(format!("receipt {}", receipt_id)))
        }
    }
}

impl LedgerClient for MemoryChronicle {
    fn get_events(&self, receipt_id: &str) -> Result<Vec<LedgerEvent>> {
        let mut state = self.write();
        state.reads += 1;
        if let Some(message) = &state.fetch_failure {
            return Err(GatewatchError::ledger(message.clone()));
        }
        state
            .receipts
            .get(receipt_id)
            .cloned()
            .ok_or_else(|| GatewatchError::not_found(format!("receipt {}", receipt_id)))
    }

    fn get_project_snapshot(&self, project_id: &str) -> Result<ReadinessSnapshot> {
        let mut state = self.write();
        state.reads += 1;
        if let Some(message) = &state.fetch_failure {
            return Err(GatewatchError::ledger(message.clone()));
        }
        state
            .snapshots
            .get(project_id)
            .cloned()
            .ok_or_else(|| GatewatchError::not_found(format!("project {}", project_id)))
    }
}

impl ActionClient for MemoryChronicle {
    fn submit_intent(
        &self,
        project_id: &str,
        ticket_id: Option<&str>,
        intent: &str,
        actor_id: &str,
    ) -> Result<ActionAck> {
        self.begin_submission()?;
        if !self.read().snapshots.contains_key(project_id) {
            return Err(GatewatchError::not_found(format!("project {}", project_id)));
        }

        let receipt_id = generate_id("rcpt");
        let payload = serde_json::json!({
            "projectId": project_id,
            "ticketId": ticket_id,
            "intent": intent,
        });
        Ok(self.record(action_event(
            EventType::IntentSubmitted,
            &receipt_id,
            actor_id,
            payload,
        )))
    }

    fn authorize_execution(&self, receipt_id: &str, actor_id: &str) -> Result<ActionAck> {
        self.begin_submission()?;
        self.require_receipt(receipt_id)?;
        Ok(self.record(action_event(
            EventType::ExecutionAuthorized,
            receipt_id,
            actor_id,
            serde_json::Value::Null,
        )))
    }

    fn submit_approval(
        &self,
        receipt_id: &str,
        decision: Decision,
        actor_id: &str,
    ) -> Result<ActionAck> {
        self.begin_submission()?;
        self.require_receipt(receipt_id)?;
        let event_type = match decision {
            Decision::Approve => EventType::ApprovalDecision,
            Decision::Reject => EventType::PatchRejected,
        };
        Ok(self.record(action_event(
            event_type,
            receipt_id,
            actor_id,
            serde_json::json!({ "decision": decision.as_str() }),
        )))
    }

    fn execute_ticket(
        &self,
        project_id: &str,
        ticket_id: &str,
        _agent_id: &str,
    ) -> Result<ActionAck> {
        self.begin_submission()?;
        let mut state = self.write();
        let snapshot = state
            .snapshots
            .get_mut(project_id)
            .ok_or_else(|| GatewatchError::not_found(format!("project {}", project_id)))?;
        start_ticket(snapshot, ticket_id)?;
        Ok(ActionAck::accepted(generate_id("evt"), None))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chronicle::traits::tests::test_chronicle_workflow;
    use crate::core::{derive_gate_states, GateStatus, TicketEntry};
    use chrono::Utc;
    use std::sync::Arc;
    use std::thread;

    fn seeded() -> MemoryChronicle {
        let chronicle = MemoryChronicle::new();
        let mut snapshot = ReadinessSnapshot::new("proj", Utc::now());
        snapshot.buckets.ready = vec![TicketEntry::new("T-1", "a"), TicketEntry::new("T-2", "b")];
        chronicle.put_snapshot(snapshot);
        chronicle
    }

    #[test]
    fn test_memory_chronicle_workflow() {
        test_chronicle_workflow(&seeded());
    }

    #[test]
    fn test_arc_chronicle_workflow() {
        test_chronicle_workflow(&Arc::new(seeded()));
    }

    #[test]
    fn test_fetch_failure_injection() {
        let chronicle = seeded();
        chronicle.fail_fetches(Some("connection reset"));

        let err = chronicle.get_project_snapshot("proj").unwrap_err();
        assert_eq!(err.to_string(), "ledger error: connection reset");

        chronicle.fail_fetches(None);
        assert!(chronicle.get_project_snapshot("proj").is_ok());
        assert_eq!(chronicle.read_count(), 2);
    }

    #[test]
    fn test_action_failure_injection() {
        let chronicle = seeded();
        chronicle.fail_actions(Some("backend unavailable"));

        let err = chronicle
            .submit_intent("proj", None, "x", "op")
            .unwrap_err();
        assert!(matches!(err, GatewatchError::Ledger { .. }));
        assert_eq!(chronicle.submission_count(), 1);
    }

    #[test]
    fn test_lagging_hides_accepted_events_until_catch_up() {
        let chronicle = seeded();
        let receipt_id = chronicle
            .submit_intent("proj", None, "x", "op")
            .unwrap()
            .receipt_id
            .unwrap();

        chronicle.set_lagging(true);
        chronicle.authorize_execution(&receipt_id, "op").unwrap();

        let states = derive_gate_states(&chronicle.get_events(&receipt_id).unwrap());
        assert_eq!(states.g2, GateStatus::Waiting);

        assert_eq!(chronicle.catch_up(), 1);
        let states = derive_gate_states(&chronicle.get_events(&receipt_id).unwrap());
        assert_eq!(states.g2, GateStatus::Passed);
    }

    #[test]
    fn test_lagging_receipt_not_yet_readable() {
        let chronicle = seeded();
        chronicle.set_lagging(true);
        let receipt_id = chronicle
            .submit_intent("proj", None, "x", "op")
            .unwrap()
            .receipt_id
            .unwrap();

        assert!(chronicle.get_events(&receipt_id).is_err());
        // Accepted receipts still take further actions
        assert!(chronicle.authorize_execution(&receipt_id, "op").is_ok());
        chronicle.catch_up();
        assert_eq!(chronicle.get_events(&receipt_id).unwrap().len(), 2);
    }

    #[test]
    fn test_concurrent_reads() {
        let chronicle = Arc::new(seeded());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let c = Arc::clone(&chronicle);
                thread::spawn(move || c.get_project_snapshot("proj").unwrap())
            })
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap().project_id, "proj");
        }
        assert_eq!(chronicle.read_count(), 4);
    }
}
