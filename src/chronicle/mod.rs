//! Chronicle ledger collaborators for Gatewatch.
//!
//! The ledger is always the source of truth. This module defines the client
//! seams and two adapters: a local directory layout and an in-memory double.

pub mod file;
pub mod memory;
pub mod traits;

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::Utc;

use crate::core::{EventType, LedgerEvent, ReadinessSnapshot, TicketState};
use crate::error::{GatewatchError, Result};

pub use file::FileChronicle;
pub use memory::MemoryChronicle;
pub use traits::{ActionAck, ActionClient, Decision, LedgerClient};

static ID_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Generate a ledger id.
///
/// Format: `{prefix}_{YYYYMMDDHHMMSS}_{NNNN}`.
pub fn generate_id(prefix: &str) -> String {
    let now = Utc::now();
    let counter = ID_COUNTER.fetch_add(1, Ordering::SeqCst);
    format!(
        "{}_{}_{:04}",
        prefix,
        now.format("%Y%m%d%H%M%S"),
        counter % 10_000
    )
}

/// Build the event an adapter records for a submission.
pub(crate) fn action_event(
    event_type: EventType,
    receipt_id: &str,
    actor_id: &str,
    payload: serde_json::Value,
) -> LedgerEvent {
    LedgerEvent::new(generate_id("evt"), event_type, Some(receipt_id.to_string()))
        .with_actor(actor_id, "gatewatch")
        .with_payload(payload)
}

/// Move a ready ticket into the executing bucket.
///
/// Fails with `Conflict` while any ticket is executing.
pub(crate) fn start_ticket(snapshot: &mut ReadinessSnapshot, ticket_id: &str) -> Result<()> {
    if let Some(active) = snapshot.buckets.executing.first() {
        return Err(GatewatchError::conflict(format!(
            "ticket {} is already executing",
            active.ticket_id
        )));
    }

    let position = snapshot
        .buckets
        .ready
        .iter()
        .position(|t| t.ticket_id == ticket_id);

    match position {
        Some(index) => {
            let entry = snapshot.buckets.ready.remove(index);
            snapshot.buckets.executing.push(entry);
            Ok(())
        }
        None => match snapshot.buckets.locate(ticket_id) {
            Some(state) => Err(GatewatchError::invalid_state(format!(
                "ticket {} is {}, not {}",
                ticket_id,
                state,
                TicketState::Ready
            ))),
            None => Err(GatewatchError::not_found(format!("ticket {}", ticket_id))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::TicketEntry;

    fn snapshot() -> ReadinessSnapshot {
        let mut snap = ReadinessSnapshot::new("proj", Utc::now());
        snap.buckets.ready = vec![TicketEntry::new("T-1", "a"), TicketEntry::new("T-2", "b")];
        snap.buckets.done = vec![TicketEntry::new("T-0", "old")];
        snap
    }

    #[test]
    fn test_generate_id_format() {
        let id = generate_id("evt");
        assert!(id.starts_with("evt_"));
        assert_eq!(id.split('_').count(), 3);
        assert_ne!(generate_id("evt"), generate_id("evt"));
    }

    #[test]
    fn test_start_ticket_moves_to_executing() {
        let mut snap = snapshot();
        start_ticket(&mut snap, "T-2").unwrap();
        assert_eq!(snap.buckets.locate("T-2"), Some(TicketState::Executing));
        assert_eq!(snap.buckets.ready.len(), 1);
    }

    #[test]
    fn test_start_ticket_conflicts_while_executing() {
        let mut snap = snapshot();
        start_ticket(&mut snap, "T-1").unwrap();
        let err = start_ticket(&mut snap, "T-2").unwrap_err();
        assert!(matches!(err, GatewatchError::Conflict { .. }));
        assert!(err.to_string().contains("T-1"));
    }

    #[test]
    fn test_start_ticket_not_ready() {
        let mut snap = snapshot();
        let err = start_ticket(&mut snap, "T-0").unwrap_err();
        assert!(matches!(err, GatewatchError::InvalidState { .. }));

        let err = start_ticket(&mut snap, "T-404").unwrap_err();
        assert!(matches!(err, GatewatchError::NotFound { .. }));
    }

    #[test]
    fn test_action_event_carries_receipt_and_actor() {
        let event = action_event(
            EventType::ExecutionAuthorized,
            "rcpt_1",
            "operator:ana",
            serde_json::Value::Null,
        );
        assert_eq!(event.receipt_id.as_deref(), Some("rcpt_1"));
        assert_eq!(event.actor_id, "operator:ana");
        assert!(event.event_id.starts_with("evt_"));
    }
}
