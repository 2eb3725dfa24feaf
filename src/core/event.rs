//! Ledger event types.
//!
//! Events arrive from Chronicle already ordered; nothing in this crate
//! re-sorts them. Field names follow the ledger's wire format (camelCase).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One immutable entry in a receipt's event stream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEvent {
    /// Ledger-assigned event identifier.
    pub event_id: String,
    /// What happened.
    pub event_type: EventType,
    /// When the ledger recorded the event.
    pub timestamp: DateTime<Utc>,
    /// The workflow instance this event belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receipt_id: Option<String>,
    /// Who caused the event (operator, executor, system).
    #[serde(default)]
    pub actor_id: String,
    /// Session that produced the event.
    #[serde(default)]
    pub session_id: String,
    /// Event-specific body. Opaque to gate derivation.
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Integrity tag. Carried through, never verified here.
    #[serde(default)]
    pub payload_hash: String,
}

impl LedgerEvent {
    /// Create an event stamped with the current time.
    pub fn new(
        event_id: impl Into<String>,
        event_type: EventType,
        receipt_id: Option<String>,
    ) -> Self {
        Self::with_timestamp(event_id, event_type, receipt_id, Utc::now())
    }

    /// Create an event with a specific timestamp.
    pub fn with_timestamp(
        event_id: impl Into<String>,
        event_type: EventType,
        receipt_id: Option<String>,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            event_id: event_id.into(),
            event_type,
            timestamp,
            receipt_id,
            actor_id: String::new(),
            session_id: String::new(),
            payload: serde_json::Value::Null,
            payload_hash: String::new(),
        }
    }

    /// Set the actor and session.
    pub fn with_actor(mut self, actor_id: impl Into<String>, session_id: impl Into<String>) -> Self {
        self.actor_id = actor_id.into();
        self.session_id = session_id.into();
        self
    }

    /// Attach a payload.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Closed set of ledger event types.
///
/// Types added to the ledger after this build deserialize as `Unknown` and
/// are ignored by derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    /// G1: an intent was submitted and a receipt created.
    IntentSubmitted,
    /// G2: execution was authorized by an operator.
    ExecutionAuthorized,
    /// G3: the executor produced artifacts for review.
    ArtifactsProduced,
    /// G4: a human recorded an approval decision.
    ApprovalDecision,
    /// G4: the patch was applied.
    PatchApplied,
    /// G4: the patch was rejected.
    PatchRejected,
    /// The backend failed while a gate was waiting.
    SystemError,
    /// Any type this build does not know.
    #[serde(other)]
    Unknown,
}

impl EventType {
    /// Get the wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::IntentSubmitted => "INTENT_SUBMITTED",
            Self::ExecutionAuthorized => "EXECUTION_AUTHORIZED",
            Self::ArtifactsProduced => "ARTIFACTS_PRODUCED",
            Self::ApprovalDecision => "APPROVAL_DECISION",
            Self::PatchApplied => "PATCH_APPLIED",
            Self::PatchRejected => "PATCH_REJECTED",
            Self::SystemError => "SYSTEM_ERROR",
            Self::Unknown => "UNKNOWN",
        }
    }
}

impl std::fmt::Display for EventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wire_event() {
        let json = r#"{
            "eventId": "evt-1",
            "eventType": "INTENT_SUBMITTED",
            "timestamp": "2026-03-01T10:00:00Z",
            "receiptId": "r-1",
            "actorId": "operator:ana",
            "sessionId": "s-1",
            "payload": {"intent": "bump dependency"},
            "payloadHash": "sha256:abc"
        }"#;

        let event: LedgerEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.event_id, "evt-1");
        assert_eq!(event.event_type, EventType::IntentSubmitted);
        assert_eq!(event.receipt_id.as_deref(), Some("r-1"));
        assert_eq!(event.payload["intent"], "bump dependency");
        assert_eq!(event.payload_hash, "sha256:abc");
    }

    #[test]
    fn test_unknown_event_type_does_not_fail() {
        let json = r#"{
            "eventId": "evt-9",
            "eventType": "LANE_RESIZED",
            "timestamp": "2026-03-01T10:00:00Z"
        }"#;

        let event: LedgerEvent = serde_json::from_str(json).unwrap();

        assert_eq!(event.event_type, EventType::Unknown);
        assert!(event.receipt_id.is_none());
        assert!(event.actor_id.is_empty());
        assert!(event.payload.is_null());
    }

    #[test]
    fn test_event_type_wire_names_match_serde() {
        for event_type in [
            EventType::IntentSubmitted,
            EventType::ExecutionAuthorized,
            EventType::ArtifactsProduced,
            EventType::ApprovalDecision,
            EventType::PatchApplied,
            EventType::PatchRejected,
            EventType::SystemError,
        ] {
            let json = serde_json::to_string(&event_type).unwrap();
            assert_eq!(json, format!("\"{}\"", event_type.as_str()));
        }
    }

    #[test]
    fn test_builder_helpers() {
        let event = LedgerEvent::new("evt-2", EventType::PatchApplied, Some("r-2".to_string()))
            .with_actor("operator:ana", "s-9")
            .with_payload(serde_json::json!({"decision": "approve"}));

        assert_eq!(event.actor_id, "operator:ana");
        assert_eq!(event.session_id, "s-9");
        assert_eq!(event.payload["decision"], "approve");
    }
}
