//! Core derivation for Gatewatch.
//!
//! Everything here is a pure function of its input: gate states from an event
//! stream, the readiness bundle from a project snapshot, and the safety
//! summary from a list of checks. Nothing in this module performs I/O or holds
//! session state.

pub mod event;
pub mod evidence;
pub mod gates;
pub mod readiness;

pub use event::{EventType, LedgerEvent};
pub use evidence::{summarize, EvidenceGroups, SafetyExplanation, SafetyStatus, SafetySummary};
pub use gates::{derive_gate_states, replay_receipt, Gate, GateStates, GateStatus};
pub use readiness::{
    aggregate, BackpressureStatus, BlockingReason, BucketCounts, EligibleTicket, LaneCapacity,
    LaneStatus, OrphanExplanation, ParallelSetProposal, ParallelSetView, PendingApproval,
    ProposalStatus, ReadinessBundle, ReadinessSnapshot, TicketBuckets, TicketEntry,
    TicketExplanation, TicketState, NO_REASON_RECORDED,
};
