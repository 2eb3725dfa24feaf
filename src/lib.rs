//! Gatewatch - operator control surface for gated code-change workflows
//!
//! Gatewatch reads an append-only ledger of workflow events and project
//! readiness snapshots, derives the state of each receipt's four gates
//! (intent, execute, review, apply/reject), ranks what can run next, and
//! submits the operator's governed actions. Every action is checked against a
//! fail-closed quarantine policy before it is offered.

pub mod chronicle;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod policy;
pub mod workflow;

pub use chronicle::{
    generate_id, ActionAck, ActionClient, Decision, FileChronicle, LedgerClient, MemoryChronicle,
};
pub use config::Config;
pub use core::{
    aggregate, derive_gate_states, replay_receipt, summarize, EventType, Gate, GateStates,
    GateStatus, LedgerEvent, ReadinessBundle, ReadinessSnapshot, SafetyExplanation,
    SafetyStatus, SafetySummary,
};
pub use error::{GatewatchError, Result};
pub use policy::{Capability, Feature, QuarantineMode, QuarantinePolicy};
pub use workflow::{ActionKind, ActionOutcome, Orchestrator, Poller, SessionContext, WorkflowView};

// CLI commands
pub use cli::{
    ActCommand, GatesCommand, PolicyCommand, ReadinessCommand, SafetyCommand, WatchCommand,
};
