//! Workflow orchestration for Gatewatch.
//!
//! The orchestrator is the single owner of session state. It fetches through
//! the ledger collaborators, feeds the pure derivation in [`crate::core`], and
//! offers only the actions that policy and gate state allow.

pub mod orchestrator;
pub mod poller;
pub mod session;

pub use orchestrator::{ActionOutcome, Orchestrator, WorkflowView};
pub use poller::{PollSummary, Poller};
pub use session::{ActionKind, PendingAction, SessionContext};
