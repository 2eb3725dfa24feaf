//! CLI commands for Gatewatch.
//!
//! - **Read-only views**: gates, readiness, safety, policy
//! - **Actions**: act (one governed action per invocation)
//! - **Polling**: watch

// Read-only views
pub mod gates_cmd;
pub mod policy_cmd;
pub mod readiness_cmd;
pub mod safety_cmd;

// Actions
pub mod act;

// Polling
pub mod watch;

pub use act::{ActCommand, ActOutput, ActRequest};
pub use gates_cmd::GatesCommand;
pub use policy_cmd::PolicyCommand;
pub use readiness_cmd::ReadinessCommand;
pub use safety_cmd::SafetyCommand;
pub use watch::WatchCommand;
