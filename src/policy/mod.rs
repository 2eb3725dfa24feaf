//! Quarantine policy for Gatewatch.
//!
//! A static, versioned capability matrix that decides which actions the
//! control surface offers at all. Pure lookup; no I/O after load.

pub mod quarantine;

pub use quarantine::{
    AutomationPolicy, Capability, ChatPolicy, ExecutorsPolicy, Feature, McpPolicy,
    QuarantineMode, QuarantinePolicy, DEFAULT_DISABLED_AGENT, POLICY_SCHEMA_VERSION,
};
