//! Unified error types for Gatewatch.
//!
//! Errors split along one line: configuration and policy errors are fatal and
//! stop the process before any action is offered (fail-closed), everything
//! else is recoverable and is turned into orchestrator state instead of being
//! propagated as a crash. Pure derivation never returns an error.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// The main error type for Gatewatch operations.
#[derive(Error, Debug)]
pub enum GatewatchError {
    /// I/O errors from the local ledger directory or config files.
    #[error("storage error at {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// Ledger fetch or action submission failures.
    #[error("ledger error: {message}")]
    Ledger { message: String },

    /// JSON or TOML parsing/serialization errors.
    #[error("serialization error: {message}")]
    Serde { message: String },

    /// Configuration loading errors.
    #[error("config error: {message}")]
    Config { message: String },

    /// A permanently disabled capability was configured as enabled.
    #[error("quarantine policy violation: {}", violations.join("; "))]
    PolicyViolation { violations: Vec<String> },

    /// The backend rejected an action because another attempt is in flight.
    #[error("conflict: {message}")]
    Conflict { message: String },

    /// An action was requested that the current gate state does not permit.
    #[error("invalid state: {message}")]
    InvalidState { message: String },

    /// Receipt or project not known to the ledger.
    #[error("not found: {what}")]
    NotFound { what: String },
}

/// A specialized Result type for Gatewatch operations.
pub type Result<T> = std::result::Result<T, GatewatchError>;

impl GatewatchError {
    /// Create a storage error from an I/O error.
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Storage {
            path: path.into(),
            source,
        }
    }

    /// Create a ledger error.
    pub fn ledger(message: impl Into<String>) -> Self {
        Self::Ledger {
            message: message.into(),
        }
    }

    /// Create a serialization error.
    pub fn serde(message: impl Into<String>) -> Self {
        Self::Serde {
            message: message.into(),
        }
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a policy violation error.
    pub fn policy_violation(violations: Vec<String>) -> Self {
        Self::PolicyViolation { violations }
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict {
            message: message.into(),
        }
    }

    /// Create an invalid state error.
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Self::InvalidState {
            message: message.into(),
        }
    }

    /// Create a not found error.
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound { what: what.into() }
    }

    /// Check whether the orchestrator can absorb this error as state.
    ///
    /// Config and policy errors are fatal: they must stop the process before
    /// the control surface becomes interactive.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Config { .. } | Self::PolicyViolation { .. })
    }
}

impl From<io::Error> for GatewatchError {
    fn from(err: io::Error) -> Self {
        Self::Storage {
            path: PathBuf::new(),
            source: err,
        }
    }
}

impl From<serde_json::Error> for GatewatchError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serde {
            message: err.to_string(),
        }
    }
}

/// Exit codes for the Gatewatch CLI.
pub mod exit_codes {
    /// Command completed.
    pub const OK: i32 = 0;

    /// Command failed (fetch error, bad input).
    pub const ERROR: i32 = 1;

    /// Configuration rejected by the quarantine policy.
    pub const POLICY_VIOLATION: i32 = 2;

    /// Action was not offered or was rejected by the backend.
    pub const REJECTED: i32 = 3;
}
