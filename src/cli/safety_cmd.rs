//! Safety command for Gatewatch.
//!
//! Summarizes a file of safety checks and renders the evidence tree.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::{SafetyExplanation, SafetySummary};

/// Options for the safety command.
#[derive(Debug, Clone, Default)]
pub struct SafetyOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
    /// Show collapsed passing checks.
    pub expand: bool,
}

/// Accepted input shapes: a bare list, or a list with its capture time.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum SafetyInput {
    Captured {
        explanations: Vec<SafetyExplanation>,
        #[serde(rename = "computedAt", alias = "computed_at")]
        computed_at: DateTime<Utc>,
    },
    Bare(Vec<SafetyExplanation>),
}

/// Output format for the safety command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SafetyOutput {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<SafetySummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SafetyOutput {
    pub fn success(summary: SafetySummary) -> Self {
        Self {
            success: true,
            summary: Some(summary),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            summary: None,
            error: Some(error.into()),
        }
    }
}

/// The safety command implementation.
#[derive(Debug, Default)]
pub struct SafetyCommand;

impl SafetyCommand {
    pub fn new() -> Self {
        Self
    }

    /// Run the safety command on a JSON file.
    ///
    /// A bare list has no capture time of its own and is stamped with `now`.
    pub fn run(&self, path: &Path, now: DateTime<Utc>) -> SafetyOutput {
        let content = match fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) => return SafetyOutput::failure(format!("{}: {}", path.display(), e)),
        };
        self.run_str(&content, now)
    }

    /// Run the safety command on JSON text.
    pub fn run_str(&self, content: &str, now: DateTime<Utc>) -> SafetyOutput {
        match serde_json::from_str::<SafetyInput>(content) {
            Ok(SafetyInput::Captured {
                explanations,
                computed_at,
            }) => SafetyOutput::success(SafetySummary::new(explanations, computed_at)),
            Ok(SafetyInput::Bare(explanations)) => {
                SafetyOutput::success(SafetySummary::new(explanations, now))
            }
            Err(e) => SafetyOutput::failure(format!("invalid safety payload: {}", e)),
        }
    }

    /// Format the output for display.
    pub fn format_output(&self, output: &SafetyOutput, options: &SafetyOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        match &output.summary {
            Some(summary) => format!(
                "Overall: {} ({} checks)\n{}",
                summary.overall.tag(),
                summary.explanations.len(),
                summary.groups().render_tree(options.expand)
            ),
            None => format!(
                "Safety check failed: {}\n",
                output.error.as_deref().unwrap_or("unknown error")
            ),
        }
    }
}
