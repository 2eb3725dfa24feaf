//! Policy command for Gatewatch.
//!
//! Prints the effective quarantine policy, the capability table, and every
//! setting that differs from the shipped defaults.

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::policy::{Feature, QuarantinePolicy};

/// Options for the policy command.
#[derive(Debug, Clone, Default)]
pub struct PolicyOptions {
    /// Output as JSON.
    pub json: bool,
    /// Suppress output.
    pub quiet: bool,
}

/// One row of the capability table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CapabilityInfo {
    pub key: String,
    pub feature: Feature,
    pub allowed: bool,
    pub pinned_off: bool,
}

/// A setting that differs from the default.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConfigChange {
    pub key: String,
    pub default: String,
    pub effective: String,
}

/// Output format for the policy command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyOutput {
    pub success: bool,
    pub version: u32,
    pub mode: String,
    pub quarantined: Vec<Feature>,
    pub disabled_agents: Vec<String>,
    pub capabilities: Vec<CapabilityInfo>,
    pub agent_id: String,
    pub agent_disabled: bool,
    pub changes: Vec<ConfigChange>,
}

/// The policy command implementation.
pub struct PolicyCommand {
    config: Config,
}

impl PolicyCommand {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    fn policy(&self) -> &QuarantinePolicy {
        &self.config.quarantine
    }

    /// Run the policy command.
    pub fn run(&self) -> PolicyOutput {
        let policy = self.policy();
        let agent_id = self.config.operator.agent_id.clone();

        PolicyOutput {
            success: true,
            version: policy.version,
            mode: policy.mode.as_str().to_string(),
            quarantined: Feature::ALL
                .into_iter()
                .filter(|f| policy.is_quarantined(*f))
                .collect(),
            disabled_agents: policy.executors.disabled_agents.clone(),
            capabilities: policy
                .capability_table()
                .into_iter()
                .map(|(cap, allowed)| CapabilityInfo {
                    key: cap.key().to_string(),
                    feature: cap.feature(),
                    allowed,
                    pinned_off: cap.is_pinned_off(),
                })
                .collect(),
            agent_disabled: policy.is_agent_disabled(&agent_id),
            agent_id,
            changes: Config::default()
                .diff(&self.config)
                .into_iter()
                .map(|(key, default, effective)| ConfigChange {
                    key,
                    default,
                    effective,
                })
                .collect(),
        }
    }

    /// Format the output for display.
    pub fn format_output(&self, output: &PolicyOutput, options: &PolicyOptions) -> String {
        if options.quiet {
            return String::new();
        }
        if options.json {
            return serde_json::to_string_pretty(output).unwrap_or_else(|_| "{}".to_string());
        }

        let mut lines = vec![format!(
            "Quarantine policy v{} ({} mode)",
            output.version, output.mode
        )];

        let quarantined: Vec<&str> = output.quarantined.iter().map(|f| f.as_str()).collect();
        lines.push(format!(
            "Quarantined features: {}",
            if quarantined.is_empty() {
                "none".to_string()
            } else {
                quarantined.join(", ")
            }
        ));
        lines.push(format!(
            "Disabled agents: {}",
            output.disabled_agents.join(", ")
        ));
        lines.push(format!(
            "Operator agent: {}{}",
            output.agent_id,
            if output.agent_disabled {
                " (DISABLED: execution will not be offered)"
            } else {
                ""
            }
        ));

        lines.push(String::new());
        lines.push("Capabilities".to_string());
        for cap in &output.capabilities {
            let state = match (cap.allowed, cap.pinned_off) {
                (_, true) => "off (pinned)",
                (true, false) => "on",
                (false, false) => "off",
            };
            lines.push(format!("  {:<42} {}", cap.key, state));
        }

        if !output.changes.is_empty() {
            lines.push(String::new());
            lines.push("Changed from defaults".to_string());
            for change in &output.changes {
                lines.push(format!(
                    "  {}: {} -> {}",
                    change.key, change.default, change.effective
                ));
            }
        }

        lines.join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_output() {
        let cmd = PolicyCommand::new(Config::default());
        let output = cmd.run();

        assert!(output.success);
        assert_eq!(output.version, 1);
        assert_eq!(output.mode, "strict");
        assert_eq!(output.quarantined, vec![Feature::Mcp, Feature::Automation]);
        assert_eq!(output.disabled_agents, vec!["claude_code"]);
        assert!(!output.agent_disabled);
        assert!(output.changes.is_empty());

        let pinned: Vec<&str> = output
            .capabilities
            .iter()
            .filter(|c| c.pinned_off)
            .map(|c| c.key.as_str())
            .collect();
        assert_eq!(
            pinned,
            vec![
                "automation.auto_task_generation_enabled",
                "automation.background_agents_enabled"
            ]
        );
        assert!(output.capabilities.iter().filter(|c| c.pinned_off).all(|c| !c.allowed));
    }

    #[test]
    fn test_disabled_operator_agent_flagged() {
        let mut config = Config::default();
        config.operator.agent_id = "claude_code".to_string();
        let cmd = PolicyCommand::new(config);
        let output = cmd.run();

        assert!(output.agent_disabled);
        let text = cmd.format_output(&output, &PolicyOptions::default());
        assert!(text.contains("DISABLED"));
        assert!(text.contains("operator.agent_id: codex -> claude_code"));
    }

    #[test]
    fn test_human_output_table() {
        let cmd = PolicyCommand::new(Config::default());
        let text = cmd.format_output(&cmd.run(), &PolicyOptions::default());

        assert!(text.starts_with("Quarantine policy v1 (strict mode)"));
        assert!(text.contains("Quarantined features: mcp, automation"));
        assert!(text.contains("off (pinned)"));
        assert!(!text.contains("Changed from defaults"));
    }

    #[test]
    fn test_json_output() {
        let cmd = PolicyCommand::new(Config::default());
        let json = cmd.format_output(
            &cmd.run(),
            &PolicyOptions {
                json: true,
                quiet: false,
            },
        );
        let parsed: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed["quarantined"][0], "mcp");
        assert_eq!(parsed["capabilities"].as_array().unwrap().len(), 5);
    }
}
