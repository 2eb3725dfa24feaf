//! The quarantine capability matrix.
//!
//! A [`QuarantinePolicy`] is loaded once from configuration and never mutated
//! afterwards. Every capability is a variant of a closed enum, so adding one
//! forces every `match` in this file to be revisited.

use serde::{Deserialize, Serialize};

use crate::error::{GatewatchError, Result};
use crate::workflow::ActionKind;

/// Policy schema version this build understands.
pub const POLICY_SCHEMA_VERSION: u32 = 1;

/// Agent disabled by the shipped policy.
pub const DEFAULT_DISABLED_AGENT: &str = "claude_code";

/// How strictly the policy is enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum QuarantineMode {
    /// Single-attempt execution cannot be turned off.
    #[default]
    Strict,
    /// Single-attempt execution is configurable.
    Standard,
}

impl QuarantineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuarantineMode::Strict => "strict",
            QuarantineMode::Standard => "standard",
        }
    }
}

/// A quarantinable subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Executors,
    Mcp,
    Chat,
    Automation,
}

impl Feature {
    pub const ALL: [Feature; 4] = [
        Feature::Executors,
        Feature::Mcp,
        Feature::Chat,
        Feature::Automation,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Feature::Executors => "executors",
            Feature::Mcp => "mcp",
            Feature::Chat => "chat",
            Feature::Automation => "automation",
        }
    }
}

impl std::fmt::Display for Feature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A fine-grained capability nested under a feature.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    ChatToolCalls,
    ChatStreaming,
    /// Pinned off.
    AutoTaskGeneration,
    /// Pinned off.
    BackgroundAgents,
    SingleAttemptOnly,
}

impl Capability {
    pub const ALL: [Capability; 5] = [
        Capability::ChatToolCalls,
        Capability::ChatStreaming,
        Capability::AutoTaskGeneration,
        Capability::BackgroundAgents,
        Capability::SingleAttemptOnly,
    ];

    /// The feature this capability belongs to.
    pub fn feature(&self) -> Feature {
        match self {
            Capability::ChatToolCalls | Capability::ChatStreaming => Feature::Chat,
            Capability::AutoTaskGeneration | Capability::BackgroundAgents => Feature::Automation,
            Capability::SingleAttemptOnly => Feature::Executors,
        }
    }

    /// Config key for the capability flag.
    pub fn key(&self) -> &'static str {
        match self {
            Capability::ChatToolCalls => "chat.tool_calls_enabled",
            Capability::ChatStreaming => "chat.streaming_enabled",
            Capability::AutoTaskGeneration => "automation.auto_task_generation_enabled",
            Capability::BackgroundAgents => "automation.background_agents_enabled",
            Capability::SingleAttemptOnly => "executors.single_attempt_only",
        }
    }

    /// Whether the capability is permanently disabled.
    pub fn is_pinned_off(&self) -> bool {
        matches!(
            self,
            Capability::AutoTaskGeneration | Capability::BackgroundAgents
        )
    }
}

impl std::fmt::Display for Capability {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// `[quarantine.executors]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ExecutorsPolicy {
    pub enabled: bool,
    /// Refuse to start a ticket while another is executing.
    pub single_attempt_only: bool,
    /// Agents that may never be used as executors.
    pub disabled_agents: Vec<String>,
}

impl Default for ExecutorsPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            single_attempt_only: true,
            disabled_agents: vec![DEFAULT_DISABLED_AGENT.to_string()],
        }
    }
}

/// `[quarantine.mcp]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct McpPolicy {
    pub enabled: bool,
}

/// `[quarantine.chat]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct ChatPolicy {
    pub enabled: bool,
    pub tool_calls_enabled: bool,
    pub streaming_enabled: bool,
}

impl Default for ChatPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            tool_calls_enabled: false,
            streaming_enabled: true,
        }
    }
}

/// `[quarantine.automation]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct AutomationPolicy {
    pub enabled: bool,
    /// Must stay false.
    pub auto_task_generation_enabled: bool,
    /// Must stay false.
    pub background_agents_enabled: bool,
}

/// Process-wide capability matrix.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct QuarantinePolicy {
    pub version: u32,
    pub mode: QuarantineMode,
    pub executors: ExecutorsPolicy,
    pub mcp: McpPolicy,
    pub chat: ChatPolicy,
    pub automation: AutomationPolicy,
}

impl Default for QuarantinePolicy {
    fn default() -> Self {
        Self {
            version: POLICY_SCHEMA_VERSION,
            mode: QuarantineMode::Strict,
            executors: ExecutorsPolicy::default(),
            mcp: McpPolicy::default(),
            chat: ChatPolicy::default(),
            automation: AutomationPolicy::default(),
        }
    }
}

impl QuarantinePolicy {
    /// Parse a standalone policy document and validate it.
    pub fn from_toml(content: &str) -> Result<Self> {
        let policy: QuarantinePolicy =
            toml::from_str(content).map_err(|e| GatewatchError::config(e.to_string()))?;
        policy.ensure_valid()?;
        Ok(policy)
    }

    /// Whether a whole subsystem is switched off.
    pub fn is_quarantined(&self, feature: Feature) -> bool {
        let enabled = match feature {
            Feature::Executors => self.executors.enabled,
            Feature::Mcp => self.mcp.enabled,
            Feature::Chat => self.chat.enabled,
            Feature::Automation => self.automation.enabled,
        };
        !enabled
    }

    /// Whether an agent is on the deny-list.
    pub fn is_agent_disabled(&self, agent_id: &str) -> bool {
        self.executors.disabled_agents.iter().any(|a| a == agent_id)
    }

    /// Whether a capability is usable.
    ///
    /// A capability under a quarantined feature is never allowed, and pinned
    /// capabilities are never allowed whatever the flags say.
    pub fn allows(&self, capability: Capability) -> bool {
        if self.is_quarantined(capability.feature()) {
            return false;
        }
        match capability {
            Capability::ChatToolCalls => self.chat.tool_calls_enabled,
            Capability::ChatStreaming => self.chat.streaming_enabled,
            Capability::AutoTaskGeneration | Capability::BackgroundAgents => false,
            Capability::SingleAttemptOnly => self.executors.single_attempt_only,
        }
    }

    pub fn chat_tool_calls_enabled(&self) -> bool {
        self.allows(Capability::ChatToolCalls)
    }

    pub fn chat_streaming_enabled(&self) -> bool {
        self.allows(Capability::ChatStreaming)
    }

    pub fn auto_task_generation_enabled(&self) -> bool {
        self.allows(Capability::AutoTaskGeneration)
    }

    pub fn background_agents_enabled(&self) -> bool {
        self.allows(Capability::BackgroundAgents)
    }

    /// Whether execution is limited to one ticket at a time.
    pub fn single_attempt_only(&self) -> bool {
        self.allows(Capability::SingleAttemptOnly)
    }

    /// Whether an action is offered at all for the given agent.
    ///
    /// Executor actions need executors enabled and the agent off the
    /// deny-list. Human decisions are always offered by policy; gate state
    /// decides the rest.
    pub fn offers(&self, action: ActionKind, agent_id: &str) -> bool {
        match action {
            ActionKind::AuthorizeExecution | ActionKind::ExecuteTicket => {
                !self.is_quarantined(Feature::Executors) && !self.is_agent_disabled(agent_id)
            }
            ActionKind::SubmitIntent | ActionKind::Approve | ActionKind::Reject => true,
        }
    }

    /// Every capability with its effective value.
    pub fn capability_table(&self) -> Vec<(Capability, bool)> {
        Capability::ALL
            .into_iter()
            .map(|cap| (cap, self.allows(cap)))
            .collect()
    }

    /// Pinned-off capabilities this policy turns on.
    pub fn pinned_violations(&self) -> Vec<String> {
        Capability::ALL
            .into_iter()
            .filter(|cap| cap.is_pinned_off() && self.configured(*cap))
            .map(|cap| format!("{} is pinned to false", cap.key()))
            .collect()
    }

    /// The flag as written, ignoring feature quarantine and pins.
    fn configured(&self, capability: Capability) -> bool {
        match capability {
            Capability::ChatToolCalls => self.chat.tool_calls_enabled,
            Capability::ChatStreaming => self.chat.streaming_enabled,
            Capability::AutoTaskGeneration => self.automation.auto_task_generation_enabled,
            Capability::BackgroundAgents => self.automation.background_agents_enabled,
            Capability::SingleAttemptOnly => self.executors.single_attempt_only,
        }
    }

    /// Collect every violation of the pinned invariants.
    pub fn validate(&self) -> Vec<String> {
        let mut violations = Vec::new();

        if self.version != POLICY_SCHEMA_VERSION {
            violations.push(format!(
                "quarantine.version {} is not supported (expected {})",
                self.version, POLICY_SCHEMA_VERSION
            ));
        }
        violations.extend(self.pinned_violations());
        if self.mode == QuarantineMode::Strict && !self.executors.single_attempt_only {
            violations.push(format!(
                "{} cannot be disabled in strict mode",
                Capability::SingleAttemptOnly.key()
            ));
        }

        violations
    }

    /// Fail with a `PolicyViolation` if [`validate`](Self::validate) finds anything.
    pub fn ensure_valid(&self) -> Result<()> {
        let violations = self.validate();
        if violations.is_empty() {
            Ok(())
        } else {
            Err(GatewatchError::policy_violation(violations))
        }
    }
}
