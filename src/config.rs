//! Configuration loading for Gatewatch.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.gatewatch/config.toml`)
//! 3. User config (`~/.gatewatch/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! Files are overlaid as raw TOML tables, so any key a higher layer sets
//! wins. Missing files are skipped. A file that exists but does not parse is a
//! load error, and the merged quarantine policy is validated before anything is
//! returned: Gatewatch never runs on a policy it could not check.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GatewatchError, Result};
use crate::policy::QuarantinePolicy;

/// Minimum refresh interval in seconds.
pub const MIN_POLL_INTERVAL_SECONDS: u64 = 1;

/// Main configuration struct for Gatewatch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Where the ledger lives.
    pub ledger: LedgerConfig,
    /// Refresh loop settings.
    pub polling: PollingConfig,
    /// Who is operating.
    pub operator: OperatorConfig,
    /// Capability matrix.
    pub quarantine: QuarantinePolicy,
}

/// `[ledger]`
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct LedgerConfig {
    /// Ledger directory. Defaults to `<gatewatch home>/ledger`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
}

/// `[polling]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PollingConfig {
    /// Seconds between refreshes.
    pub interval_seconds: u64,
    /// Refreshes before `watch` exits; 0 means unbounded.
    pub max_polls: u64,
}

impl PollingConfig {
    pub fn is_valid_interval(value: u64) -> bool {
        value >= MIN_POLL_INTERVAL_SECONDS
    }
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            interval_seconds: 5,
            max_polls: 0,
        }
    }
}

/// `[operator]`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OperatorConfig {
    /// Executor agent used for ticket execution.
    pub agent_id: String,
}

impl Default for OperatorConfig {
    fn default() -> Self {
        Self {
            agent_id: "codex".to_string(),
        }
    }
}

impl Config {
    /// Load configuration with full precedence chain from the current directory.
    pub fn load() -> Result<Self> {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(e) => {
                tracing::warn!(error = %e, "current directory unavailable, skipping project config");
                Self::load_layers(&Self::user_config_path().into_iter().collect::<Vec<_>>())
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = Self::user_config_path().into_iter().collect();
        paths.push(project_config_path(cwd));
        Self::load_layers(&paths)
    }

    fn user_config_path() -> Option<PathBuf> {
        gatewatch_home().map(|home| home.join("config.toml"))
    }

    /// Overlay config files in order (later wins), then env, then validate.
    ///
    /// Any key a layer spells out wins over earlier layers, even when it sets
    /// the default value. Pinned quarantine flags are checked per layer, so a
    /// `true` in any file is a violation regardless of what later files say.
    fn load_layers(paths: &[PathBuf]) -> Result<Self> {
        let mut merged = toml::Table::new();
        let mut pinned = Vec::new();

        for path in paths {
            if !path.exists() {
                continue;
            }
            let table = read_table(path)?;
            let layer = from_table(table.clone(), &path.display().to_string())?;
            pinned.extend(
                layer
                    .quarantine
                    .pinned_violations()
                    .into_iter()
                    .map(|v| format!("{} ({})", v, path.display())),
            );
            merge_tables(&mut merged, table);
            tracing::debug!(path = %path.display(), "config layer applied");
        }

        let mut config = from_table(merged, "merged configuration")?;
        config.apply_env_overrides();

        if !pinned.is_empty() {
            return Err(GatewatchError::policy_violation(pinned));
        }
        config.validate()?;

        tracing::debug!(
            agent_id = %config.operator.agent_id,
            interval_seconds = config.polling.interval_seconds,
            "configuration loaded"
        );
        Ok(config)
    }

    /// Load config from a specific file path.
    fn load_from_file(path: &Path) -> Result<Config> {
        from_table(read_table(path)?, &path.display().to_string())
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // GATEWATCH_LEDGER_DIR
        if let Ok(val) = env::var("GATEWATCH_LEDGER_DIR") {
            if val.is_empty() {
                tracing::warn!("GATEWATCH_LEDGER_DIR is empty, ignoring");
            } else {
                self.ledger.dir = Some(PathBuf::from(val));
            }
        }

        // GATEWATCH_POLL_INTERVAL
        if let Ok(val) = env::var("GATEWATCH_POLL_INTERVAL") {
            match val.parse::<u64>() {
                Ok(n) if PollingConfig::is_valid_interval(n) => self.polling.interval_seconds = n,
                _ => tracing::warn!(
                    value = %val,
                    current = self.polling.interval_seconds,
                    "invalid GATEWATCH_POLL_INTERVAL, expected an integer >= {}",
                    MIN_POLL_INTERVAL_SECONDS
                ),
            }
        }

        // GATEWATCH_MAX_POLLS
        if let Ok(val) = env::var("GATEWATCH_MAX_POLLS") {
            match val.parse::<u64>() {
                Ok(n) => self.polling.max_polls = n,
                Err(_) => tracing::warn!(
                    value = %val,
                    current = self.polling.max_polls,
                    "invalid GATEWATCH_MAX_POLLS, expected a non-negative integer"
                ),
            }
        }

        // GATEWATCH_AGENT_ID
        if let Ok(val) = env::var("GATEWATCH_AGENT_ID") {
            if val.trim().is_empty() {
                tracing::warn!("GATEWATCH_AGENT_ID is empty, ignoring");
            } else {
                self.operator.agent_id = val;
            }
        }
    }

    /// Check the merged configuration.
    ///
    /// Quarantine violations come back as `PolicyViolation`, anything else as
    /// `Config`.
    pub fn validate(&self) -> Result<()> {
        if !PollingConfig::is_valid_interval(self.polling.interval_seconds) {
            return Err(GatewatchError::config(format!(
                "polling.interval_seconds must be >= {}",
                MIN_POLL_INTERVAL_SECONDS
            )));
        }
        if self.operator.agent_id.trim().is_empty() {
            return Err(GatewatchError::config("operator.agent_id must not be empty"));
        }
        self.quarantine.ensure_valid()
    }

    /// Ledger directory, falling back to `<gatewatch home>/ledger`.
    pub fn ledger_dir(&self) -> Option<PathBuf> {
        self.ledger
            .dir
            .clone()
            .or_else(|| gatewatch_home().map(|home| home.join("ledger")))
    }

    /// Generate a diff of changed values between two configs.
    ///
    /// Returns a list of (key, old_value, new_value) tuples for changed fields.
    pub fn diff(&self, other: &Config) -> Vec<(String, String, String)> {
        let mut changes = Vec::new();
        let mut push = |key: &str, old: String, new: String| {
            if old != new {
                changes.push((key.to_string(), old, new));
            }
        };

        let show_dir = |dir: &Option<PathBuf>| {
            dir.as_ref()
                .map(|d| d.display().to_string())
                .unwrap_or_default()
        };
        push("ledger.dir", show_dir(&self.ledger.dir), show_dir(&other.ledger.dir));
        push(
            "polling.interval_seconds",
            self.polling.interval_seconds.to_string(),
            other.polling.interval_seconds.to_string(),
        );
        push(
            "polling.max_polls",
            self.polling.max_polls.to_string(),
            other.polling.max_polls.to_string(),
        );
        push(
            "operator.agent_id",
            self.operator.agent_id.clone(),
            other.operator.agent_id.clone(),
        );

        let (a, b) = (&self.quarantine, &other.quarantine);
        push(
            "quarantine.version",
            a.version.to_string(),
            b.version.to_string(),
        );
        push(
            "quarantine.mode",
            a.mode.as_str().to_string(),
            b.mode.as_str().to_string(),
        );
        push(
            "quarantine.executors.enabled",
            a.executors.enabled.to_string(),
            b.executors.enabled.to_string(),
        );
        push(
            "quarantine.executors.single_attempt_only",
            a.executors.single_attempt_only.to_string(),
            b.executors.single_attempt_only.to_string(),
        );
        push(
            "quarantine.executors.disabled_agents",
            a.executors.disabled_agents.join(","),
            b.executors.disabled_agents.join(","),
        );
        push(
            "quarantine.mcp.enabled",
            a.mcp.enabled.to_string(),
            b.mcp.enabled.to_string(),
        );
        push(
            "quarantine.chat.enabled",
            a.chat.enabled.to_string(),
            b.chat.enabled.to_string(),
        );
        push(
            "quarantine.chat.tool_calls_enabled",
            a.chat.tool_calls_enabled.to_string(),
            b.chat.tool_calls_enabled.to_string(),
        );
        push(
            "quarantine.chat.streaming_enabled",
            a.chat.streaming_enabled.to_string(),
            b.chat.streaming_enabled.to_string(),
        );
        push(
            "quarantine.automation.enabled",
            a.automation.enabled.to_string(),
            b.automation.enabled.to_string(),
        );

        changes
    }
}

fn read_table(path: &Path) -> Result<toml::Table> {
    let content = fs::read_to_string(path).map_err(|e| GatewatchError::storage(path, e))?;
    toml::from_str(&content)
        .map_err(|e| GatewatchError::config(format!("{}: {}", path.display(), e)))
}

fn from_table(table: toml::Table, origin: &str) -> Result<Config> {
    toml::Value::Table(table)
        .try_into::<Config>()
        .map_err(|e| GatewatchError::config(format!("{}: {}", origin, e)))
}

/// Overlay `layer` onto `base`: tables merge key by key, other values replace.
fn merge_tables(base: &mut toml::Table, layer: toml::Table) {
    for (key, value) in layer {
        if let toml::Value::Table(incoming) = value {
            if let Some(toml::Value::Table(existing)) = base.get_mut(&key) {
                merge_tables(existing, incoming);
                continue;
            }
            base.insert(key, toml::Value::Table(incoming));
        } else {
            base.insert(key, value);
        }
    }
}

/// Get the Gatewatch home directory.
///
/// Checks `GATEWATCH_HOME` first, then falls back to `~/.gatewatch`. An empty
/// `GATEWATCH_HOME` is ignored.
pub fn gatewatch_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("GATEWATCH_HOME") {
        if home.is_empty() {
            tracing::warn!("GATEWATCH_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("GATEWATCH_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(".gatewatch"));
    }

    let fallback = env::temp_dir().join("gatewatch");
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback.display()
    );
    Some(fallback)
}

/// `.gatewatch/config.toml` under a project directory.
pub fn project_config_path(cwd: &Path) -> PathBuf {
    cwd.join(".gatewatch").join("config.toml")
}
