//! Hookgate configuration stored in `.hookgate/config.toml`.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::types::GateMode;

/// Default config location, relative to the working directory.
pub const DEFAULT_CONFIG_PATH: &str = ".hookgate/config.toml";

pub const ENV_STATE_DIR: &str = "HOOKGATE_STATE_DIR";
pub const ENV_HYDRATION_MODE: &str = "HYDRATION_GATE_MODE";
pub const ENV_DETECTOR_MODE: &str = "FALLBACK_GATE_MODE";
pub const ENV_CUSTODIET_MODE: &str = "CUSTODIET_MODE";
pub const ENV_CUSTODIET_THRESHOLD: &str = "CUSTODIET_TOOL_CALL_THRESHOLD";

/// Hookgate configuration (TOML).
///
/// Missing fields take the built-in defaults, so an empty file is valid.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HookgateConfig {
    /// Root directory for per-session state records.
    pub state_dir: PathBuf,

    /// Exit with `exit_codes::WARN` when the verdict is WARN.
    pub exit_nonzero_on_warn: bool,

    pub hydration: HydrationConfig,
    pub detector: DetectorConfig,
    pub custodiet: CustodietConfig,
    pub gates: GatesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct HydrationConfig {
    pub mode: GateMode,
    /// Capability the agent is told to invoke before other work.
    pub resolving_capability: String,
    /// Case-insensitive fragment identifying the resolving tool call.
    pub resolving_keyword: String,
    /// Directory the resolving workflow may read while hydration is pending.
    pub scratch_dir: PathBuf,
    /// Capability the agent is told to invoke once a plan is produced.
    pub review_capability: String,
    /// Environment variable that marks a subordinate session.
    pub subagent_env_var: String,
    /// Phrases that open a pre-hydrated worker prompt.
    pub worker_intro_phrases: Vec<String>,
    /// Workflows that do not need a review step.
    pub streamlined_workflows: Vec<String>,
}

impl Default for HydrationConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::Block,
            resolving_capability: "prompt-hydrator".to_string(),
            resolving_keyword: "hydrator".to_string(),
            scratch_dir: PathBuf::from("/tmp/claude-hydrator"),
            review_capability: "critic".to_string(),
            subagent_env_var: "CLAUDE_AGENT_TYPE".to_string(),
            worker_intro_phrases: vec!["You are a polecat worker".to_string()],
            streamlined_workflows: vec![
                "interactive-followup".to_string(),
                "simple-question".to_string(),
                "direct-skill".to_string(),
            ],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct DetectorConfig {
    pub mode: GateMode,
    /// Target-path fragments whose edits are not scanned.
    pub exempt_paths: Vec<String>,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::Block,
            exempt_paths: vec!["tests/fixtures/".to_string()],
        }
    }
}

/// Periodic compliance check on write tools.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CustodietConfig {
    pub mode: GateMode,
    /// Tool calls allowed between compliance checks.
    pub threshold: u32,
    /// Capability that performs the check and resets the counter.
    pub capability: String,
}

impl Default for CustodietConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::Warn,
            threshold: 7,
            capability: "custodiet".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct GatesConfig {
    /// Gate names removed from the standard registry.
    pub disabled: Vec<String>,
}

impl Default for HookgateConfig {
    fn default() -> Self {
        Self {
            state_dir: PathBuf::from(".hookgate/sessions"),
            exit_nonzero_on_warn: false,
            hydration: HydrationConfig::default(),
            detector: DetectorConfig::default(),
            custodiet: CustodietConfig::default(),
            gates: GatesConfig::default(),
        }
    }
}

impl HookgateConfig {
    pub fn validate(&self) -> Result<()> {
        if self.state_dir.as_os_str().is_empty() {
            return Err(anyhow!("state_dir must be non-empty"));
        }
        if self.hydration.resolving_capability.trim().is_empty() {
            return Err(anyhow!("hydration.resolving_capability must be non-empty"));
        }
        if self.hydration.resolving_keyword.trim().is_empty() {
            return Err(anyhow!("hydration.resolving_keyword must be non-empty"));
        }
        if !self.hydration.scratch_dir.is_absolute() {
            return Err(anyhow!("hydration.scratch_dir must be an absolute path"));
        }
        if self.hydration.review_capability.trim().is_empty() {
            return Err(anyhow!("hydration.review_capability must be non-empty"));
        }
        if self.detector.exempt_paths.iter().any(|p| p.trim().is_empty()) {
            return Err(anyhow!("detector.exempt_paths must not contain empty entries"));
        }
        if self.custodiet.threshold == 0 {
            return Err(anyhow!("custodiet.threshold must be at least 1"));
        }
        if self.custodiet.capability.trim().is_empty() {
            return Err(anyhow!("custodiet.capability must be non-empty"));
        }
        Ok(())
    }

    /// Apply environment overrides on top of file values.
    ///
    /// `lookup` abstracts the process environment so tests stay hermetic.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        if let Some(dir) = set(ENV_STATE_DIR) {
            self.state_dir = PathBuf::from(dir);
        }
        if let Some(mode) = set(ENV_HYDRATION_MODE) {
            self.hydration.mode = mode
                .parse()
                .with_context(|| format!("parse {ENV_HYDRATION_MODE}"))?;
        }
        if let Some(mode) = set(ENV_DETECTOR_MODE) {
            self.detector.mode = mode
                .parse()
                .with_context(|| format!("parse {ENV_DETECTOR_MODE}"))?;
        }
        if let Some(mode) = set(ENV_CUSTODIET_MODE) {
            self.custodiet.mode = mode
                .parse()
                .with_context(|| format!("parse {ENV_CUSTODIET_MODE}"))?;
        }
        if let Some(threshold) = set(ENV_CUSTODIET_THRESHOLD) {
            self.custodiet.threshold = threshold
                .trim()
                .parse()
                .with_context(|| format!("parse {ENV_CUSTODIET_THRESHOLD}"))?;
        }
        Ok(())
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `HookgateConfig::default()`.
pub fn load_config(path: &Path) -> Result<HookgateConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "config missing, using defaults");
        let cfg = HookgateConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: HookgateConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Load config from `path` and layer the process environment on top.
pub fn resolve_config(path: &Path) -> Result<HookgateConfig> {
    let mut cfg = load_config(path)?;
    cfg.apply_env(|key| std::env::var(key).ok())?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &HookgateConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, buf)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
