//! Test-only helpers: in-memory state, a gate harness, and temp state dirs.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde_json::Value;
use tempfile::TempDir;

use crate::core::event::{EventContext, NormalizeOptions};
use crate::core::types::Verdict;
use crate::gates::{GateDeps, GateRegistry};
use crate::io::config::{HookgateConfig, write_config};
use crate::io::session_store::{SessionStore, StateStore};
use crate::io::templates::MessageTemplates;

#[derive(Debug, Clone, Default)]
struct MemoryRecord {
    flags: BTreeMap<String, bool>,
    values: BTreeMap<String, String>,
}

/// [`StateStore`] kept in memory, with the same create/clear semantics as the
/// file-backed store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RefCell<HashMap<String, MemoryRecord>>,
}

impl MemoryStore {
    pub fn has_record(&self, session_id: &str) -> bool {
        self.records.borrow().contains_key(session_id)
    }

    pub fn session_count(&self) -> usize {
        self.records.borrow().len()
    }
}

impl StateStore for MemoryStore {
    fn get_flag(&self, session_id: &str, key: &str) -> bool {
        self.records
            .borrow()
            .get(session_id)
            .and_then(|record| record.flags.get(key).copied())
            .unwrap_or(false)
    }

    fn set_flag(&self, session_id: &str, key: &str, value: bool) {
        self.records
            .borrow_mut()
            .entry(session_id.to_string())
            .or_default()
            .flags
            .insert(key.to_string(), value);
    }

    fn clear_flag(&self, session_id: &str, key: &str) {
        if let Some(record) = self.records.borrow_mut().get_mut(session_id) {
            record.flags.insert(key.to_string(), false);
        }
    }

    fn get_value(&self, session_id: &str, key: &str) -> Option<String> {
        self.records
            .borrow()
            .get(session_id)
            .and_then(|record| record.values.get(key).cloned())
    }

    fn set_value(&self, session_id: &str, key: &str, value: &str) {
        self.records
            .borrow_mut()
            .entry(session_id.to_string())
            .or_default()
            .values
            .insert(key.to_string(), value.to_string());
    }
}

/// Gate collaborators backed by a [`MemoryStore`] and default config.
pub struct GateHarness {
    pub store: MemoryStore,
    pub config: HookgateConfig,
    pub templates: MessageTemplates,
    pub subagent_process: bool,
}

impl Default for GateHarness {
    fn default() -> Self {
        Self::new()
    }
}

impl GateHarness {
    pub fn new() -> Self {
        Self {
            store: MemoryStore::default(),
            config: HookgateConfig::default(),
            templates: MessageTemplates::new(),
            subagent_process: false,
        }
    }

    pub fn deps(&self) -> GateDeps<'_> {
        GateDeps {
            store: &self.store,
            config: &self.config,
            templates: &self.templates,
            subagent_process: self.subagent_process,
        }
    }

    pub fn event(&self, raw: Value) -> EventContext {
        EventContext::normalize(&raw, &NormalizeOptions::default())
    }

    /// Dispatch `raw` through the standard registry for the current config.
    pub fn dispatch(&self, raw: Value) -> Option<Verdict> {
        let ctx = self.event(raw);
        GateRegistry::standard(&self.config).dispatch(&ctx, &self.deps())
    }
}

/// Temporary working directory with a config file pointing at its own state dir.
pub struct TestWorkspace {
    temp: TempDir,
}

impl TestWorkspace {
    pub fn new() -> Result<Self> {
        let temp = tempfile::tempdir().context("create tempdir")?;
        let workspace = Self { temp };
        workspace.write_config(&workspace.config())?;
        Ok(workspace)
    }

    pub fn path(&self) -> &Path {
        self.temp.path()
    }

    pub fn state_dir(&self) -> PathBuf {
        self.path().join("state")
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("hookgate.toml")
    }

    /// Default config rooted in this workspace.
    pub fn config(&self) -> HookgateConfig {
        HookgateConfig {
            state_dir: self.state_dir(),
            ..HookgateConfig::default()
        }
    }

    pub fn write_config(&self, config: &HookgateConfig) -> Result<()> {
        write_config(&self.config_path(), config)
    }

    pub fn store(&self) -> SessionStore {
        SessionStore::new(self.state_dir())
    }
}

/// Read a detector fixture from `tests/fixtures/fallback/`.
pub fn fallback_fixture(name: &str) -> Result<String> {
    let path = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures/fallback")
        .join(name);
    fs::read_to_string(&path).with_context(|| format!("read fixture {}", path.display()))
}
