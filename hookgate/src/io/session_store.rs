//! Per-session state that survives across independent hook processes.
//!
//! Each session owns one JSON record at
//! `<state_dir>/<YYYYMMDD>-<safe-id>/session-state.json`, where the date is the
//! day the record was created. Lookups check today's directory first and then
//! yesterday's, so a session that crosses midnight keeps its state.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use jsonschema::validator_for;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

const SESSION_SCHEMA: &str = include_str!("../../schemas/session_state.schema.json");
const RECORD_FILE: &str = "session-state.json";
const DIR_DATE_FORMAT: &str = "%Y%m%d";
const RECORD_DATE_FORMAT: &str = "%Y-%m-%d";

/// Flag and value storage keyed by session id.
///
/// Implementations fail open: read errors report the flag as unset and write
/// errors are logged and dropped, so a broken store never blocks the host.
pub trait StateStore {
    fn get_flag(&self, session_id: &str, key: &str) -> bool;
    fn set_flag(&self, session_id: &str, key: &str, value: bool);
    /// Set the flag to false. Does nothing when the session has no record.
    fn clear_flag(&self, session_id: &str, key: &str);
    fn get_value(&self, session_id: &str, key: &str) -> Option<String>;
    fn set_value(&self, session_id: &str, key: &str, value: &str);
}

/// Persisted session record (`session-state.json`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SessionRecord {
    pub session_id: String,
    /// Creation day (`YYYY-MM-DD`, UTC); selects the record's directory.
    pub date: String,
    pub created_at: String,
    pub updated_at: String,
    #[serde(default)]
    pub flags: BTreeMap<String, bool>,
    #[serde(default)]
    pub values: BTreeMap<String, String>,
}

impl SessionRecord {
    pub fn new(session_id: &str, now: DateTime<Utc>) -> Self {
        let stamp = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        Self {
            session_id: session_id.to_string(),
            date: now.format(RECORD_DATE_FORMAT).to_string(),
            created_at: stamp.clone(),
            updated_at: stamp,
            flags: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    pub fn flag(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    fn created_on(&self) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(&self.date, RECORD_DATE_FORMAT)
            .with_context(|| format!("parse record date {}", self.date))
    }
}

/// File-backed [`StateStore`].
#[derive(Debug, Clone)]
pub struct SessionStore {
    state_dir: PathBuf,
    fixed_now: Option<DateTime<Utc>>,
}

impl SessionStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self {
            state_dir: state_dir.into(),
            fixed_now: None,
        }
    }

    /// Pin the store's clock (date-partition tests).
    pub fn with_now(mut self, now: DateTime<Utc>) -> Self {
        self.fixed_now = Some(now);
        self
    }

    fn now(&self) -> DateTime<Utc> {
        self.fixed_now.unwrap_or_else(Utc::now)
    }

    /// Record path for a session created on `date`.
    pub fn record_path(&self, session_id: &str, date: NaiveDate) -> PathBuf {
        self.state_dir
            .join(format!(
                "{}-{}",
                date.format(DIR_DATE_FORMAT),
                safe_session_id(session_id)
            ))
            .join(RECORD_FILE)
    }

    /// Existing record path, checking today's directory before yesterday's.
    pub fn locate(&self, session_id: &str) -> Option<PathBuf> {
        let today = self.now().date_naive();
        [Some(today), today.pred_opt()]
            .into_iter()
            .flatten()
            .map(|date| self.record_path(session_id, date))
            .find(|path| path.is_file())
    }

    /// Load the session record, if one exists.
    pub fn load(&self, session_id: &str) -> Result<Option<SessionRecord>> {
        let Some(path) = self.locate(session_id) else {
            debug!(session_id, "no session state");
            return Ok(None);
        };
        debug!(path = %path.display(), "loading session state");
        let contents = fs::read_to_string(&path)
            .with_context(|| format!("read session state {}", path.display()))?;
        let value: Value = serde_json::from_str(&contents)
            .with_context(|| format!("parse session state {}", path.display()))?;
        validate_schema(&value).with_context(|| format!("validate {}", path.display()))?;
        let record: SessionRecord = serde_json::from_value(value)
            .with_context(|| format!("deserialize session state {}", path.display()))?;
        if record.session_id != session_id {
            // Distinct ids can share a directory once sanitized (`a/b`, `a_b`).
            warn!(
                session_id,
                stored = %record.session_id,
                path = %path.display(),
                "session state belongs to another session; treating as absent"
            );
            return Ok(None);
        }
        Ok(Some(record))
    }

    /// Atomically write the record into its creation-day directory.
    pub fn save(&self, record: &SessionRecord) -> Result<PathBuf> {
        let path = self.record_path(&record.session_id, record.created_on()?);
        debug!(path = %path.display(), flags = ?record.flags, "writing session state");
        let mut buf = serde_json::to_string_pretty(record).context("serialize session state")?;
        buf.push('\n');
        write_atomic(&path, &buf)?;
        Ok(path)
    }

    /// Read-modify-write, creating the record when absent.
    ///
    /// An unreadable or invalid record is replaced by a fresh one.
    pub fn update<F>(&self, session_id: &str, apply: F) -> Result<SessionRecord>
    where
        F: FnOnce(&mut SessionRecord),
    {
        let now = self.now();
        let mut record = match self.load(session_id) {
            Ok(Some(record)) => record,
            Ok(None) => SessionRecord::new(session_id, now),
            Err(err) => {
                warn!(session_id, error = %format!("{err:#}"), "discarding unreadable session state");
                SessionRecord::new(session_id, now)
            }
        };
        apply(&mut record);
        record.updated_at = now.to_rfc3339_opts(SecondsFormat::Secs, true);
        self.save(&record)?;
        Ok(record)
    }

    /// Set `key` to false on an existing record; never creates one.
    pub fn clear(&self, session_id: &str, key: &str) -> Result<bool> {
        let Some(mut record) = self.load(session_id)? else {
            return Ok(false);
        };
        record.flags.insert(key.to_string(), false);
        record.updated_at = self.now().to_rfc3339_opts(SecondsFormat::Secs, true);
        self.save(&record)?;
        Ok(true)
    }

    fn load_or_warn(&self, session_id: &str) -> Option<SessionRecord> {
        match self.load(session_id) {
            Ok(record) => record,
            Err(err) => {
                warn!(session_id, error = %format!("{err:#}"), "session state unreadable; treating as absent");
                None
            }
        }
    }
}

impl StateStore for SessionStore {
    fn get_flag(&self, session_id: &str, key: &str) -> bool {
        self.load_or_warn(session_id)
            .is_some_and(|record| record.flag(key))
    }

    fn set_flag(&self, session_id: &str, key: &str, value: bool) {
        let result = self.update(session_id, |record| {
            record.flags.insert(key.to_string(), value);
        });
        if let Err(err) = result {
            warn!(session_id, key, error = %format!("{err:#}"), "dropping session flag write");
        }
    }

    fn clear_flag(&self, session_id: &str, key: &str) {
        if let Err(err) = self.clear(session_id, key) {
            warn!(session_id, key, error = %format!("{err:#}"), "dropping session flag clear");
        }
    }

    fn get_value(&self, session_id: &str, key: &str) -> Option<String> {
        self.load_or_warn(session_id)
            .and_then(|mut record| record.values.remove(key))
    }

    fn set_value(&self, session_id: &str, key: &str, value: &str) {
        let result = self.update(session_id, |record| {
            record.values.insert(key.to_string(), value.to_string());
        });
        if let Err(err) = result {
            warn!(session_id, key, error = %format!("{err:#}"), "dropping session value write");
        }
    }
}

/// Replace every character outside `[A-Za-z0-9_-]` with `_`.
pub fn safe_session_id(session_id: &str) -> String {
    session_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

fn validate_schema(record: &Value) -> Result<()> {
    let schema: Value = serde_json::from_str(SESSION_SCHEMA).context("parse session schema")?;
    let compiled = validator_for(&schema).map_err(|err| anyhow!("invalid schema: {}", err))?;
    if !compiled.is_valid(record) {
        let messages = compiled
            .iter_errors(record)
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(anyhow!(
            "session state schema validation failed: {}",
            messages.join("; ")
        ));
    }
    Ok(())
}

/// Write through a uniquely named sibling temp file, then rename over `path`.
fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("session state path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let tmp_path = parent.join(format!(".{RECORD_FILE}.{}.{nanos}.tmp", std::process::id()));
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp session state {}", tmp_path.display()))?;
    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err).with_context(|| format!("replace session state {}", path.display()));
    }
    Ok(())
}
