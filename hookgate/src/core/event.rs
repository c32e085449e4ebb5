//! Normalization of raw host payloads into a uniform event context.
//!
//! Hosts disagree on field names (`hook_event_name` vs `event_name`, `prompt`
//! vs `prompt_response`) and on event names (`BeforeTool` vs `PreToolUse`).
//! Everything downstream sees only [`EventContext`].

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

use crate::core::types::HookEvent;

const EVENT_NAME_KEYS: [&str; 2] = ["hook_event_name", "event_name"];
const PROMPT_KEYS: [&str; 1] = ["prompt"];
const RESPONSE_KEYS: [&str; 2] = ["prompt_response", "response"];
const TEXT_KEYS: [&str; 3] = ["prompt", "prompt_response", "response"];

/// Inputs to normalization that do not come from the payload itself.
#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Event name supplied by the caller; wins over payload fields.
    pub event_override: Option<String>,
    /// Session id from the host environment; used only when the payload has none.
    pub session_fallback: Option<String>,
    /// Timestamp used when the payload carries none (or an unparseable one).
    pub now: DateTime<Utc>,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            event_override: None,
            session_fallback: None,
            now: Utc::now(),
        }
    }
}

/// Uniform view over one host event.
#[derive(Debug, Clone, PartialEq)]
pub struct EventContext {
    pub session_id: Option<String>,
    pub event: Option<HookEvent>,
    /// Event name as the host spelled it (before alias resolution).
    pub raw_event_name: Option<String>,
    pub tool_name: Option<String>,
    pub tool_input: Map<String, Value>,
    /// Prompt text for `PromptSubmit`, response text for `AgentResponse`.
    pub text: Option<String>,
    pub transcript_path: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl EventContext {
    /// Build a context from an arbitrary JSON payload. Never fails.
    pub fn normalize(raw: &Value, options: &NormalizeOptions) -> Self {
        let empty = Map::new();
        let obj = raw.as_object().unwrap_or(&empty);

        let raw_event_name = non_blank(options.event_override.as_deref())
            .or_else(|| first_string(obj, &EVENT_NAME_KEYS));
        let event = raw_event_name.as_deref().and_then(HookEvent::from_host_name);

        let session_id = string_field(obj, "session_id")
            .or_else(|| non_blank(options.session_fallback.as_deref()));

        let tool_input = obj
            .get("tool_input")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        let timestamp = string_field(obj, "timestamp")
            .and_then(|raw| DateTime::parse_from_rfc3339(&raw).ok())
            .map(|ts| ts.with_timezone(&Utc))
            .unwrap_or(options.now);

        Self {
            session_id,
            event,
            raw_event_name,
            tool_name: string_field(obj, "tool_name"),
            tool_input,
            text: first_string(obj, text_keys(event)),
            transcript_path: string_field(obj, "transcript_path"),
            timestamp,
        }
    }

}

/// Gemini's `AfterAgent` carries both the prompt and the response.
fn text_keys(event: Option<HookEvent>) -> &'static [&'static str] {
    match event {
        Some(HookEvent::PromptSubmit) => &PROMPT_KEYS,
        Some(HookEvent::AgentResponse) => &RESPONSE_KEYS,
        _ => &TEXT_KEYS,
    }
}

fn string_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    non_blank(obj.get(key).and_then(Value::as_str))
}

fn first_string(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| string_field(obj, key))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .filter(|s| !s.trim().is_empty())
        .map(ToString::to_string)
}
