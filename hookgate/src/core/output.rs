//! Rendering of a dispatch result into the host's JSON response shape.

use clap::ValueEnum;
use serde_json::{Map, Value, json};

use crate::core::types::{HookEvent, Outcome, Verdict};

/// Response dialect expected by the calling host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Host {
    #[default]
    Claude,
    Gemini,
}

impl Host {
    /// `hookEventName` for `event`, or `None` when the host has no such hook.
    fn event_name(self, event: HookEvent) -> Option<&'static str> {
        match self {
            Self::Claude => event.claude_name(),
            Self::Gemini => Some(event.gemini_name()),
        }
    }
}

/// Render the verdict (or its absence) for `event`.
///
/// Absence of a verdict and an ALLOW without injection both render as `{}`.
pub fn render(verdict: Option<&Verdict>, event: Option<HookEvent>, host: Host) -> Value {
    let Some(verdict) = verdict else {
        return json!({});
    };
    match verdict.outcome {
        Outcome::Deny => render_deny(verdict, event, host),
        Outcome::Allow | Outcome::Warn => render_advisory(verdict, event, host),
    }
}

fn render_deny(verdict: &Verdict, event: Option<HookEvent>, host: Host) -> Value {
    if event != Some(HookEvent::PreToolUse) {
        return json!({"decision": "block", "reason": verdict.reason});
    }
    let context = verdict
        .context_injection
        .clone()
        .unwrap_or_else(|| verdict.reason.clone());
    match host {
        Host::Claude => json!({
            "hookSpecificOutput": {
                "hookEventName": "PreToolUse",
                "permissionDecision": "deny",
                "permissionDecisionReason": verdict.reason,
                "additionalContext": context,
            }
        }),
        Host::Gemini => json!({
            "decision": "deny",
            "reason": verdict.reason,
            "hookSpecificOutput": {
                "hookEventName": HookEvent::PreToolUse.gemini_name(),
                "additionalContext": context,
            }
        }),
    }
}

fn render_advisory(verdict: &Verdict, event: Option<HookEvent>, host: Host) -> Value {
    let Some(message) = advisory_message(verdict) else {
        return json!({});
    };
    let Some((event, event_name)) = event
        .filter(|event| event.supports_hook_specific_output())
        .and_then(|event| host.event_name(event).map(|name| (event, name)))
    else {
        return json!({"systemMessage": message});
    };

    let mut specific = Map::new();
    specific.insert("hookEventName".into(), event_name.into());
    specific.insert("additionalContext".into(), message.into());

    let mut out = Map::new();
    if verdict.outcome == Outcome::Warn && event == HookEvent::PreToolUse {
        match host {
            Host::Claude => {
                specific.insert("permissionDecision".into(), "allow".into());
            }
            Host::Gemini => {
                out.insert("decision".into(), "allow".into());
            }
        }
    }
    out.insert("hookSpecificOutput".into(), Value::Object(specific));
    Value::Object(out)
}

/// Agent-visible text for ALLOW and WARN verdicts.
///
/// ALLOW speaks only through its injection; WARN always carries its reason.
fn advisory_message(verdict: &Verdict) -> Option<String> {
    let injection = verdict
        .context_injection
        .as_deref()
        .filter(|s| !s.trim().is_empty());
    match (verdict.outcome, injection) {
        (Outcome::Warn, Some(injection)) if injection != verdict.reason => {
            Some(format!("{}\n\n{}", verdict.reason, injection))
        }
        (Outcome::Warn, _) => Some(verdict.reason.clone()),
        (_, injection) => injection.map(ToString::to_string),
    }
}
