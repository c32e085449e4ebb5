//! Orchestration for a single `hookgate hook` invocation.

use chrono::Utc;
use serde_json::{Value, json};
use tracing::{debug, warn};

use crate::core::event::{EventContext, NormalizeOptions};
use crate::core::output::{Host, render};
use crate::core::types::{Outcome, Verdict};
use crate::exit_codes;
use crate::gates::{GateDeps, GateRegistry};
use crate::io::config::HookgateConfig;
use crate::io::session_store::{SessionStore, StateStore};
use crate::io::templates::MessageTemplates;

/// Host environment variables that may carry the session id.
pub const SESSION_ENV_VARS: [&str; 2] = ["CLAUDE_SESSION_ID", "GEMINI_SESSION_ID"];

/// Caller-supplied parameters for one invocation.
#[derive(Debug, Clone, Default)]
pub struct HookRequest {
    /// Event name from the command line; overrides the payload's own.
    pub event: Option<String>,
    pub host: Host,
}

/// Result of a single hook invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct HookOutcome {
    /// JSON decision for stdout.
    pub output: Value,
    /// Verdict that produced `output`, if any gate returned one.
    pub verdict: Option<Verdict>,
    pub exit_code: i32,
}

impl HookOutcome {
    fn empty() -> Self {
        Self {
            output: json!({}),
            verdict: None,
            exit_code: exit_codes::OK,
        }
    }
}

/// Evaluate one raw event against the standard gates with file-backed state.
pub fn run_hook(input: &str, request: &HookRequest, config: &HookgateConfig) -> HookOutcome {
    let store = SessionStore::new(&config.state_dir);
    run_hook_with(input, request, config, &store, |key| std::env::var(key).ok())
}

/// Evaluate one raw event with an explicit store and environment.
///
/// Never fails: malformed input renders `{}` and exits OK.
pub fn run_hook_with<S, F>(
    input: &str,
    request: &HookRequest,
    config: &HookgateConfig,
    store: &S,
    env: F,
) -> HookOutcome
where
    S: StateStore,
    F: Fn(&str) -> Option<String>,
{
    let raw: Value = match serde_json::from_str(input) {
        Ok(raw) => raw,
        Err(err) => {
            warn!(error = %err, "hook input is not valid JSON; allowing");
            return HookOutcome::empty();
        }
    };

    let options = NormalizeOptions {
        event_override: request.event.clone(),
        session_fallback: SESSION_ENV_VARS
            .iter()
            .find_map(|&key| env(key).filter(|value| !value.trim().is_empty())),
        now: Utc::now(),
    };
    let ctx = EventContext::normalize(&raw, &options);
    debug!(
        event = ?ctx.event,
        session_id = ?ctx.session_id,
        tool = ?ctx.tool_name,
        "hook event normalized"
    );

    let subagent_process = env(config.hydration.subagent_env_var.as_str())
        .is_some_and(|value| !value.trim().is_empty());
    let templates = MessageTemplates::new();
    let deps = GateDeps {
        store,
        config,
        templates: &templates,
        subagent_process,
    };
    let verdict = GateRegistry::standard(config).dispatch(&ctx, &deps);

    let output = render(verdict.as_ref(), ctx.event, request.host);
    let exit_code = match &verdict {
        Some(v) if v.outcome == Outcome::Warn && config.exit_nonzero_on_warn => exit_codes::WARN,
        _ => exit_codes::OK,
    };
    HookOutcome {
        output,
        verdict,
        exit_code,
    }
}
