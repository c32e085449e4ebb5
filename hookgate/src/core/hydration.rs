//! Pure predicates behind the hydration workflow.
//!
//! The gates in `gates::hydration` own the state transitions; this module only
//! answers questions about text and tool calls.

use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::tools::{PATH_ARGS, invokes_capability, is_shell_tool, is_within};

/// Session flag: a prompt is waiting for the resolving capability.
pub const PENDING_FLAG: &str = "hydration_pending";
/// Session flag: the resolving capability is running.
pub const ACTIVE_FLAG: &str = "hydrator_active";
/// Session flag: the session was started as a subordinate of another agent.
pub const SUBAGENT_FLAG: &str = "subagent_session";
/// Session value: workflow id declared by the last hydration result.
pub const WORKFLOW_VALUE: &str = "current_workflow";

const NOTIFICATION_TAGS: [&str; 2] = ["<agent-notification>", "<task-notification>"];
const COMMAND_TAGS: [&str; 2] = ["<command-message>", "<command-name>"];

static COMPLETION_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:HYDRATION RESULT|Execution Plan|Execution Steps)\b").unwrap()
});
static WORKFLOW_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\*\*Workflows?\*\*:\s*\[\[workflows/([^\]]+)\]\]").unwrap()
});

/// Why a submitted prompt does not require hydration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Notification,
    ExpandedCommand,
    SlashCommand,
    DotPrefix,
    WorkerHeader,
    Subagent,
}

/// Check the skip predicates in order; the first match wins.
///
/// Empty text matches nothing, so an empty prompt still sets pending.
pub fn prompt_skip_reason(
    text: &str,
    worker_phrases: &[String],
    subagent: bool,
) -> Option<SkipReason> {
    let trimmed = text.trim();
    if NOTIFICATION_TAGS.iter().any(|tag| trimmed.starts_with(tag)) {
        return Some(SkipReason::Notification);
    }
    if COMMAND_TAGS.iter().any(|tag| trimmed.contains(tag)) {
        return Some(SkipReason::ExpandedCommand);
    }
    if trimmed.starts_with('/') || trimmed.starts_with("# /") {
        return Some(SkipReason::SlashCommand);
    }
    if trimmed.starts_with('.') {
        return Some(SkipReason::DotPrefix);
    }
    if is_worker_header(trimmed, worker_phrases) {
        return Some(SkipReason::WorkerHeader);
    }
    if subagent {
        return Some(SkipReason::Subagent);
    }
    None
}

fn is_worker_header(text: &str, worker_phrases: &[String]) -> bool {
    if worker_phrases
        .iter()
        .any(|phrase| !phrase.is_empty() && text.contains(phrase.as_str()))
    {
        return true;
    }
    if text.contains("## Your Task") && text.contains("**ID**:") {
        return true;
    }
    text.to_lowercase().contains("already been claimed")
}

/// Whether the tool call invokes the resolving capability.
pub fn is_resolving_tool(tool_name: &str, tool_input: &Map<String, Value>, keyword: &str) -> bool {
    invokes_capability(tool_name, tool_input, keyword)
}

/// Whether the tool call only touches the scratch directory.
pub fn is_scratch_access(tool_name: &str, tool_input: &Map<String, Value>, scratch_dir: &Path) -> bool {
    let path_hit = PATH_ARGS.iter().any(|key| {
        tool_input
            .get(*key)
            .and_then(Value::as_str)
            .is_some_and(|path| is_within(Path::new(path), scratch_dir))
    });
    if path_hit {
        return true;
    }
    if !is_shell_tool(tool_name) {
        return false;
    }
    let dir = scratch_dir.to_string_lossy();
    tool_input
        .get("command")
        .and_then(Value::as_str)
        .is_some_and(|command| !dir.is_empty() && command.contains(dir.as_ref()))
}

/// Whether an agent response carries a hydration result marker anywhere,
/// whatever heading, emphasis, quote or list markup surrounds it.
pub fn has_completion_marker(text: &str) -> bool {
    COMPLETION_RE.is_match(text)
}

/// Workflow id from a `**Workflow**: [[workflows/<id>]]` declaration.
pub fn declared_workflow(text: &str) -> Option<String> {
    WORKFLOW_RE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|id| !id.is_empty())
}
