//! Hydration workflow gates.
//!
//! A submitted prompt marks the session pending; tool calls are refused until
//! the resolving capability runs; its activation or its result clears the flag.
//!
//! ```text
//! PromptSubmit ──(no skip)──▶ PENDING ──PreToolUse(resolving)──▶ PENDING + active
//!                                │                                  │
//!                                ├──PostToolUse(resolving)──────────┤
//!                                └──AgentResponse(result marker)────┴──▶ NOT_PENDING
//! ```

use anyhow::Result;
use tracing::debug;

use crate::core::event::EventContext;
use crate::core::hydration::{
    ACTIVE_FLAG, PENDING_FLAG, SUBAGENT_FLAG, WORKFLOW_VALUE, declared_workflow,
    has_completion_marker, is_resolving_tool, is_scratch_access, prompt_skip_reason,
};
use crate::core::types::{GateMode, Verdict};
use crate::gates::GateDeps;

/// `SessionStart`: remember that the session belongs to a subordinate agent.
pub fn session_init(ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
    let Some(session_id) = ctx.session_id.as_deref() else {
        return Ok(None);
    };
    if deps.subagent_process {
        debug!(session_id, "marking subagent session");
        deps.store.set_flag(session_id, SUBAGENT_FLAG, true);
    }
    Ok(None)
}

/// `PromptSubmit`: mark hydration pending unless a skip predicate matches.
pub fn trigger(ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
    let Some(session_id) = ctx.session_id.as_deref() else {
        return Ok(None);
    };
    let cfg = &deps.config.hydration;
    let text = ctx.text.as_deref().unwrap_or_default();
    let subagent = deps.is_subagent(session_id);
    if let Some(reason) = prompt_skip_reason(text, &cfg.worker_intro_phrases, subagent) {
        debug!(session_id, ?reason, "hydration skipped");
        return Ok(None);
    }

    deps.store.set_flag(session_id, PENDING_FLAG, true);
    deps.store.clear_flag(session_id, ACTIVE_FLAG);
    debug!(session_id, "hydration pending");

    let instruction = deps.templates.hydration_instruction(
        &cfg.resolving_capability,
        &cfg.scratch_dir,
        ctx.transcript_path.as_deref(),
        cfg.mode == GateMode::Warn,
    )?;
    Ok(Some(
        Verdict::allow("hydration required before further work")
            .with_context(instruction)
            .with_metadata(PENDING_FLAG, true),
    ))
}

/// `PreToolUse`: refuse tool calls while hydration is pending.
pub fn enforce(ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
    let Some(session_id) = ctx.session_id.as_deref() else {
        return Ok(None);
    };
    if !deps.store.get_flag(session_id, PENDING_FLAG) {
        return Ok(None);
    }
    let cfg = &deps.config.hydration;
    let tool = ctx.tool_name.as_deref().unwrap_or_default();

    if is_resolving_tool(tool, &ctx.tool_input, &cfg.resolving_keyword) {
        debug!(session_id, tool, "resolving capability invoked");
        deps.store.set_flag(session_id, ACTIVE_FLAG, true);
        return Ok(Some(
            Verdict::allow("resolving capability invoked").with_metadata(ACTIVE_FLAG, true),
        ));
    }
    if deps.is_subagent(session_id) {
        return Ok(None);
    }
    if deps.store.get_flag(session_id, ACTIVE_FLAG) {
        debug!(session_id, tool, "resolving capability active, allowing");
        return Ok(None);
    }
    if is_scratch_access(tool, &ctx.tool_input, &cfg.scratch_dir) {
        debug!(session_id, tool, "scratch access allowed");
        return Ok(None);
    }

    let reason = deps
        .templates
        .hydration_block(&cfg.resolving_capability, display_tool(tool), &cfg.scratch_dir)?;
    debug!(session_id, tool, mode = ?cfg.mode, "tool call gated on hydration");
    Ok(Some(
        Verdict::new(cfg.mode.failing_outcome(), reason.clone())
            .with_context(reason)
            .with_metadata("blocked_tool", tool),
    ))
}

/// `PostToolUse`: the resolving capability ran, so hydration is satisfied.
pub fn activate(ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
    let Some(session_id) = ctx.session_id.as_deref() else {
        return Ok(None);
    };
    let tool = ctx.tool_name.as_deref().unwrap_or_default();
    if !is_resolving_tool(tool, &ctx.tool_input, &deps.config.hydration.resolving_keyword) {
        return Ok(None);
    }
    deps.store.clear_flag(session_id, PENDING_FLAG);
    deps.store.clear_flag(session_id, ACTIVE_FLAG);
    debug!(session_id, tool, "hydration cleared by activation");
    Ok(Some(Verdict::allow("hydration satisfied")))
}

/// `AgentResponse`: a hydration result in the response clears pending and
/// points the agent at the review step.
pub fn complete(ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
    let Some(session_id) = ctx.session_id.as_deref() else {
        return Ok(None);
    };
    let Some(text) = ctx.text.as_deref() else {
        return Ok(None);
    };
    if !has_completion_marker(text) {
        return Ok(None);
    }
    let cfg = &deps.config.hydration;

    deps.store.clear_flag(session_id, PENDING_FLAG);
    deps.store.clear_flag(session_id, ACTIVE_FLAG);

    let workflow = declared_workflow(text);
    if let Some(id) = workflow.as_deref() {
        deps.store.set_value(session_id, WORKFLOW_VALUE, id);
    }
    let streamlined = workflow
        .as_deref()
        .is_some_and(|id| cfg.streamlined_workflows.iter().any(|w| w == id));
    debug!(session_id, ?workflow, streamlined, "hydration result detected");

    let injection =
        deps.templates
            .review_instruction(&cfg.review_capability, workflow.as_deref(), streamlined)?;
    let mut verdict = Verdict::allow("hydration plan detected").with_context(injection);
    if let Some(id) = workflow {
        verdict = verdict.with_metadata(WORKFLOW_VALUE, id);
    }
    Ok(Some(verdict))
}

fn display_tool(tool: &str) -> &str {
    if tool.is_empty() { "this tool" } else { tool }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Outcome;
    use crate::io::session_store::StateStore;
    use crate::test_support::GateHarness;
    use serde_json::json;

    fn prompt(session: &str, text: &str) -> serde_json::Value {
        json!({"hook_event_name": "UserPromptSubmit", "session_id": session, "prompt": text})
    }

    #[test]
    fn trigger_sets_pending_and_injects_instruction() {
        let harness = GateHarness::new();
        let ctx = harness.event(prompt("s1", "What is the hydrator?"));
        let verdict = trigger(&ctx, &harness.deps()).expect("trigger").expect("verdict");
        assert_eq!(verdict.outcome, Outcome::Allow);
        let injection = verdict.context_injection.expect("injection");
        assert!(injection.contains("prompt-hydrator"));
        assert!(injection.contains("/tmp/claude-hydrator"));
        assert!(harness.store.get_flag("s1", PENDING_FLAG));
    }

    #[test]
    fn skipped_prompt_leaves_state_untouched() {
        let harness = GateHarness::new();
        for text in ["/commit", ".", "<agent-notification>x", "You are a polecat worker"] {
            let ctx = harness.event(prompt("s1", text));
            assert_eq!(trigger(&ctx, &harness.deps()).expect("trigger"), None);
        }
        assert!(!harness.store.has_record("s1"));
    }

    #[test]
    fn empty_prompt_sets_pending() {
        let harness = GateHarness::new();
        let ctx = harness.event(json!({"hook_event_name": "UserPromptSubmit", "session_id": "s1"}));
        assert!(trigger(&ctx, &harness.deps()).expect("trigger").is_some());
        assert!(harness.store.get_flag("s1", PENDING_FLAG));
    }

    #[test]
    fn subagent_session_skips_trigger_and_enforcer() {
        let mut harness = GateHarness::new();
        harness.subagent_process = true;
        let start = harness.event(json!({"hook_event_name": "SessionStart", "session_id": "s1"}));
        assert_eq!(session_init(&start, &harness.deps()).expect("init"), None);
        assert!(harness.store.get_flag("s1", SUBAGENT_FLAG));

        harness.subagent_process = false;
        let ctx = harness.event(prompt("s1", "do work"));
        assert_eq!(trigger(&ctx, &harness.deps()).expect("trigger"), None);
        assert!(!harness.store.get_flag("s1", PENDING_FLAG));

        harness.store.set_flag("s1", PENDING_FLAG, true);
        let tool = harness.event(json!({
            "hook_event_name": "PreToolUse", "session_id": "s1",
            "tool_name": "Read", "tool_input": {"file_path": "/etc/hosts"}
        }));
        assert_eq!(enforce(&tool, &harness.deps()).expect("enforce"), None);
    }

    #[test]
    fn enforcer_denies_until_resolving_tool_runs() {
        let harness = GateHarness::new();
        harness.store.set_flag("s1", PENDING_FLAG, true);

        let read = harness.event(json!({
            "hook_event_name": "PreToolUse", "session_id": "s1",
            "tool_name": "read_file", "tool_input": {"file_path": "/etc/hosts"}
        }));
        let verdict = enforce(&read, &harness.deps()).expect("enforce").expect("verdict");
        assert_eq!(verdict.outcome, Outcome::Deny);
        assert!(verdict.reason.contains("prompt-hydrator"));
        assert!(verdict.reason.contains("read_file"));

        let hydrate = harness.event(json!({
            "hook_event_name": "PreToolUse", "session_id": "s1",
            "tool_name": "activate_skill", "tool_input": {"name": "prompt-hydrator"}
        }));
        let verdict = enforce(&hydrate, &harness.deps()).expect("enforce").expect("verdict");
        assert_eq!(verdict.outcome, Outcome::Allow);
        assert!(harness.store.get_flag("s1", ACTIVE_FLAG));

        assert_eq!(enforce(&read, &harness.deps()).expect("enforce"), None);
    }

    #[test]
    fn enforcer_allows_scratch_access() {
        let harness = GateHarness::new();
        harness.store.set_flag("s1", PENDING_FLAG, true);
        let ctx = harness.event(json!({
            "hook_event_name": "PreToolUse", "session_id": "s1",
            "tool_name": "read_file", "tool_input": {"file_path": "/tmp/claude-hydrator/ctx.md"}
        }));
        assert_eq!(enforce(&ctx, &harness.deps()).expect("enforce"), None);

        let escape = harness.event(json!({
            "hook_event_name": "PreToolUse", "session_id": "s1",
            "tool_name": "read_file", "tool_input": {"file_path": "/tmp/claude-hydrator/../../etc/passwd"}
        }));
        assert!(enforce(&escape, &harness.deps()).expect("enforce").is_some());
    }

    #[test]
    fn warn_mode_downgrades_denial() {
        let mut harness = GateHarness::new();
        harness.config.hydration.mode = GateMode::Warn;
        harness.store.set_flag("s1", PENDING_FLAG, true);
        let ctx = harness.event(json!({
            "hook_event_name": "PreToolUse", "session_id": "s1", "tool_name": "Bash",
            "tool_input": {"command": "ls"}
        }));
        let verdict = enforce(&ctx, &harness.deps()).expect("enforce").expect("verdict");
        assert_eq!(verdict.outcome, Outcome::Warn);
    }

    #[test]
    fn activation_clears_pending_and_active() {
        let harness = GateHarness::new();
        harness.store.set_flag("s1", PENDING_FLAG, true);
        harness.store.set_flag("s1", ACTIVE_FLAG, true);

        let other = harness.event(json!({
            "hook_event_name": "PostToolUse", "session_id": "s1", "tool_name": "Read"
        }));
        assert_eq!(activate(&other, &harness.deps()).expect("activate"), None);
        assert!(harness.store.get_flag("s1", PENDING_FLAG));

        let ctx = harness.event(json!({
            "hook_event_name": "PostToolUse", "session_id": "s1",
            "tool_name": "Task", "tool_input": {"subagent_type": "prompt-hydrator"}
        }));
        assert!(activate(&ctx, &harness.deps()).expect("activate").is_some());
        assert!(!harness.store.get_flag("s1", PENDING_FLAG));
        assert!(!harness.store.get_flag("s1", ACTIVE_FLAG));
        assert!(activate(&ctx, &harness.deps()).expect("idempotent").is_some());
    }

    #[test]
    fn completion_clears_pending_and_records_workflow() {
        let harness = GateHarness::new();
        harness.store.set_flag("s1", PENDING_FLAG, true);
        let ctx = harness.event(json!({
            "hook_event_name": "AfterAgent", "session_id": "s1",
            "prompt_response": "## HYDRATION RESULT\n**Workflow**: [[workflows/simple-question]]"
        }));
        let verdict = complete(&ctx, &harness.deps()).expect("complete").expect("verdict");
        assert!(!harness.store.get_flag("s1", PENDING_FLAG));
        assert_eq!(
            harness.store.get_value("s1", WORKFLOW_VALUE).as_deref(),
            Some("simple-question")
        );
        assert!(verdict.context_injection.expect("injection").contains("may be skipped"));
    }

    #[test]
    fn response_without_marker_is_ignored() {
        let harness = GateHarness::new();
        harness.store.set_flag("s1", PENDING_FLAG, true);
        let ctx = harness.event(json!({
            "hook_event_name": "AfterAgent", "session_id": "s1",
            "prompt_response": "Here is the answer."
        }));
        assert_eq!(complete(&ctx, &harness.deps()).expect("complete"), None);
        assert!(harness.store.get_flag("s1", PENDING_FLAG));
    }

    #[test]
    fn missing_session_is_a_no_op_everywhere() {
        let harness = GateHarness::new();
        let deps = harness.deps();
        let ctx = harness.event(json!({"hook_event_name": "UserPromptSubmit", "prompt": "hi"}));
        assert_eq!(trigger(&ctx, &deps).expect("trigger"), None);
        assert_eq!(enforce(&ctx, &deps).expect("enforce"), None);
        assert_eq!(activate(&ctx, &deps).expect("activate"), None);
        assert_eq!(complete(&ctx, &deps).expect("complete"), None);
        assert_eq!(session_init(&ctx, &deps).expect("init"), None);
        assert_eq!(harness.store.session_count(), 0);
    }
}
