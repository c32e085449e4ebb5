//! Periodic compliance gate.
//!
//! Every tool call in the main session bumps a counter; once it reaches
//! `custodiet.threshold`, write tools are held until the compliance
//! capability runs, which resets the counter.

use anyhow::Result;
use tracing::debug;

use crate::core::event::EventContext;
use crate::core::tools::{ToolCategory, invokes_capability, tool_category};
use crate::core::types::Verdict;
use crate::gates::GateDeps;

/// Tool calls since the compliance capability last ran, stored as a decimal string.
pub const COUNTER_VALUE: &str = "tool_calls_since_compliance";
/// RFC 3339 time of the last compliance run.
pub const LAST_CHECK_VALUE: &str = "last_compliance_at";
/// Set by a compliance review that found a problem; cleared by hand.
pub const BLOCKED_FLAG: &str = "custodiet_blocked";

fn calls_since_check(deps: &GateDeps<'_>, session_id: &str) -> u32 {
    deps.store
        .get_value(session_id, COUNTER_VALUE)
        .and_then(|raw| raw.parse().ok())
        .unwrap_or(0)
}

/// `PreToolUse`: hold write tools once the session is due a compliance check.
pub fn check(ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
    let (Some(session_id), Some(tool)) = (ctx.session_id.as_deref(), ctx.tool_name.as_deref())
    else {
        return Ok(None);
    };
    let cfg = &deps.config.custodiet;
    if tool_category(tool) != ToolCategory::Write
        || invokes_capability(tool, &ctx.tool_input, &cfg.capability)
        || deps.is_subagent(session_id)
    {
        return Ok(None);
    }

    let blocked = deps.store.get_flag(session_id, BLOCKED_FLAG);
    let count = calls_since_check(deps, session_id);
    if !blocked && count < cfg.threshold {
        return Ok(None);
    }

    debug!(session_id, tool, count, blocked, mode = ?cfg.mode, "compliance check due");
    let reason = deps
        .templates
        .custodiet_block(&cfg.capability, tool, count, cfg.threshold, blocked)?;
    Ok(Some(
        Verdict::new(cfg.mode.failing_outcome(), reason.clone())
            .with_context(reason)
            .with_metadata(COUNTER_VALUE, count)
            .with_metadata(BLOCKED_FLAG, blocked),
    ))
}

/// `PostToolUse`: count the call, or reset the count if it was the check itself.
///
/// Never returns a verdict, so later `PostToolUse` gates still run.
pub fn count(ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
    let (Some(session_id), Some(tool)) = (ctx.session_id.as_deref(), ctx.tool_name.as_deref())
    else {
        return Ok(None);
    };
    if deps.is_subagent(session_id) {
        return Ok(None);
    }
    if invokes_capability(tool, &ctx.tool_input, &deps.config.custodiet.capability) {
        debug!(session_id, tool, "compliance check ran, counter reset");
        deps.store.set_value(session_id, COUNTER_VALUE, "0");
        deps.store
            .set_value(session_id, LAST_CHECK_VALUE, &ctx.timestamp.to_rfc3339());
        return Ok(None);
    }
    let next = calls_since_check(deps, session_id).saturating_add(1);
    deps.store.set_value(session_id, COUNTER_VALUE, &next.to_string());
    Ok(None)
}
