//! Fallback detector gate: refuse edits that introduce silent fallbacks.

use anyhow::Result;
use tracing::debug;

use crate::core::detector::{FAIL_FAST_RULE, detect};
use crate::core::event::EventContext;
use crate::core::tools::{edited_text, target_path};
use crate::core::types::Verdict;
use crate::gates::GateDeps;

/// `PreToolUse`: scan the proposed text of editing tools.
pub fn detect_fallbacks(ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
    let Some(tool) = ctx.tool_name.as_deref() else {
        return Ok(None);
    };
    let Some(text) = edited_text(tool, &ctx.tool_input) else {
        return Ok(None);
    };
    let cfg = &deps.config.detector;
    let path = target_path(&ctx.tool_input);
    if let Some(path) = path
        && cfg.exempt_paths.iter().any(|fragment| path.contains(fragment.as_str()))
    {
        debug!(path, "edit target exempt from fallback detection");
        return Ok(None);
    }

    let violations = detect(&text);
    if violations.is_empty() {
        return Ok(None);
    }
    debug!(tool, count = violations.len(), "fallback patterns found");

    let reason = deps
        .templates
        .fallback_violations(FAIL_FAST_RULE, path, &violations)?;
    let patterns: Vec<&str> = violations.iter().map(|v| v.pattern.as_str()).collect();
    Ok(Some(
        Verdict::new(cfg.mode.failing_outcome(), reason.clone())
            .with_context(reason)
            .with_metadata("rule", FAIL_FAST_RULE)
            .with_metadata("patterns", patterns),
    ))
}
