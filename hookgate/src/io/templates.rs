//! Agent-visible gate messages rendered from embedded templates.

use std::path::Path;

use anyhow::Result;
use minijinja::{Environment, context};
use serde::Serialize;

use crate::core::types::Violation;

const HYDRATION_INSTRUCTION_TEMPLATE: &str = include_str!("templates/hydration_instruction.md");
const HYDRATION_BLOCK_TEMPLATE: &str = include_str!("templates/hydration_block.md");
const REVIEW_INSTRUCTION_TEMPLATE: &str = include_str!("templates/review_instruction.md");
const FALLBACK_VIOLATIONS_TEMPLATE: &str = include_str!("templates/fallback_violations.md");
const CUSTODIET_BLOCK_TEMPLATE: &str = include_str!("templates/custodiet_block.md");

#[derive(Debug, Clone, Serialize)]
struct ViolationContext<'a> {
    line: usize,
    message: &'a str,
}

/// Template engine wrapper around minijinja.
pub struct MessageTemplates {
    env: Environment<'static>,
}

impl Default for MessageTemplates {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageTemplates {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("hydration_instruction", HYDRATION_INSTRUCTION_TEMPLATE)
            .expect("hydration instruction template should be valid");
        env.add_template("hydration_block", HYDRATION_BLOCK_TEMPLATE)
            .expect("hydration block template should be valid");
        env.add_template("review_instruction", REVIEW_INSTRUCTION_TEMPLATE)
            .expect("review instruction template should be valid");
        env.add_template("fallback_violations", FALLBACK_VIOLATIONS_TEMPLATE)
            .expect("fallback violations template should be valid");
        env.add_template("custodiet_block", CUSTODIET_BLOCK_TEMPLATE)
            .expect("custodiet block template should be valid");
        Self { env }
    }

    /// Instruction injected when a prompt marks the session pending.
    pub fn hydration_instruction(
        &self,
        capability: &str,
        scratch_dir: &Path,
        transcript: Option<&str>,
        warn_only: bool,
    ) -> Result<String> {
        let template = self.env.get_template("hydration_instruction")?;
        Ok(template.render(context! {
            capability => capability,
            scratch_dir => scratch_dir.display().to_string(),
            transcript => transcript,
            warn_only => warn_only,
        })?)
    }

    /// Reason attached to a tool call refused while hydration is pending.
    pub fn hydration_block(&self, capability: &str, tool: &str, scratch_dir: &Path) -> Result<String> {
        let template = self.env.get_template("hydration_block")?;
        Ok(template.render(context! {
            capability => capability,
            tool => tool,
            scratch_dir => scratch_dir.display().to_string(),
        })?)
    }

    /// Next-step instruction once a hydration result is seen.
    pub fn review_instruction(
        &self,
        review: &str,
        workflow: Option<&str>,
        streamlined: bool,
    ) -> Result<String> {
        let template = self.env.get_template("review_instruction")?;
        Ok(template.render(context! {
            review => review,
            workflow => workflow,
            streamlined => streamlined,
        })?)
    }

    /// Reason attached to a write tool held back for a compliance check.
    ///
    /// `blocked` selects the explicit-block wording over the counter wording.
    pub fn custodiet_block(
        &self,
        capability: &str,
        tool: &str,
        count: u32,
        threshold: u32,
        blocked: bool,
    ) -> Result<String> {
        let template = self.env.get_template("custodiet_block")?;
        Ok(template.render(context! {
            capability => capability,
            tool => tool,
            count => count,
            threshold => threshold,
            blocked => blocked,
        })?)
    }

    /// Summary of every detector finding for one edit.
    pub fn fallback_violations(
        &self,
        rule: &str,
        path: Option<&str>,
        violations: &[Violation],
    ) -> Result<String> {
        let items: Vec<ViolationContext<'_>> = violations
            .iter()
            .map(|v| ViolationContext {
                line: v.line,
                message: &v.message,
            })
            .collect();
        let template = self.env.get_template("fallback_violations")?;
        Ok(template.render(context! {
            rule => rule,
            path => path,
            violations => items,
        })?)
    }
}
