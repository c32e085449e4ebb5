//! Shared deterministic types for gate evaluation.
//!
//! These types define stable contracts between the normalizer, the gates and
//! the output renderer. They must not depend on external state or I/O.

use std::fmt;
use std::str::FromStr;

use anyhow::{Result, anyhow};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Lifecycle event delivered by the host (closed set).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HookEvent {
    PromptSubmit,
    PreToolUse,
    PostToolUse,
    AgentResponse,
    SessionStart,
    Stop,
    SubagentStop,
}

impl HookEvent {
    pub const ALL: [HookEvent; 7] = [
        HookEvent::PromptSubmit,
        HookEvent::PreToolUse,
        HookEvent::PostToolUse,
        HookEvent::AgentResponse,
        HookEvent::SessionStart,
        HookEvent::Stop,
        HookEvent::SubagentStop,
    ];

    /// Resolve a host event name, accepting both Claude and Gemini spellings.
    pub fn from_host_name(name: &str) -> Option<Self> {
        match name.trim() {
            "PromptSubmit" | "UserPromptSubmit" | "BeforeAgent" => Some(Self::PromptSubmit),
            "PreToolUse" | "BeforeTool" => Some(Self::PreToolUse),
            "PostToolUse" | "AfterTool" => Some(Self::PostToolUse),
            "AgentResponse" | "AfterAgent" => Some(Self::AgentResponse),
            "SessionStart" => Some(Self::SessionStart),
            "Stop" | "SessionEnd" => Some(Self::Stop),
            "SubagentStop" => Some(Self::SubagentStop),
            _ => None,
        }
    }

    /// Event name used in `hookEventName` for Claude-style hosts.
    ///
    /// Claude has no hook that carries the agent's response text, so
    /// `AgentResponse` has no Claude name.
    pub fn claude_name(self) -> Option<&'static str> {
        match self {
            Self::PromptSubmit => Some("UserPromptSubmit"),
            Self::PreToolUse => Some("PreToolUse"),
            Self::PostToolUse => Some("PostToolUse"),
            Self::AgentResponse => None,
            Self::SessionStart => Some("SessionStart"),
            Self::Stop => Some("Stop"),
            Self::SubagentStop => Some("SubagentStop"),
        }
    }

    /// Event name used in `hookEventName` for Gemini-style hosts.
    pub fn gemini_name(self) -> &'static str {
        match self {
            Self::PromptSubmit => "BeforeAgent",
            Self::PreToolUse => "BeforeTool",
            Self::PostToolUse => "AfterTool",
            Self::AgentResponse => "AfterAgent",
            Self::SessionStart => "SessionStart",
            Self::Stop => "SessionEnd",
            Self::SubagentStop => "SubagentStop",
        }
    }

    /// Whether the host accepts a `hookSpecificOutput` envelope for this event.
    pub fn supports_hook_specific_output(self) -> bool {
        matches!(
            self,
            Self::PromptSubmit
                | Self::PreToolUse
                | Self::PostToolUse
                | Self::AgentResponse
                | Self::SessionStart
        )
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::PromptSubmit => "PromptSubmit",
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::AgentResponse => "AgentResponse",
            Self::SessionStart => "SessionStart",
            Self::Stop => "Stop",
            Self::SubagentStop => "SubagentStop",
        };
        f.write_str(name)
    }
}

/// Outcome of a gate verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Allow,
    Deny,
    Warn,
}

/// Enforcement mode for gates that can either block or only warn.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GateMode {
    #[default]
    Block,
    Warn,
}

impl GateMode {
    /// Outcome used when the gate decides the action must not proceed.
    pub fn failing_outcome(self) -> Outcome {
        match self {
            Self::Block => Outcome::Deny,
            Self::Warn => Outcome::Warn,
        }
    }
}

impl FromStr for GateMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "block" => Ok(Self::Block),
            "warn" => Ok(Self::Warn),
            other => Err(anyhow!("unknown gate mode '{other}' (expected block|warn)")),
        }
    }
}

/// Decision returned by a gate. At most one verdict reaches the host per event.
#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub outcome: Outcome,
    /// Human-readable reason shown to the agent.
    pub reason: String,
    /// Additional instructional text appended to agent-visible output.
    pub context_injection: Option<String>,
    pub metadata: Map<String, Value>,
}

impl Verdict {
    pub fn new(outcome: Outcome, reason: impl Into<String>) -> Self {
        Self {
            outcome,
            reason: reason.into(),
            context_injection: None,
            metadata: Map::new(),
        }
    }

    pub fn allow(reason: impl Into<String>) -> Self {
        Self::new(Outcome::Allow, reason)
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self::new(Outcome::Deny, reason)
    }

    pub fn warn(reason: impl Into<String>) -> Self {
        Self::new(Outcome::Warn, reason)
    }

    pub fn with_context(mut self, injection: impl Into<String>) -> Self {
        self.context_injection = Some(injection.into());
        self
    }

    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.to_string(), value.into());
        self
    }
}

/// Catalogued anti-pattern recognized by the detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum PatternId {
    SilentExcept,
    EnvDefault,
    LookupDefault,
    OrFallback,
}

impl PatternId {
    /// Stable identifier used in messages and tests.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SilentExcept => "silent_except",
            Self::EnvDefault => "env_get_default",
            Self::LookupDefault => "dict_get_default",
            Self::OrFallback => "or_fallback",
        }
    }
}

impl fmt::Display for PatternId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single anti-pattern occurrence found by the detector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    pub pattern: PatternId,
    /// Governing rule the pattern violates.
    pub rule: &'static str,
    pub message: String,
    /// 1-based line number of the occurrence.
    pub line: usize,
    /// Offending fragment as written.
    pub snippet: String,
}
