//! Gates: policy checks evaluated against one normalized event.
//!
//! Each gate inspects an [`EventContext`], may read or mutate session state,
//! and either returns a [`Verdict`] (terminal for the dispatch) or nothing.

pub mod custodiet;
pub mod fallback;
pub mod hydration;
pub mod registry;

use anyhow::Result;

use crate::core::event::EventContext;
use crate::core::hydration::SUBAGENT_FLAG;
use crate::core::types::{HookEvent, Verdict};
use crate::io::config::HookgateConfig;
use crate::io::session_store::StateStore;
use crate::io::templates::MessageTemplates;

pub use registry::{GateDefinition, GateRegistry};

/// Collaborators a gate may consult while evaluating.
pub struct GateDeps<'a> {
    pub store: &'a dyn StateStore,
    pub config: &'a HookgateConfig,
    pub templates: &'a MessageTemplates,
    /// The current process runs inside a subordinate (non-interactive) session.
    pub subagent_process: bool,
}

impl GateDeps<'_> {
    /// This process, or the session as recorded at `SessionStart`, is a subagent.
    pub fn is_subagent(&self, session_id: &str) -> bool {
        self.subagent_process || self.store.get_flag(session_id, SUBAGENT_FLAG)
    }
}

/// Closed set of gates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gate {
    SessionInit,
    HydrationTrigger,
    HydrationEnforcer,
    HydrationActivation,
    HydrationCompletion,
    FallbackDetector,
    CustodietCheck,
    CustodietCounter,
}

impl Gate {
    /// Standard gates in registration order.
    pub const STANDARD: [Gate; 8] = [
        Gate::SessionInit,
        Gate::HydrationTrigger,
        Gate::HydrationEnforcer,
        Gate::FallbackDetector,
        Gate::CustodietCheck,
        Gate::CustodietCounter,
        Gate::HydrationActivation,
        Gate::HydrationCompletion,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::SessionInit => "session_init",
            Self::HydrationTrigger => "hydration_trigger",
            Self::HydrationEnforcer => "hydration_enforcer",
            Self::HydrationActivation => "hydration_activation",
            Self::HydrationCompletion => "hydration_completion",
            Self::FallbackDetector => "fallback_detector",
            Self::CustodietCheck => "custodiet_check",
            Self::CustodietCounter => "custodiet_counter",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::STANDARD.into_iter().find(|gate| gate.name() == name)
    }

    /// Events this gate listens to in the standard registry.
    pub fn default_events(self) -> Vec<HookEvent> {
        match self {
            Self::SessionInit => vec![HookEvent::SessionStart],
            Self::HydrationTrigger => vec![HookEvent::PromptSubmit],
            Self::HydrationEnforcer | Self::FallbackDetector | Self::CustodietCheck => {
                vec![HookEvent::PreToolUse]
            }
            Self::CustodietCounter | Self::HydrationActivation => vec![HookEvent::PostToolUse],
            Self::HydrationCompletion => vec![HookEvent::AgentResponse],
        }
    }

    pub fn evaluate(&self, ctx: &EventContext, deps: &GateDeps<'_>) -> Result<Option<Verdict>> {
        match self {
            Self::SessionInit => hydration::session_init(ctx, deps),
            Self::HydrationTrigger => hydration::trigger(ctx, deps),
            Self::HydrationEnforcer => hydration::enforce(ctx, deps),
            Self::HydrationActivation => hydration::activate(ctx, deps),
            Self::HydrationCompletion => hydration::complete(ctx, deps),
            Self::FallbackDetector => fallback::detect_fallbacks(ctx, deps),
            Self::CustodietCheck => custodiet::check(ctx, deps),
            Self::CustodietCounter => custodiet::count(ctx, deps),
        }
    }
}
