//! Explicitly constructed gate registry and short-circuiting dispatcher.

use std::panic::{AssertUnwindSafe, catch_unwind};

use anyhow::Result;
use tracing::{debug, error, warn};

use crate::core::event::EventContext;
use crate::core::types::{HookEvent, Verdict};
use crate::gates::{Gate, GateDeps};
use crate::io::config::HookgateConfig;

/// A gate bound to the events it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDefinition {
    pub name: String,
    pub applicable_events: Vec<HookEvent>,
    pub gate: Gate,
    /// Position in the registry; assigned by [`GateRegistry::register`].
    pub order: usize,
}

impl GateDefinition {
    pub fn new(gate: Gate, applicable_events: Vec<HookEvent>) -> Self {
        Self {
            name: gate.name().to_string(),
            applicable_events,
            gate,
            order: 0,
        }
    }

    /// Definition with the gate's standard events.
    pub fn standard(gate: Gate) -> Self {
        Self::new(gate, gate.default_events())
    }

    pub fn applies_to(&self, event: HookEvent) -> bool {
        self.applicable_events.contains(&event)
    }
}

/// Ordered gate pipeline. Registration order is evaluation order.
#[derive(Debug, Clone, Default)]
pub struct GateRegistry {
    gates: Vec<GateDefinition>,
}

impl GateRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Production gate set, minus `config.gates.disabled`.
    pub fn standard(config: &HookgateConfig) -> Self {
        for name in &config.gates.disabled {
            if Gate::from_name(name).is_none() {
                warn!(gate = %name, "ignoring unknown gate in gates.disabled");
            }
        }
        let mut registry = Self::new();
        for gate in Gate::STANDARD {
            if config.gates.disabled.iter().any(|name| name == gate.name()) {
                debug!(gate = gate.name(), "gate disabled by config");
                continue;
            }
            registry.register(GateDefinition::standard(gate));
        }
        registry
    }

    pub fn register(&mut self, mut definition: GateDefinition) {
        definition.order = self.gates.len();
        self.gates.push(definition);
    }

    pub fn definitions(&self) -> &[GateDefinition] {
        &self.gates
    }

    /// Gates that apply to `event`, in evaluation order.
    pub fn pipeline(&self, event: HookEvent) -> impl Iterator<Item = &GateDefinition> {
        self.gates.iter().filter(move |def| def.applies_to(event))
    }

    /// Evaluate applicable gates in order; the first verdict wins.
    ///
    /// A gate that errors or panics is logged and treated as returning nothing.
    pub fn dispatch(&self, ctx: &EventContext, deps: &GateDeps<'_>) -> Option<Verdict> {
        let Some(event) = ctx.event else {
            debug!(raw_event = ?ctx.raw_event_name, "unknown event, no gates apply");
            return None;
        };
        for def in self.pipeline(event) {
            if let Some(verdict) = guarded(&def.name, || def.gate.evaluate(ctx, deps)) {
                debug!(gate = %def.name, outcome = ?verdict.outcome, "gate returned verdict");
                return Some(verdict);
            }
        }
        None
    }
}

/// Run one gate evaluation behind the failure boundary.
pub(crate) fn guarded<F>(name: &str, evaluate: F) -> Option<Verdict>
where
    F: FnOnce() -> Result<Option<Verdict>>,
{
    match catch_unwind(AssertUnwindSafe(evaluate)) {
        Ok(Ok(verdict)) => verdict,
        Ok(Err(err)) => {
            error!(gate = name, error = %format!("{err:#}"), "gate failed; ignoring");
            None
        }
        Err(_) => {
            error!(gate = name, "gate panicked; ignoring");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::event::NormalizeOptions;
    use crate::io::session_store::StateStore;
    use crate::io::templates::MessageTemplates;
    use crate::test_support::MemoryStore;
    use anyhow::anyhow;
    use serde_json::json;

    fn names(registry: &GateRegistry, event: HookEvent) -> Vec<&str> {
        registry.pipeline(event).map(|def| def.name.as_str()).collect()
    }

    #[test]
    fn standard_order_is_stable() {
        let registry = GateRegistry::standard(&HookgateConfig::default());
        assert_eq!(names(&registry, HookEvent::SessionStart), vec!["session_init"]);
        assert_eq!(names(&registry, HookEvent::PromptSubmit), vec!["hydration_trigger"]);
        assert_eq!(
            names(&registry, HookEvent::PreToolUse),
            vec!["hydration_enforcer", "fallback_detector", "custodiet_check"]
        );
        assert_eq!(
            names(&registry, HookEvent::PostToolUse),
            vec!["custodiet_counter", "hydration_activation"]
        );
        assert_eq!(names(&registry, HookEvent::AgentResponse), vec!["hydration_completion"]);
        assert!(names(&registry, HookEvent::Stop).is_empty());
        assert!(names(&registry, HookEvent::SubagentStop).is_empty());

        let orders: Vec<usize> = registry.definitions().iter().map(|def| def.order).collect();
        assert_eq!(orders, (0..orders.len()).collect::<Vec<_>>());
    }

    #[test]
    fn disabled_gates_are_not_registered() {
        let mut config = HookgateConfig::default();
        config.gates.disabled = vec!["hydration_enforcer".to_string(), "nope".to_string()];
        let registry = GateRegistry::standard(&config);
        assert_eq!(names(&registry, HookEvent::PreToolUse), vec!["fallback_detector", "custodiet_check"]);
    }

    #[test]
    fn first_verdict_short_circuits() {
        let store = MemoryStore::default();
        let config = HookgateConfig::default();
        let templates = MessageTemplates::new();
        let deps = GateDeps {
            store: &store,
            config: &config,
            templates: &templates,
            subagent_process: false,
        };
        store.set_flag("s1", "hydration_pending", true);

        let ctx = EventContext::normalize(
            &json!({
                "hook_event_name": "PreToolUse",
                "session_id": "s1",
                "tool_name": "Write",
                "tool_input": {"file_path": "a.py", "content": "x = y or \"z\""}
            }),
            &NormalizeOptions::default(),
        );
        let verdict = GateRegistry::standard(&config)
            .dispatch(&ctx, &deps)
            .expect("verdict");
        assert!(verdict.reason.contains("GATE BLOCKED"));

        let mut only_detector = GateRegistry::new();
        only_detector.register(GateDefinition::standard(Gate::FallbackDetector));
        let verdict = only_detector.dispatch(&ctx, &deps).expect("verdict");
        assert!(verdict.reason.contains("P#8"));
    }

    #[test]
    fn unknown_event_and_empty_registry_yield_nothing() {
        let store = MemoryStore::default();
        let config = HookgateConfig::default();
        let templates = MessageTemplates::new();
        let deps = GateDeps {
            store: &store,
            config: &config,
            templates: &templates,
            subagent_process: false,
        };
        let ctx = EventContext::normalize(
            &json!({"hook_event_name": "PreCompress", "session_id": "s1"}),
            &NormalizeOptions::default(),
        );
        assert_eq!(GateRegistry::standard(&config).dispatch(&ctx, &deps), None);

        let ctx = EventContext::normalize(
            &json!({"hook_event_name": "UserPromptSubmit", "session_id": "s1", "prompt": "hi"}),
            &NormalizeOptions::default(),
        );
        assert_eq!(GateRegistry::new().dispatch(&ctx, &deps), None);
        assert!(!store.get_flag("s1", "hydration_pending"));
    }

    #[test]
    fn errors_and_panics_are_contained() {
        assert_eq!(guarded("failing", || Err(anyhow!("boom"))), None);
        assert_eq!(guarded("panicking", || panic!("kaboom")), None);
        assert_eq!(
            guarded("ok", || Ok(Some(Verdict::allow("fine")))),
            Some(Verdict::allow("fine"))
        );
    }
}
