//! Gate decision engine for agent lifecycle hooks.
//!
//! An orchestration host invokes `hookgate hook` once per lifecycle event with
//! a JSON payload on stdin; the engine answers with a JSON decision on stdout.
//! The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (event normalization, pattern
//!   detection, hydration predicates, output rendering). No I/O.
//! - **[`io`]**: Side-effecting operations (config files, session state,
//!   message templates).
//! - **[`gates`]**: Policy checks and the short-circuiting dispatcher.
//!
//! [`hook`] wires these together for a single invocation.

pub mod core;
pub mod exit_codes;
pub mod gates;
pub mod hook;
pub mod io;
pub mod logging;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
