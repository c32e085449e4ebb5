//! Stable exit codes for hookgate CLI commands.

/// Command succeeded; for `hook`, the verdict was allow, deny, or none.
pub const OK: i32 = 0;
/// `hook` returned a WARN verdict and `exit_nonzero_on_warn` is set.
pub const WARN: i32 = 1;
/// `scan` found at least one fallback pattern.
pub const VIOLATIONS: i32 = 1;
/// Invalid usage or configuration for `state` and `scan`; `hook` never uses it.
pub const INVALID: i32 = 2;
