//! I/O helpers for hookgate commands.

pub mod config;
pub mod session_store;
pub mod templates;
