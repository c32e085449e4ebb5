//! Deterministic, pure logic shared by the gates.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! payloads and return deterministic outputs suitable for tests.

pub mod detector;
pub mod event;
pub mod hydration;
pub mod output;
pub mod tools;
pub mod types;
