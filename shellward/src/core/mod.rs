//! Deterministic, pure logic shared by the executor and the orchestrator.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (configs, outputs, message histories) and return deterministic
//! results suitable for tests.

pub mod budget;
pub mod classifier;
pub mod conversation;
pub mod invariants;
pub mod message;
pub mod profile;
pub mod types;
