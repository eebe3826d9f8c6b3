//! Confined shell execution for tool-calling agents.
//!
//! Shell commands requested by a model run under a default-deny confinement
//! profile where the platform supports one, and a denial can be re-run
//! unconfined only with explicit approval. Around that sits a turn-based
//! orchestrator with strict rollback on cancellation, a per-call turn cap,
//! and marker-terminated pre-tasks.
//!
//! - **[`core`]**: Pure logic (profile compilation, denial classification,
//!   message history and its invariants). No I/O.
//! - **[`io`]**: Process spawning, the executors and configuration files.
//!
//! [`chat`], [`turn`], [`pretask`] and [`fallback`] coordinate the two and
//! talk to the host only through the capability traits in [`hooks`].

pub mod chat;
pub mod core;
pub mod error;
pub mod exit_codes;
pub mod fallback;
pub mod hooks;
pub mod io;
pub mod logging;
pub mod pretask;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod tools;
pub mod turn;
