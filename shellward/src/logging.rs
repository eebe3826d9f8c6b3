//! Diagnostics via `tracing`.
//!
//! Executor choice, denials, fallback decisions, rollbacks and budget
//! exhaustion are emitted as events; nothing here is part of the
//! conversation or the tool output.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Install a stderr subscriber filtered by `RUST_LOG` (default `warn`).
///
/// ```bash
/// RUST_LOG=shellward=debug shellward exec -- ls
/// ```
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
