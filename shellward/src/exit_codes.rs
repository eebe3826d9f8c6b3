//! Stable exit codes for `shellward` CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Invalid configuration, usage error, or an error before anything ran.
pub const INVALID: i32 = 1;
/// `shellward exec` ran the command and it failed.
pub const FAILED: i32 = 2;
/// `shellward exec` was denied by the confinement profile and not re-run.
pub const BLOCKED: i32 = 3;
