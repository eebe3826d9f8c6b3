//! Shared result types for tool execution.
//!
//! These are the only data handed back to the orchestrator after a tool runs.
//! Only [`ToolResult::output`] is forwarded to the model; `status` and
//! [`ExecMeta`] exist for whatever display layer the host application has.

use serde::{Deserialize, Serialize};

/// Confinement metadata for a single shell execution attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecMeta {
    /// The command ran under the compiled confinement profile.
    pub sandboxed: bool,
    /// The failure was classified as a policy denial.
    pub sandbox_error: bool,
    /// Short human-readable denial reason. Empty unless `sandbox_error`.
    pub sandbox_reason: String,
}

impl ExecMeta {
    pub fn confined() -> Self {
        Self {
            sandboxed: true,
            ..Self::default()
        }
    }

    pub fn unconfined() -> Self {
        Self::default()
    }

    pub fn denied(reason: impl Into<String>) -> Self {
        Self {
            sandboxed: true,
            sandbox_error: true,
            sandbox_reason: reason.into(),
        }
    }
}

/// Outcome of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Text sent back to the model as the tool message content.
    pub output: String,
    /// Human summary, e.g. `ok (0.3s)`.
    pub status: String,
    pub error: Option<String>,
    /// Present for shell executions only.
    pub exec_meta: Option<ExecMeta>,
}

impl ToolResult {
    pub fn ok(output: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            status: status.into(),
            error: None,
            exec_meta: None,
        }
    }

    pub fn failed(error: impl Into<String>, status: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            status: status.into(),
            error: Some(error.into()),
            exec_meta: None,
        }
    }

    pub fn with_output(mut self, output: impl Into<String>) -> Self {
        self.output = output.into();
        self
    }

    pub fn with_meta(mut self, meta: ExecMeta) -> Self {
        self.exec_meta = Some(meta);
        self
    }

    /// True when the shell executor classified this result as a policy denial.
    pub fn is_sandbox_denial(&self) -> bool {
        self.exec_meta
            .as_ref()
            .is_some_and(|meta| meta.sandbox_error)
    }
}

/// Format the status line for a finished command, e.g. `fail (1.2s)`.
pub fn elapsed_status(label: &str, elapsed_secs: f64) -> String {
    format!("{label} ({elapsed_secs:.1}s)")
}
