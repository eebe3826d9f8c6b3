//! Shell executors: confined (`sandbox-exec`) and passthrough.
//!
//! The [`ShellExecutor`] trait decouples the orchestrator from how a command
//! is actually run. Executors hold only immutable state, so one instance can
//! be shared (behind an `Arc`) by any number of conversations.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{info, instrument, warn};

use crate::core::classifier::{Classification, classify_failure};
use crate::core::profile::{CompiledProfile, compile_profile};
use crate::core::types::{ExecMeta, ToolResult, elapsed_status};
use crate::io::config::SandboxConfig;
use crate::io::process::{CommandOutput, run_command_combined};

/// Binary that applies an SBPL profile to a child process.
pub const LAUNCHER: &str = "sandbox-exec";

const SHELL: &str = "sh";

/// Abstraction over shell execution backends.
pub trait ShellExecutor: Send + Sync {
    /// Run `command` and report its result with confinement metadata.
    fn run(&self, command: &str) -> (ToolResult, ExecMeta);

    /// Whether commands run under a confinement profile.
    fn is_confined(&self) -> bool;
}

/// True when the platform has a native confinement primitive and its
/// launcher resolves on `PATH`.
pub fn confinement_available() -> bool {
    cfg!(target_os = "macos") && which::which(LAUNCHER).is_ok()
}

/// Pick the executor for `config`: confined when enabled and available,
/// passthrough otherwise.
pub fn build_executor(config: &SandboxConfig, output_limit_bytes: usize) -> Arc<dyn ShellExecutor> {
    if !config.enabled {
        info!("confinement disabled; commands run unconfined");
        return Arc::new(PassthroughExecutor::new(output_limit_bytes));
    }
    match SandboxedExecutor::new(config, output_limit_bytes) {
        Ok(executor) => {
            info!(launcher = %executor.launcher().display(), "commands run confined");
            Arc::new(executor)
        }
        Err(err) => {
            warn!(err = %format!("{err:#}"), "confinement unavailable; commands run unconfined");
            Arc::new(PassthroughExecutor::new(output_limit_bytes))
        }
    }
}

/// Executes commands inside `sandbox-exec` with a profile compiled once at
/// construction.
#[derive(Debug, Clone)]
pub struct SandboxedExecutor {
    launcher: PathBuf,
    profile: CompiledProfile,
    output_limit_bytes: usize,
}

impl SandboxedExecutor {
    /// Build a confined executor, failing if confinement is unavailable here.
    pub fn new(config: &SandboxConfig, output_limit_bytes: usize) -> Result<Self> {
        if !cfg!(target_os = "macos") {
            anyhow::bail!("{LAUNCHER} confinement is only available on macOS");
        }
        let launcher = which::which(LAUNCHER).with_context(|| format!("locate {LAUNCHER}"))?;
        Ok(Self::with_launcher(launcher, config, output_limit_bytes))
    }

    /// Build a confined executor around an explicit launcher binary.
    ///
    /// The launcher is invoked as `<launcher> -p <profile> sh -c <command>`.
    pub fn with_launcher(launcher: impl Into<PathBuf>, config: &SandboxConfig, output_limit_bytes: usize) -> Self {
        if config.write_paths.is_empty() {
            warn!("sandbox write_paths is empty; confined commands cannot write anywhere");
        }
        if config.exec_paths.is_empty() {
            warn!("sandbox exec_paths is empty; confined commands may fail to exec");
        }
        Self {
            launcher: launcher.into(),
            profile: compile_profile(config),
            output_limit_bytes,
        }
    }

    pub fn profile(&self) -> &CompiledProfile {
        &self.profile
    }

    pub fn launcher(&self) -> &Path {
        &self.launcher
    }
}

impl ShellExecutor for SandboxedExecutor {
    #[instrument(skip_all, fields(confined = true))]
    fn run(&self, command: &str) -> (ToolResult, ExecMeta) {
        let mut cmd = Command::new(&self.launcher);
        cmd.arg("-p")
            .arg(self.profile.as_str())
            .arg(SHELL)
            .arg("-c")
            .arg(command);

        let output = match run_command_combined(cmd, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => return spawn_failure(&err, ExecMeta::confined()),
        };

        let elapsed = output.elapsed.as_secs_f64();
        let text = output.text();
        if output.status.success() {
            let meta = ExecMeta::confined();
            let result = ToolResult::ok(text, elapsed_status("ok", elapsed)).with_meta(meta.clone());
            return (result, meta);
        }

        match classify_failure(&text, output.exit_code()) {
            Classification::Denied { reason } => {
                warn!(%reason, exit_code = ?output.exit_code(), "command blocked by sandbox policy");
                let meta = ExecMeta::denied(reason);
                let result = failed_result(&output, text, elapsed_status("sandbox blocked", elapsed))
                    .with_meta(meta.clone());
                (result, meta)
            }
            Classification::Ordinary => {
                let meta = ExecMeta::confined();
                let result = failed_result(&output, text, elapsed_status("fail", elapsed))
                    .with_meta(meta.clone());
                (result, meta)
            }
        }
    }

    fn is_confined(&self) -> bool {
        true
    }
}

/// Executes commands directly with `sh -c`, without confinement.
#[derive(Debug, Clone)]
pub struct PassthroughExecutor {
    output_limit_bytes: usize,
}

impl PassthroughExecutor {
    pub fn new(output_limit_bytes: usize) -> Self {
        Self { output_limit_bytes }
    }
}

impl ShellExecutor for PassthroughExecutor {
    #[instrument(skip_all, fields(confined = false))]
    fn run(&self, command: &str) -> (ToolResult, ExecMeta) {
        let meta = ExecMeta::unconfined();
        let mut cmd = Command::new(SHELL);
        cmd.arg("-c").arg(command);

        let output = match run_command_combined(cmd, self.output_limit_bytes) {
            Ok(output) => output,
            Err(err) => return spawn_failure(&err, meta),
        };

        let elapsed = output.elapsed.as_secs_f64();
        let text = output.text();
        let result = if output.status.success() {
            ToolResult::ok(text, elapsed_status("ok", elapsed))
        } else {
            failed_result(&output, text, elapsed_status("fail", elapsed))
        };
        (result.with_meta(meta.clone()), meta)
    }

    fn is_confined(&self) -> bool {
        false
    }
}

fn failed_result(output: &CommandOutput, text: String, status: String) -> ToolResult {
    ToolResult::failed(output.status.to_string(), status).with_output(text)
}

fn spawn_failure(err: &anyhow::Error, meta: ExecMeta) -> (ToolResult, ExecMeta) {
    let result = ToolResult::failed(format!("{err:#}"), elapsed_status("fail", 0.0)).with_meta(meta.clone());
    (result, meta)
}
