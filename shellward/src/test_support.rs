//! Test-only doubles for the orchestrator's collaborators.
//!
//! Everything here records what it was asked so tests can assert on call
//! order and arguments without a real model or a real sandbox.

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result, anyhow};
use serde_json::json;
use tempfile::TempDir;

use crate::core::message::{Message, ToolCall};
use crate::core::types::{ExecMeta, ToolResult, elapsed_status};
use crate::hooks::{Approver, FallbackApprover, ModelClient, Observer, ToolArgs, ToolDispatcher};
use crate::io::config::SandboxConfig;
use crate::io::sandbox::{SandboxedExecutor, ShellExecutor};
use crate::tools::{SHELL_TOOL, ToolSpec};

/// Name of the file the stand-in launcher writes its profile argument to.
pub const RECORDED_PROFILE: &str = "last_profile.sb";

/// Write a `sandbox-exec` stand-in into `dir`.
///
/// The script records the profile passed with `-p` and then runs the rest of
/// its arguments unconfined, so confined-executor plumbing can be exercised
/// on any unix host.
#[cfg(unix)]
pub fn fake_launcher(dir: &Path) -> Result<PathBuf> {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("sandbox-exec");
    let script = format!(
        "#!/bin/sh\nprintf '%s' \"$2\" > '{}'\nshift 2\nexec \"$@\"\n",
        dir.join(RECORDED_PROFILE).display()
    );
    fs::write(&path, script).with_context(|| format!("write {}", path.display()))?;
    let mut perms = fs::metadata(&path)
        .with_context(|| format!("stat {}", path.display()))?
        .permissions();
    perms.set_mode(0o755);
    fs::set_permissions(&path, perms).with_context(|| format!("chmod {}", path.display()))?;
    Ok(path)
}

/// A stand-in launcher living in its own temp directory.
#[cfg(unix)]
pub struct FakeSandbox {
    dir: TempDir,
    launcher: PathBuf,
}

#[cfg(unix)]
impl FakeSandbox {
    pub fn new() -> Result<Self> {
        let dir = tempfile::tempdir().context("create launcher tempdir")?;
        let launcher = fake_launcher(dir.path())?;
        Ok(Self { dir, launcher })
    }

    pub fn executor(&self, config: &SandboxConfig, output_limit_bytes: usize) -> SandboxedExecutor {
        SandboxedExecutor::with_launcher(&self.launcher, config, output_limit_bytes)
    }

    /// Profile text handed to the most recent launch.
    pub fn recorded_profile(&self) -> Result<String> {
        let path = self.dir.path().join(RECORDED_PROFILE);
        fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))
    }
}

enum ShellScript {
    Deny(String),
    Fail,
    Succeed(String),
}

/// Executor that never spawns anything. Confined unless built with
/// [`ScriptedShell::unconfined`].
pub struct ScriptedShell {
    script: ShellScript,
    confined: bool,
    commands: Mutex<Vec<String>>,
}

impl ScriptedShell {
    /// Every command comes back as a policy denial with `reason`.
    pub fn denying(reason: &str) -> Self {
        Self::new(ShellScript::Deny(reason.to_string()))
    }

    /// Every command fails without a denial.
    pub fn failing() -> Self {
        Self::new(ShellScript::Fail)
    }

    /// Every command succeeds with `output`.
    pub fn succeeding(output: &str) -> Self {
        Self::new(ShellScript::Succeed(output.to_string()))
    }

    /// Unconfined executor where every command succeeds with `output`.
    pub fn unconfined(output: &str) -> Self {
        Self {
            confined: false,
            ..Self::succeeding(output)
        }
    }

    fn new(script: ShellScript) -> Self {
        Self {
            script,
            confined: true,
            commands: Mutex::new(Vec::new()),
        }
    }

    pub fn commands(&self) -> Vec<String> {
        self.commands.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ShellExecutor for ScriptedShell {
    fn run(&self, command: &str) -> (ToolResult, ExecMeta) {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.to_string());
        }
        let (result, meta) = match &self.script {
            ShellScript::Deny(reason) => (
                ToolResult::failed("exit status: 1", elapsed_status("sandbox blocked", 0.0))
                    .with_output(format!("Sandbox: deny(1) {reason}\n")),
                ExecMeta::denied(reason.clone()),
            ),
            ShellScript::Fail => (
                ToolResult::failed("exit status: 3", elapsed_status("fail", 0.0))
                    .with_output("scripted failure\n"),
                ExecMeta::confined(),
            ),
            ShellScript::Succeed(output) => (
                ToolResult::ok(output.clone(), elapsed_status("ok", 0.0)),
                if self.confined {
                    ExecMeta::confined()
                } else {
                    ExecMeta::unconfined()
                },
            ),
        };
        (result.with_meta(meta.clone()), meta)
    }

    fn is_confined(&self) -> bool {
        self.confined
    }
}

/// Fallback approver with a fixed answer that remembers each request.
pub struct RecordingFallback {
    decision: bool,
    requests: Mutex<Vec<(String, String)>>,
}

impl RecordingFallback {
    pub fn new(decision: bool) -> Self {
        Self {
            decision,
            requests: Mutex::new(Vec::new()),
        }
    }

    /// `(command, reason)` pairs in the order they were asked.
    pub fn requests(&self) -> Vec<(String, String)> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl FallbackApprover for RecordingFallback {
    fn approve_fallback(&self, command: &str, reason: &str) -> bool {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push((command.to_string(), reason.to_string()));
        }
        self.decision
    }
}

/// Model client replaying a fixed script of replies.
///
/// Once the script runs out it either repeats a fallback reply or fails
/// with a transport error.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Result<Message, String>>>,
    repeat: Option<Message>,
    histories: Mutex<Vec<Vec<Message>>>,
    tool_names: Mutex<Vec<Vec<String>>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Message>) -> Self {
        Self {
            replies: Mutex::new(replies.into_iter().map(Ok).collect()),
            repeat: None,
            histories: Mutex::new(Vec::new()),
            tool_names: Mutex::new(Vec::new()),
        }
    }

    /// Answer every request with `reply`.
    pub fn repeating(reply: Message) -> Self {
        Self {
            repeat: Some(reply),
            ..Self::new(Vec::new())
        }
    }

    /// Queue a transport failure after the replies scripted so far.
    pub fn then_fail(self, error: &str) -> Self {
        if let Ok(mut replies) = self.replies.lock() {
            replies.push_back(Err(error.to_string()));
        }
        self
    }

    /// Number of completed or failed requests.
    pub fn calls(&self) -> usize {
        self.histories.lock().map(|h| h.len()).unwrap_or_default()
    }

    /// History passed with each request, in order.
    pub fn histories(&self) -> Vec<Vec<Message>> {
        self.histories.lock().map(|h| h.clone()).unwrap_or_default()
    }

    /// Names of the tools offered with each request, in order.
    pub fn tool_names(&self) -> Vec<Vec<String>> {
        self.tool_names.lock().map(|t| t.clone()).unwrap_or_default()
    }
}

impl ModelClient for ScriptedModel {
    fn complete(&self, history: &[Message], tools: &[ToolSpec]) -> Result<Message> {
        if let Ok(mut histories) = self.histories.lock() {
            histories.push(history.to_vec());
        }
        if let Ok(mut tool_names) = self.tool_names.lock() {
            tool_names.push(tools.iter().map(|t| t.name().to_string()).collect());
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| anyhow!("scripted model poisoned"))?
            .pop_front();
        match next {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(error)) => Err(anyhow!(error)),
            None => self
                .repeat
                .clone()
                .ok_or_else(|| anyhow!("scripted model exhausted")),
        }
    }
}

/// Approver that declines the n-th request (0-based) or nothing at all.
#[derive(Default)]
pub struct RecordingApprover {
    decline_at: Option<usize>,
    asked: Mutex<Vec<(String, ToolArgs)>>,
}

impl RecordingApprover {
    pub fn approving() -> Self {
        Self::default()
    }

    pub fn declining_at(index: usize) -> Self {
        Self {
            decline_at: Some(index),
            ..Self::default()
        }
    }

    pub fn asked(&self) -> Vec<(String, ToolArgs)> {
        self.asked.lock().map(|a| a.clone()).unwrap_or_default()
    }
}

impl Approver for RecordingApprover {
    fn approve(&self, tool: &str, args: &ToolArgs) -> bool {
        let Ok(mut asked) = self.asked.lock() else {
            return false;
        };
        let index = asked.len();
        asked.push((tool.to_string(), args.clone()));
        self.decline_at != Some(index)
    }
}

/// Dispatcher that succeeds with `<tool> done` for every call.
#[derive(Default)]
pub struct RecordingDispatcher {
    calls: Mutex<Vec<(String, ToolArgs)>>,
}

impl RecordingDispatcher {
    pub fn calls(&self) -> Vec<(String, ToolArgs)> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl ToolDispatcher for RecordingDispatcher {
    fn dispatch(&self, tool: &str, args: &ToolArgs) -> ToolResult {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push((tool.to_string(), args.clone()));
        }
        ToolResult::ok(format!("{tool} done"), "ok")
    }
}

/// Observer that flattens every callback into a `kind:detail` string.
#[derive(Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<String>>,
}

impl RecordingObserver {
    pub fn events(&self) -> Vec<String> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }

    fn record(&self, event: String) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

impl Observer for RecordingObserver {
    fn on_message(&self, content: &str) {
        self.record(format!("message:{content}"));
    }

    fn on_tool_done(&self, tool: &str, _args: &ToolArgs, result: &ToolResult) {
        self.record(format!("tool:{tool}:{}", result.success));
    }

    fn on_pretask_start(&self, name: &str) {
        self.record(format!("pretask_start:{name}"));
    }

    fn on_pretask_end(&self, name: &str) {
        self.record(format!("pretask_end:{name}"));
    }
}

/// A `run_shell` call with a JSON-encoded `command` argument.
pub fn shell_call(id: &str, command: &str) -> ToolCall {
    ToolCall::function(id, SHELL_TOOL, &json!({ "command": command }).to_string())
}

/// Assistant reply requesting `calls`.
pub fn calls_reply(calls: Vec<ToolCall>) -> Message {
    Message::assistant_tool_calls(calls)
}
