//! Capabilities injected into the orchestrator.
//!
//! Each hook is a small trait with a default implementation, so an agent
//! built without customisation auto-approves tool calls, declines unconfined
//! fallback, rejects tools other than `run_shell` and `python_runtime`, and
//! observes nothing.

use serde_json::{Map, Value};

use crate::core::message::Message;
use crate::core::types::ToolResult;
use crate::tools::{ToolSpec, requires_confirmation};

/// Tool-call arguments as decoded from the model's JSON payload.
pub type ToolArgs = Map<String, Value>;

/// Produces the next assistant message for a history.
///
/// Implementations own transport details, including the round-trip timeout.
pub trait ModelClient {
    fn complete(&self, history: &[Message], tools: &[ToolSpec]) -> anyhow::Result<Message>;
}

impl<M: ModelClient + ?Sized> ModelClient for &M {
    fn complete(&self, history: &[Message], tools: &[ToolSpec]) -> anyhow::Result<Message> {
        (**self).complete(history, tools)
    }
}

/// Decides whether a tool call may run. Returning false cancels the turn.
pub trait Approver {
    fn approve(&self, tool: &str, args: &ToolArgs) -> bool;
}

impl<A: Approver + ?Sized> Approver for &A {
    fn approve(&self, tool: &str, args: &ToolArgs) -> bool {
        (**self).approve(tool, args)
    }
}

/// Decides whether a command denied by the sandbox may re-run unconfined.
pub trait FallbackApprover {
    fn approve_fallback(&self, command: &str, reason: &str) -> bool;
}

/// Runs every tool other than `run_shell` and `python_runtime`.
pub trait ToolDispatcher {
    fn dispatch(&self, tool: &str, args: &ToolArgs) -> ToolResult;
}

/// Display hooks. All methods default to doing nothing.
pub trait Observer {
    /// Assistant text, only when non-blank.
    fn on_message(&self, _content: &str) {}

    fn on_tool_done(&self, _tool: &str, _args: &ToolArgs, _result: &ToolResult) {}

    fn on_pretask_start(&self, _name: &str) {}

    fn on_pretask_end(&self, _name: &str) {}
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AutoApprove;

impl Approver for AutoApprove {
    fn approve(&self, _tool: &str, _args: &ToolArgs) -> bool {
        true
    }
}

/// Default fallback policy: never leave the sandbox.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclineFallback;

impl FallbackApprover for DeclineFallback {
    fn approve_fallback(&self, _command: &str, _reason: &str) -> bool {
        false
    }
}

/// Fallback policy that always re-runs unconfined.
#[derive(Debug, Clone, Copy, Default)]
pub struct AllowFallback;

impl FallbackApprover for AllowFallback {
    fn approve_fallback(&self, _command: &str, _reason: &str) -> bool {
        true
    }
}

/// Default dispatcher: no plain tools are registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnknownToolDispatcher;

impl ToolDispatcher for UnknownToolDispatcher {
    fn dispatch(&self, tool: &str, _args: &ToolArgs) -> ToolResult {
        ToolResult::failed(format!("unknown tool: {tool}"), "fail: unknown tool")
            .with_output(format!("unknown tool: {tool}"))
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoopObserver;

impl Observer for NoopObserver {}

/// Asks `inner` only for calls that need confirmation.
///
/// While confinement is active, shell calls run without asking and a denial
/// goes to the [`FallbackApprover`] instead. Without confinement, shell calls
/// are put to `inner` once, before anything executes.
#[derive(Debug, Clone)]
pub struct ConfirmingApprover<A> {
    inner: A,
    confinement_active: bool,
}

impl<A: Approver> ConfirmingApprover<A> {
    pub fn new(inner: A, confinement_active: bool) -> Self {
        Self {
            inner,
            confinement_active,
        }
    }
}

impl<A: Approver> Approver for ConfirmingApprover<A> {
    fn approve(&self, tool: &str, args: &ToolArgs) -> bool {
        if !requires_confirmation(tool, self.confinement_active) {
            return true;
        }
        self.inner.approve(tool, args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::SHELL_TOOL;
    use std::cell::RefCell;

    struct Recording {
        decision: bool,
        asked: RefCell<Vec<String>>,
    }

    impl Approver for Recording {
        fn approve(&self, tool: &str, _args: &ToolArgs) -> bool {
            self.asked.borrow_mut().push(tool.to_string());
            self.decision
        }
    }

    fn recording(decision: bool) -> Recording {
        Recording {
            decision,
            asked: RefCell::new(Vec::new()),
        }
    }

    #[test]
    fn confined_shell_calls_skip_the_inner_approver() {
        let inner = recording(false);
        let approver = ConfirmingApprover::new(&inner, true);
        assert!(approver.approve(SHELL_TOOL, &ToolArgs::new()));
        assert!(!approver.approve("write_file", &ToolArgs::new()));
        assert_eq!(*inner.asked.borrow(), vec!["write_file".to_string()]);
    }

    #[test]
    fn unconfined_shell_calls_are_put_to_the_inner_approver() {
        let inner = recording(false);
        let approver = ConfirmingApprover::new(&inner, false);
        assert!(!approver.approve(SHELL_TOOL, &ToolArgs::new()));
        assert!(approver.approve("read_file", &ToolArgs::new()));
        assert_eq!(*inner.asked.borrow(), vec![SHELL_TOOL.to_string()]);
    }

    #[test]
    fn unknown_tool_dispatch_fails_visibly() {
        let result = UnknownToolDispatcher.dispatch("edit_file", &ToolArgs::new());
        assert!(!result.success);
        assert_eq!(result.output, "unknown tool: edit_file");
        assert_eq!(result.status, "fail: unknown tool");
    }

    #[test]
    fn defaults() {
        assert!(AutoApprove.approve("anything", &ToolArgs::new()));
        assert!(!DeclineFallback.approve_fallback("touch /x", "write access denied"));
        assert!(AllowFallback.approve_fallback("touch /x", "write access denied"));
    }
}
