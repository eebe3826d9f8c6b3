//! Shell execution with negotiated fallback outside the sandbox.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::core::types::ToolResult;
use crate::hooks::FallbackApprover;
use crate::io::sandbox::{PassthroughExecutor, ShellExecutor};

/// Routes shell commands through the configured executor and, after a
/// policy denial, offers an approved unconfined re-run.
#[derive(Clone)]
pub struct FallbackNegotiator {
    executor: Arc<dyn ShellExecutor>,
    unconfined: PassthroughExecutor,
    fallback_outside_sandbox: bool,
}

impl FallbackNegotiator {
    pub fn new(
        executor: Arc<dyn ShellExecutor>,
        fallback_outside_sandbox: bool,
        output_limit_bytes: usize,
    ) -> Self {
        Self {
            executor,
            unconfined: PassthroughExecutor::new(output_limit_bytes),
            fallback_outside_sandbox,
        }
    }

    pub fn confinement_active(&self) -> bool {
        self.executor.is_confined()
    }

    /// Run `command` on the configured executor, re-running it unconfined if
    /// the sandbox denied it and `approver` agrees. The command text is passed
    /// through untouched.
    #[instrument(skip_all, fields(confined = self.executor.is_confined()))]
    pub fn run(&self, command: &str, approver: &dyn FallbackApprover) -> ToolResult {
        let (result, meta) = self.executor.run(command);
        if !self.executor.is_confined() || !meta.sandbox_error {
            return result;
        }
        if !self.fallback_outside_sandbox {
            debug!(reason = %meta.sandbox_reason, "fallback disabled; keeping denial");
            return result;
        }
        if !approver.approve_fallback(command, &meta.sandbox_reason) {
            info!(reason = %meta.sandbox_reason, "unconfined fallback declined");
            return result;
        }

        info!(reason = %meta.sandbox_reason, "re-running command outside the sandbox");
        self.unconfined.run(command).0
    }
}

impl std::fmt::Debug for FallbackNegotiator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FallbackNegotiator")
            .field("confined", &self.executor.is_confined())
            .field("fallback_outside_sandbox", &self.fallback_outside_sandbox)
            .finish()
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::hooks::{AllowFallback, DeclineFallback};
    use crate::test_support::{RecordingFallback, ScriptedShell};

    const DENIED_WRITE: &str = "touch /usr/local/blocked.txt";

    #[test]
    fn unconfined_executor_runs_directly_without_asking() {
        let approver = RecordingFallback::new(true);
        let negotiator = FallbackNegotiator::new(Arc::new(PassthroughExecutor::new(1024)), true, 1024);

        let result = negotiator.run("echo hello", &approver);
        assert!(result.success);
        assert!(result.output.contains("hello"));
        assert_eq!(result.exec_meta.map(|m| m.sandboxed), Some(false));
        assert!(approver.requests().is_empty());
    }

    #[test]
    fn injected_unconfined_executor_is_used() {
        let shell = Arc::new(ScriptedShell::unconfined("from the injected executor\n"));
        let approver = RecordingFallback::new(true);
        let negotiator = FallbackNegotiator::new(shell.clone(), true, 1024);
        assert!(!negotiator.confinement_active());

        let result = negotiator.run("echo ignored", &approver);
        assert!(result.success);
        assert_eq!(result.output, "from the injected executor\n");
        assert_eq!(shell.commands(), vec!["echo ignored".to_string()]);
        assert!(approver.requests().is_empty());
    }

    #[test]
    fn confined_success_is_returned_as_is() {
        let shell = Arc::new(ScriptedShell::succeeding("scripted ok\n"));
        let approver = RecordingFallback::new(true);
        let negotiator = FallbackNegotiator::new(shell.clone(), true, 1024);

        let result = negotiator.run("echo ignored", &approver);
        assert!(result.success);
        assert_eq!(result.output, "scripted ok\n");
        assert_eq!(result.exec_meta.map(|m| m.sandboxed), Some(true));
        assert_eq!(shell.commands().len(), 1);
        assert!(approver.requests().is_empty());
    }

    #[test]
    fn approved_fallback_reruns_identical_command_unconfined() {
        let shell = Arc::new(ScriptedShell::denying("write access denied"));
        let approver = RecordingFallback::new(true);
        let negotiator = FallbackNegotiator::new(shell.clone(), true, 1024);

        let command = "echo 'fallback ran'";
        let result = negotiator.run(command, &approver);
        assert!(result.success, "{result:?}");
        assert!(result.output.contains("fallback ran"));
        let meta = result.exec_meta.expect("meta");
        assert!(!meta.sandboxed);
        assert!(!meta.sandbox_error);
        assert_eq!(shell.commands(), vec![command.to_string()]);
        assert_eq!(
            approver.requests(),
            vec![(command.to_string(), "write access denied".to_string())]
        );
    }

    #[test]
    fn declined_fallback_returns_original_denial() {
        let shell = Arc::new(ScriptedShell::denying("write access denied"));
        let negotiator = FallbackNegotiator::new(shell, true, 1024);

        let result = negotiator.run(DENIED_WRITE, &DeclineFallback);
        assert!(!result.success);
        assert!(result.is_sandbox_denial());
        assert!(result.status.starts_with("sandbox blocked"));
    }

    #[test]
    fn disabled_fallback_never_asks() {
        let shell = Arc::new(ScriptedShell::denying("write access denied"));
        let approver = RecordingFallback::new(true);
        let negotiator = FallbackNegotiator::new(shell, false, 1024);

        let result = negotiator.run(DENIED_WRITE, &approver);
        assert!(result.is_sandbox_denial());
        assert!(approver.requests().is_empty());
    }

    #[test]
    fn ordinary_failure_is_not_negotiated() {
        let shell = Arc::new(ScriptedShell::failing());
        let negotiator = FallbackNegotiator::new(shell.clone(), true, 1024);

        let result = negotiator.run("exit 3", &AllowFallback);
        assert!(!result.success);
        assert!(!result.is_sandbox_denial());
        assert_eq!(shell.commands().len(), 1);
    }
}
