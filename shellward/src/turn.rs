//! One model round-trip plus the tool calls it requests.
//!
//! Shared by the primary conversation and pre-tasks. A turn either appends
//! the assistant message and the complete batch of tool results, or (when a
//! call is declined) leaves the history exactly as it found it.

use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::core::budget::TurnBudget;
use crate::core::conversation::Conversation;
use crate::core::invariants::validate_tool_pairing;
use crate::core::message::Message;
use crate::core::types::ToolResult;
use crate::error::AgentError;
use crate::fallback::FallbackNegotiator;
use crate::hooks::{Approver, FallbackApprover, ModelClient, Observer, ToolArgs, ToolDispatcher};
use crate::tools::{PYTHON_TOOL, SHELL_TOOL, ShellArgs, ToolSpec, python_command};

/// How a single turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The assistant answered without tool calls. Text may be empty.
    Reply(String),
    /// Every requested call ran and its result was appended.
    ToolsExecuted,
    /// A call was declined and the turn was rolled back.
    Cancelled,
}

/// Borrowed collaborators needed to run a turn.
#[derive(Clone, Copy)]
pub struct Runtime<'a> {
    pub model: &'a dyn ModelClient,
    pub tools: &'a [ToolSpec],
    pub approver: &'a dyn Approver,
    pub fallback_approver: &'a dyn FallbackApprover,
    pub dispatcher: &'a dyn ToolDispatcher,
    pub observer: &'a dyn Observer,
    pub negotiator: &'a FallbackNegotiator,
}

impl Runtime<'_> {
    /// Reserve a turn from `budget` and run it against `conversation`.
    pub fn take_turn(
        &self,
        conversation: &mut Conversation,
        budget: &mut TurnBudget,
    ) -> Result<TurnOutcome, AgentError> {
        if !budget.try_take() {
            warn!(max_turns = budget.max(), "turn budget exhausted");
            return Err(AgentError::MaxTurnsExceeded {
                max_turns: budget.max(),
            });
        }
        self.turn(conversation)
    }

    #[instrument(skip_all, fields(history = conversation.len()))]
    fn turn(&self, conversation: &mut Conversation) -> Result<TurnOutcome, AgentError> {
        let reply = self
            .model
            .complete(conversation.messages(), self.tools)
            .map_err(AgentError::Transport)?;

        let checkpoint = conversation.checkpoint();
        let text = reply.text();
        if !text.trim().is_empty() {
            self.observer.on_message(&text);
        }
        let calls = reply.tool_calls.clone();
        conversation.push(reply);

        if calls.is_empty() {
            return Ok(TurnOutcome::Reply(text));
        }

        let mut pending = Vec::with_capacity(calls.len());
        for call in &calls {
            let tool = call.function.name.as_str();
            let args = call.decode_arguments();
            if !self.approver.approve(tool, &args) {
                info!(tool, call_id = %call.id, "tool call declined; rolling back turn");
                conversation.rollback(checkpoint);
                return Ok(TurnOutcome::Cancelled);
            }
            let result = self.execute(tool, &args);
            debug!(tool, call_id = %call.id, status = %result.status, "tool call finished");
            self.observer.on_tool_done(tool, &args, &result);
            pending.push(Message::tool(&call.id, &result.output));
        }

        conversation.append_batch(pending);
        let errors = validate_tool_pairing(conversation.messages());
        if !errors.is_empty() {
            warn!(?errors, "model returned unpaired or duplicate tool call ids");
        }
        Ok(TurnOutcome::ToolsExecuted)
    }

    fn execute(&self, tool: &str, args: &ToolArgs) -> ToolResult {
        match tool {
            SHELL_TOOL => {
                let shell = ShellArgs::from_args(args);
                self.negotiator.run(&shell.command, self.fallback_approver)
            }
            PYTHON_TOOL => {
                let code = args.get("code").and_then(Value::as_str).unwrap_or_default();
                self.negotiator.run(&python_command(code), self.fallback_approver)
            }
            _ => self.dispatcher.dispatch(tool, args),
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::core::message::ToolCall;
    use crate::hooks::{AutoApprove, DeclineFallback, NoopObserver, UnknownToolDispatcher};
    use crate::io::sandbox::PassthroughExecutor;
    use crate::test_support::{
        RecordingApprover, RecordingDispatcher, RecordingObserver, ScriptedModel, ScriptedShell,
        calls_reply, shell_call,
    };
    use crate::tools::shell_tool;

    fn negotiator() -> FallbackNegotiator {
        FallbackNegotiator::new(Arc::new(PassthroughExecutor::new(4096)), false, 4096)
    }

    fn seeded() -> Conversation {
        let mut conversation = Conversation::seeded(Some("system"));
        conversation.push(Message::user("hi"));
        conversation
    }

    #[test]
    fn reply_without_calls_is_appended() {
        let model = ScriptedModel::new(vec![Message::assistant("hello")]);
        let negotiator = negotiator();
        let observer = RecordingObserver::default();
        let tools = [shell_tool()];
        let runtime = Runtime {
            model: &model,
            tools: &tools,
            approver: &AutoApprove,
            fallback_approver: &DeclineFallback,
            dispatcher: &UnknownToolDispatcher,
            observer: &observer,
            negotiator: &negotiator,
        };

        let mut conversation = seeded();
        let outcome = runtime
            .take_turn(&mut conversation, &mut TurnBudget::new(1))
            .expect("turn");
        assert_eq!(outcome, TurnOutcome::Reply("hello".to_string()));
        assert_eq!(conversation.len(), 3);
        assert_eq!(observer.events(), vec!["message:hello".to_string()]);
    }

    #[test]
    fn batch_results_follow_call_order() {
        let model = ScriptedModel::new(vec![calls_reply(vec![
            shell_call("call_1", "echo first"),
            ToolCall::function("call_2", "lookup", r#"{"key":"v"}"#),
            shell_call("call_3", "echo third"),
        ])]);
        let negotiator = negotiator();
        let dispatcher = RecordingDispatcher::default();
        let runtime = Runtime {
            model: &model,
            tools: &[],
            approver: &AutoApprove,
            fallback_approver: &DeclineFallback,
            dispatcher: &dispatcher,
            observer: &NoopObserver,
            negotiator: &negotiator,
        };

        let mut conversation = seeded();
        let outcome = runtime
            .take_turn(&mut conversation, &mut TurnBudget::new(1))
            .expect("turn");
        assert_eq!(outcome, TurnOutcome::ToolsExecuted);

        let tail: Vec<(Option<&str>, String)> = conversation.messages()[3..]
            .iter()
            .map(|m| (m.tool_call_id.as_deref(), m.text()))
            .collect();
        assert_eq!(
            tail,
            vec![
                (Some("call_1"), "first\n".to_string()),
                (Some("call_2"), "lookup done".to_string()),
                (Some("call_3"), "third\n".to_string()),
            ]
        );
        assert_eq!(dispatcher.calls().len(), 1);
        assert!(validate_tool_pairing(conversation.messages()).is_empty());
    }

    #[test]
    fn decline_mid_batch_restores_history_and_skips_the_rest() {
        let model = ScriptedModel::new(vec![calls_reply(vec![
            ToolCall::function("call_1", "lookup", "{}"),
            ToolCall::function("call_2", "lookup", "{}"),
            ToolCall::function("call_3", "lookup", "{}"),
        ])]);
        let negotiator = negotiator();
        let approver = RecordingApprover::declining_at(1);
        let dispatcher = RecordingDispatcher::default();
        let runtime = Runtime {
            model: &model,
            tools: &[],
            approver: &approver,
            fallback_approver: &DeclineFallback,
            dispatcher: &dispatcher,
            observer: &NoopObserver,
            negotiator: &negotiator,
        };

        let mut conversation = seeded();
        let before = conversation.clone();
        let outcome = runtime
            .take_turn(&mut conversation, &mut TurnBudget::new(1))
            .expect("turn");
        assert_eq!(outcome, TurnOutcome::Cancelled);
        assert_eq!(conversation, before);
        assert_eq!(approver.asked().len(), 2);
        assert_eq!(dispatcher.calls().len(), 1);
    }

    #[test]
    fn malformed_arguments_decode_to_empty_map() {
        let model = ScriptedModel::new(vec![calls_reply(vec![ToolCall::function(
            "call_1", SHELL_TOOL, "not json",
        )])]);
        let negotiator = negotiator();
        let approver = RecordingApprover::approving();
        let runtime = Runtime {
            model: &model,
            tools: &[],
            approver: &approver,
            fallback_approver: &DeclineFallback,
            dispatcher: &UnknownToolDispatcher,
            observer: &NoopObserver,
            negotiator: &negotiator,
        };

        let mut conversation = seeded();
        runtime
            .take_turn(&mut conversation, &mut TurnBudget::new(1))
            .expect("turn");
        assert_eq!(approver.asked(), vec![(SHELL_TOOL.to_string(), ToolArgs::new())]);
        // An empty command still yields a tool message for the call.
        assert_eq!(conversation.messages()[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn exhausted_budget_skips_the_model() {
        let model = ScriptedModel::new(vec![Message::assistant("never")]);
        let negotiator = negotiator();
        let runtime = Runtime {
            model: &model,
            tools: &[],
            approver: &AutoApprove,
            fallback_approver: &DeclineFallback,
            dispatcher: &UnknownToolDispatcher,
            observer: &NoopObserver,
            negotiator: &negotiator,
        };

        let mut budget = TurnBudget::new(1);
        assert!(budget.try_take());
        let err = runtime
            .take_turn(&mut seeded(), &mut budget)
            .expect_err("budget");
        assert!(matches!(err, AgentError::MaxTurnsExceeded { max_turns: 1 }));
        assert_eq!(model.calls(), 0);
    }

    #[test]
    fn repeated_call_ids_are_answered_without_panicking() {
        let model = ScriptedModel::new(vec![calls_reply(vec![
            ToolCall::function("", "lookup", "{}"),
            ToolCall::function("", "lookup", "{}"),
        ])]);
        let negotiator = negotiator();
        let dispatcher = RecordingDispatcher::default();
        let runtime = Runtime {
            model: &model,
            tools: &[],
            approver: &AutoApprove,
            fallback_approver: &DeclineFallback,
            dispatcher: &dispatcher,
            observer: &NoopObserver,
            negotiator: &negotiator,
        };

        let mut conversation = seeded();
        let outcome = runtime
            .take_turn(&mut conversation, &mut TurnBudget::new(1))
            .expect("turn");
        assert_eq!(outcome, TurnOutcome::ToolsExecuted);
        assert_eq!(conversation.len(), 5);
        assert_eq!(dispatcher.calls().len(), 2);
        assert!(!validate_tool_pairing(conversation.messages()).is_empty());
    }

    #[test]
    fn python_call_runs_encoded_source_through_the_executor() {
        let code = "print('hi')";
        let model = ScriptedModel::new(vec![calls_reply(vec![ToolCall::function(
            "call_1",
            PYTHON_TOOL,
            &serde_json::json!({ "code": code }).to_string(),
        )])]);
        let shell = Arc::new(ScriptedShell::succeeding("hi\n"));
        let negotiator = FallbackNegotiator::new(shell.clone(), false, 4096);
        let dispatcher = RecordingDispatcher::default();
        let runtime = Runtime {
            model: &model,
            tools: &[],
            approver: &AutoApprove,
            fallback_approver: &DeclineFallback,
            dispatcher: &dispatcher,
            observer: &NoopObserver,
            negotiator: &negotiator,
        };

        let mut conversation = seeded();
        runtime
            .take_turn(&mut conversation, &mut TurnBudget::new(1))
            .expect("turn");
        assert_eq!(shell.commands(), vec![python_command(code)]);
        assert!(dispatcher.calls().is_empty());
        assert_eq!(conversation.messages()[3].tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(conversation.messages()[3].text(), "hi\n");
    }
}
