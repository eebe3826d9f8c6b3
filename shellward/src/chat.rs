//! The primary conversation.
//!
//! An [`Agent`] owns one history and drives it turn by turn until the model
//! answers without tool calls, a call is declined, or the turn budget runs
//! out. Configured pre-tasks run once, before the first user message.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::core::budget::TurnBudget;
use crate::core::conversation::Conversation;
use crate::core::message::Message;
use crate::error::AgentError;
use crate::fallback::FallbackNegotiator;
use crate::hooks::{
    Approver, AutoApprove, DeclineFallback, FallbackApprover, ModelClient, NoopObserver, Observer,
    ToolDispatcher, UnknownToolDispatcher,
};
use crate::io::config::AgentConfig;
use crate::io::sandbox::ShellExecutor;
use crate::pretask::run_pretasks;
use crate::tools::{ToolSpec, python_tool, shell_tool};
use crate::turn::{Runtime, TurnOutcome};

/// How a `chat` call ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatOutcome {
    /// Final assistant text.
    Response(String),
    /// A tool call was declined; history is as it was before the last turn.
    Cancelled,
}

/// Tool-calling agent over one conversation.
pub struct Agent<M> {
    config: AgentConfig,
    parts: Parts<M>,
    conversation: Conversation,
    pretasks_done: bool,
}

/// Everything a turn borrows, kept apart from the history it mutates.
struct Parts<M> {
    model: M,
    tools: Vec<ToolSpec>,
    negotiator: FallbackNegotiator,
    approver: Box<dyn Approver>,
    fallback_approver: Box<dyn FallbackApprover>,
    dispatcher: Box<dyn ToolDispatcher>,
    observer: Box<dyn Observer>,
}

impl<M: ModelClient> Parts<M> {
    fn runtime(&self) -> Runtime<'_> {
        Runtime {
            model: &self.model,
            tools: &self.tools,
            approver: self.approver.as_ref(),
            fallback_approver: self.fallback_approver.as_ref(),
            dispatcher: self.dispatcher.as_ref(),
            observer: self.observer.as_ref(),
            negotiator: &self.negotiator,
        }
    }
}

impl<M: ModelClient> Agent<M> {
    /// Build an agent around `executor`, which may be shared with others.
    ///
    /// Offers `run_shell` and `python_runtime`. Hooks start at their
    /// defaults: every call approved, fallback declined, other tools
    /// rejected, nothing observed.
    pub fn new(config: AgentConfig, model: M, executor: Arc<dyn ShellExecutor>) -> Result<Self, AgentError> {
        config.validate()?;
        let negotiator = FallbackNegotiator::new(
            executor,
            config.sandbox.fallback_outside_sandbox,
            config.output_limit_bytes,
        );
        let conversation = Conversation::seeded(config.system_prompt.as_deref());
        info!(
            confined = negotiator.confinement_active(),
            pretasks = config.pretasks.len(),
            "agent ready"
        );
        Ok(Self {
            config,
            parts: Parts {
                model,
                tools: vec![shell_tool(), python_tool()],
                negotiator,
                approver: Box::new(AutoApprove),
                fallback_approver: Box::new(DeclineFallback),
                dispatcher: Box::new(UnknownToolDispatcher),
                observer: Box::new(NoopObserver),
            },
            conversation,
            pretasks_done: false,
        })
    }

    pub fn with_approver(mut self, approver: impl Approver + 'static) -> Self {
        self.parts.approver = Box::new(approver);
        self
    }

    pub fn with_fallback_approver(mut self, approver: impl FallbackApprover + 'static) -> Self {
        self.parts.fallback_approver = Box::new(approver);
        self
    }

    pub fn with_dispatcher(mut self, dispatcher: impl ToolDispatcher + 'static) -> Self {
        self.parts.dispatcher = Box::new(dispatcher);
        self
    }

    pub fn with_observer(mut self, observer: impl Observer + 'static) -> Self {
        self.parts.observer = Box::new(observer);
        self
    }

    /// Replace the tool list sent with every request.
    pub fn with_tools(mut self, tools: Vec<ToolSpec>) -> Self {
        self.parts.tools = tools;
        self
    }

    /// Whether shell commands run under a confinement profile.
    pub fn confinement_active(&self) -> bool {
        self.parts.negotiator.confinement_active()
    }

    /// Send `input` and run turns until the model gives a final answer.
    ///
    /// Pre-tasks run on the first call only, successful or not. A declined
    /// tool call is not an error: it yields [`ChatOutcome::Cancelled`] with
    /// the history restored to its state before that turn.
    #[instrument(skip_all, fields(history = self.conversation.len()))]
    pub fn chat(&mut self, input: &str) -> Result<ChatOutcome, AgentError> {
        let runtime = self.parts.runtime();
        if !self.pretasks_done && !self.config.pretasks.is_empty() {
            self.pretasks_done = true;
            run_pretasks(&runtime, &self.config.pretasks, self.config.max_pretask_turns)?;
        }

        self.conversation.push(Message::user(input));
        let mut budget = TurnBudget::new(self.config.max_turns);
        loop {
            match runtime.take_turn(&mut self.conversation, &mut budget)? {
                TurnOutcome::Reply(text) if text.is_empty() => return Err(AgentError::EmptyResponse),
                TurnOutcome::Reply(text) => return Ok(ChatOutcome::Response(text)),
                TurnOutcome::ToolsExecuted => {}
                TurnOutcome::Cancelled => return Ok(ChatOutcome::Cancelled),
            }
        }
    }

    /// Conversation history, oldest first.
    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    /// Clear the history, keeping the configured system prompt.
    pub fn reset(&mut self) {
        self.conversation = Conversation::seeded(self.config.system_prompt.as_deref());
    }
}

impl<M> std::fmt::Debug for Agent<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("negotiator", &self.parts.negotiator)
            .field("messages", &self.conversation.len())
            .field("pretasks_done", &self.pretasks_done)
            .finish_non_exhaustive()
    }
}
