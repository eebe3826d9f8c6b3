//! Marker-terminated side conversations run before the primary one.
//!
//! Each pre-task gets a private history and its own turn budget. Only its
//! side effects (files written by tool calls) outlive it.

use tracing::{debug, info, instrument};

use crate::core::budget::TurnBudget;
use crate::core::conversation::Conversation;
use crate::core::message::Message;
use crate::error::AgentError;
use crate::io::config::PreTaskConfig;
use crate::turn::{Runtime, TurnOutcome};

const EXPLORING_PROMPT: &str = include_str!("prompts/exploring.md");

/// Marker the stock exploring task ends its final reply with.
pub const EXPLORING_DONE_MARKER: &str = "{{DONE}}";

/// Stock pre-task that documents the working directory in `AGENT.md`.
pub fn default_exploring_task() -> PreTaskConfig {
    PreTaskConfig {
        name: "exploring".to_string(),
        system_prompt: EXPLORING_PROMPT.to_string(),
        input: "Begin".to_string(),
        done_marker: EXPLORING_DONE_MARKER.to_string(),
    }
}

/// Run `tasks` in order, stopping at the first one that fails.
#[instrument(skip_all, fields(tasks = tasks.len(), max_turns = max_turns))]
pub fn run_pretasks(
    runtime: &Runtime<'_>,
    tasks: &[PreTaskConfig],
    max_turns: u32,
) -> Result<(), AgentError> {
    for task in tasks {
        run_pretask(runtime, task, max_turns)
            .map_err(|err| AgentError::in_pretask(&task.name, err))?;
    }
    Ok(())
}

fn run_pretask(runtime: &Runtime<'_>, task: &PreTaskConfig, max_turns: u32) -> Result<(), AgentError> {
    info!(name = %task.name, "pretask started");
    runtime.observer.on_pretask_start(&task.name);

    let mut history = Conversation::seeded(Some(&task.system_prompt));
    history.push(Message::user(task.initial_input()));
    let mut budget = TurnBudget::new(max_turns);

    loop {
        match runtime.take_turn(&mut history, &mut budget)? {
            TurnOutcome::Reply(text) if text.contains(&task.done_marker) => break,
            TurnOutcome::Reply(_) => {
                debug!(name = %task.name, turn = budget.used(), "reply without done marker");
            }
            TurnOutcome::ToolsExecuted => {}
            TurnOutcome::Cancelled => {
                runtime.observer.on_pretask_end(&task.name);
                return Err(AgentError::Cancelled);
            }
        }
    }

    info!(name = %task.name, turns = budget.used(), "pretask finished");
    runtime.observer.on_pretask_end(&task.name);
    Ok(())
}
