//! Errors surfaced to callers of the orchestrator.
//!
//! Tool failures and sandbox denials are not errors: they come back as
//! failed [`ToolResult`](crate::core::types::ToolResult)s the model can read.
//! A cancelled primary turn is not an error either; see
//! [`ChatOutcome::Cancelled`](crate::chat::ChatOutcome::Cancelled).

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AgentError {
    /// Invalid configuration, rejected at construction.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// The model round-trip failed. History appended so far is kept.
    #[error("model request failed")]
    Transport(#[source] anyhow::Error),

    #[error("max turns exceeded ({max_turns})")]
    MaxTurnsExceeded { max_turns: u32 },

    #[error("empty response from model")]
    EmptyResponse,

    /// A tool call was declined while a pre-task was running.
    #[error("tool execution cancelled by user")]
    Cancelled,

    #[error("pretask {name}")]
    PreTask {
        name: String,
        #[source]
        source: Box<AgentError>,
    },
}

impl AgentError {
    pub(crate) fn in_pretask(name: &str, source: AgentError) -> Self {
        AgentError::PreTask {
            name: name.to_string(),
            source: Box::new(source),
        }
    }
}
