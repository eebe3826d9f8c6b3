//! Append-only conversation history with suffix rollback.

use crate::core::message::Message;

/// Ordered message history owned by a single orchestrator.
///
/// The only mutations are appending (one message or a whole batch) and
/// rolling back to an earlier [`Checkpoint`], which removes a contiguous
/// suffix.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Conversation {
    messages: Vec<Message>,
}

/// Opaque marker of a history length to roll back to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a history with a system prompt, if one is given.
    pub fn seeded(system_prompt: Option<&str>) -> Self {
        let mut conversation = Self::new();
        if let Some(prompt) = system_prompt {
            conversation.push(Message::system(prompt));
        }
        conversation
    }

    pub fn push(&mut self, message: Message) {
        self.messages.push(message);
    }

    /// Append a batch of messages in order.
    pub fn append_batch(&mut self, batch: Vec<Message>) {
        self.messages.extend(batch);
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.messages.len())
    }

    /// Drop every message appended after `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.messages.truncate(checkpoint.0);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}
