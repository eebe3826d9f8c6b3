//! History invariants checked over a whole message list.

use std::collections::HashSet;

use crate::core::message::{Message, Role};

/// Check tool-message pairing across a history:
/// - every tool message carries a `tool_call_id`
/// - it follows (through a run of tool messages only) an assistant message
/// - that assistant message requested a call with the same id
/// - no call id is answered twice
pub fn validate_tool_pairing(messages: &[Message]) -> Vec<String> {
    let mut errors = Vec::new();
    let mut open_calls: Option<(usize, HashSet<&str>)> = None;
    let mut answered: HashSet<&str> = HashSet::new();

    for (idx, message) in messages.iter().enumerate() {
        match message.role {
            Role::Assistant => {
                let ids = message
                    .tool_calls
                    .iter()
                    .map(|call| call.id.as_str())
                    .collect();
                open_calls = Some((idx, ids));
                answered.clear();
            }
            Role::Tool => {
                let Some(call_id) = message.tool_call_id.as_deref() else {
                    errors.push(format!("message {idx}: tool message without tool_call_id"));
                    continue;
                };
                match &open_calls {
                    None => errors.push(format!(
                        "message {idx}: tool result '{call_id}' has no preceding assistant message"
                    )),
                    Some((assistant_idx, ids)) if !ids.contains(call_id) => {
                        errors.push(format!(
                            "message {idx}: tool result '{call_id}' does not match a call in message {assistant_idx}"
                        ));
                    }
                    Some(_) => {
                        if !answered.insert(call_id) {
                            errors.push(format!(
                                "message {idx}: duplicate tool result for '{call_id}'"
                            ));
                        }
                    }
                }
            }
            Role::System | Role::User => {
                open_calls = None;
                answered.clear();
            }
        }
    }

    errors
}
