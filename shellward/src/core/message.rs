//! Chat message model exchanged with the model client.
//!
//! The JSON shape follows the common chat-completions layout so a client can
//! serialize history directly. Content is either plain text or an ordered
//! list of typed parts; only `text` and `output_text` parts carry text the
//! orchestrator reads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// Message content: plain text or structured parts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Content {
    Text(String),
    Parts(Vec<ContentPart>),
}

/// One typed content part. Unknown fields are kept so history round-trips.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentPart {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ContentPart {
    pub fn text(kind: &str, text: &str) -> Self {
        Self {
            kind: kind.to_string(),
            text: Some(text.to_string()),
            extra: Map::new(),
        }
    }

    fn is_textual(&self) -> bool {
        self.kind == "text" || self.kind == "output_text"
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    pub name: String,
    /// Raw JSON argument text as produced by the model.
    pub arguments: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    #[serde(rename = "type", default = "function_kind")]
    pub kind: String,
    pub function: FunctionCall,
}

fn function_kind() -> String {
    "function".to_string()
}

impl ToolCall {
    pub fn function(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            kind: function_kind(),
            function: FunctionCall {
                name: name.to_string(),
                arguments: arguments.to_string(),
            },
        }
    }

    /// Decode the argument payload into a key/value map.
    ///
    /// Malformed or non-object payloads yield an empty map.
    pub fn decode_arguments(&self) -> Map<String, Value> {
        match serde_json::from_str::<Value>(&self.function.arguments) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                tracing::debug!(
                    call_id = %self.id,
                    tool = %self.function.name,
                    "tool arguments are not a JSON object; using empty map"
                );
                Map::new()
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Content>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn with_text(role: Role, text: &str) -> Self {
        Self {
            role,
            content: Some(Content::Text(text.to_string())),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn system(text: &str) -> Self {
        Self::with_text(Role::System, text)
    }

    pub fn user(text: &str) -> Self {
        Self::with_text(Role::User, text)
    }

    pub fn assistant(text: &str) -> Self {
        Self::with_text(Role::Assistant, text)
    }

    /// Assistant message requesting tool calls, with no text.
    pub fn assistant_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: None,
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool(call_id: &str, output: &str) -> Self {
        Self {
            tool_call_id: Some(call_id.to_string()),
            ..Self::with_text(Role::Tool, output)
        }
    }

    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }

    /// Extract the readable text of this message.
    ///
    /// Plain text is returned as is. For structured parts, `text` and
    /// `output_text` parts are concatenated in order and everything else is
    /// skipped. Missing content yields an empty string.
    pub fn text(&self) -> String {
        match &self.content {
            Some(Content::Text(text)) => text.clone(),
            Some(Content::Parts(parts)) => parts
                .iter()
                .filter(|part| part.is_textual())
                .filter_map(|part| part.text.as_deref())
                .collect(),
            None => String::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn text_of_plain_string_content() {
        assert_eq!(Message::assistant("hello").text(), "hello");
    }

    #[test]
    fn text_concatenates_only_textual_parts_in_order() {
        let msg = Message {
            role: Role::Assistant,
            content: Some(Content::Parts(vec![
                ContentPart::text("text", "a"),
                ContentPart::text("reasoning", "hidden"),
                ContentPart::text("output_text", "b"),
                ContentPart::text("image", "nope"),
                ContentPart::text("text", "c"),
            ])),
            tool_calls: Vec::new(),
            tool_call_id: None,
        };
        assert_eq!(msg.text(), "abc");
    }

    #[test]
    fn text_of_missing_content_is_empty() {
        let msg = Message::assistant_tool_calls(vec![ToolCall::function("1", "run_shell", "{}")]);
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn deserializes_structured_content_from_wire_json() {
        let raw = json!({
            "role": "assistant",
            "content": [
                {"type": "output_text", "text": "done", "annotations": []},
                {"type": "refusal", "refusal": "no"}
            ]
        });
        let msg: Message = serde_json::from_value(raw).expect("parse");
        assert_eq!(msg.text(), "done");
        assert!(!msg.has_tool_calls());
    }

    #[test]
    fn deserializes_tool_calls_without_type_field() {
        let raw = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "call_1", "function": {"name": "run_shell", "arguments": "{\"command\":\"ls\"}"}}
            ]
        });
        let msg: Message = serde_json::from_value(raw).expect("parse");
        assert_eq!(msg.tool_calls[0].kind, "function");
        assert_eq!(msg.text(), "");
    }

    #[test]
    fn malformed_arguments_decode_to_empty_map() {
        let call = ToolCall::function("1", "run_shell", "{not json");
        assert!(call.decode_arguments().is_empty());

        let call = ToolCall::function("2", "run_shell", "[1,2]");
        assert!(call.decode_arguments().is_empty());
    }

    #[test]
    fn tool_message_serializes_call_id() {
        let msg = Message::tool("call_9", "out");
        let value = serde_json::to_value(&msg).expect("serialize");
        assert_eq!(
            value,
            json!({"role": "tool", "content": "out", "tool_call_id": "call_9"})
        );
    }
}
