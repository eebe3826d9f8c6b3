//! Tool schema exposed to the model and shell-call argument parsing.

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

/// Name of the tool routed through the shell executor.
pub const SHELL_TOOL: &str = "run_shell";

/// Name of the tool that runs Python source through the shell executor.
pub const PYTHON_TOOL: &str = "python_runtime";

/// Tool definition in the chat-completions `tools` format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ToolFunction,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolFunction {
    pub name: String,
    pub description: String,
    /// JSON Schema for the arguments object.
    pub parameters: Value,
}

impl ToolSpec {
    pub fn function(name: &str, description: &str, parameters: Value) -> Self {
        Self {
            kind: "function".to_string(),
            function: ToolFunction {
                name: name.to_string(),
                description: description.to_string(),
                parameters,
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

/// `run_shell` taking only a `command`.
pub fn shell_tool() -> ToolSpec {
    ToolSpec::function(
        SHELL_TOOL,
        "Run a shell command and return its combined stdout and stderr.",
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line passed to sh -c"}
            },
            "required": ["command"]
        }),
    )
}

/// `run_shell` with display-only `description` and `safety` fields.
///
/// Neither field affects policy; they let a host show what the model claims
/// a command does before it runs.
pub fn shell_tool_detailed() -> ToolSpec {
    let classes: Vec<&str> = Safety::ALL.iter().map(|s| s.as_str()).collect();
    ToolSpec::function(
        SHELL_TOOL,
        "Run a shell command and return its combined stdout and stderr. \
         Describe what the command does and classify its safety.",
        json!({
            "type": "object",
            "properties": {
                "command": {"type": "string", "description": "Command line passed to sh -c"},
                "description": {"type": "string", "description": "One line on what the command does"},
                "safety": {
                    "type": "string",
                    "enum": classes,
                    "description": "Self-reported impact of the command"
                }
            },
            "required": ["command"]
        }),
    )
}

/// `python_runtime` taking Python source as `code`.
pub fn python_tool() -> ToolSpec {
    ToolSpec::function(
        PYTHON_TOOL,
        "Run Python 3 code and return its combined stdout and stderr.",
        json!({
            "type": "object",
            "properties": {
                "code": {"type": "string", "description": "Python source to execute"}
            },
            "required": ["code"]
        }),
    )
}

/// Shell command that runs `code` with `python3`.
///
/// The source travels base64-encoded inside a quoted heredoc, so no byte of
/// it is ever interpreted by the shell.
pub fn python_command(code: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(code);
    format!(
        "python3 - <<'PY'\n\
         import base64\n\
         code = base64.b64decode('{encoded}')\n\
         exec(compile(code, '<{PYTHON_TOOL}>', 'exec'))\n\
         PY\n"
    )
}

/// Model-reported impact class of a shell command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Safety {
    ReadOnly,
    Modify,
    Destructive,
    Network,
    Privileged,
}

impl Safety {
    pub const ALL: [Safety; 5] = [
        Safety::ReadOnly,
        Safety::Modify,
        Safety::Destructive,
        Safety::Network,
        Safety::Privileged,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Safety::ReadOnly => "read-only",
            Safety::Modify => "modify",
            Safety::Destructive => "destructive",
            Safety::Network => "network",
            Safety::Privileged => "privileged",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|s| s.as_str() == raw)
    }
}

/// Parsed `run_shell` arguments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellArgs {
    /// Opaque command text; empty when the model omitted it.
    pub command: String,
    pub description: Option<String>,
    pub safety: Option<Safety>,
}

impl ShellArgs {
    pub fn from_args(args: &Map<String, Value>) -> Self {
        let text = |key: &str| args.get(key).and_then(Value::as_str);
        Self {
            command: text("command").unwrap_or_default().to_string(),
            description: text("description").map(str::to_string),
            safety: text("safety").and_then(Safety::parse),
        }
    }
}

/// Whether a call needs the host's approval before it runs.
///
/// Reads never do. Shell and Python commands skip approval only while
/// confinement is active, since the profile and the fallback negotiation already gate them.
pub fn requires_confirmation(tool: &str, confinement_active: bool) -> bool {
    match tool {
        "read_file" => false,
        SHELL_TOOL | PYTHON_TOOL => !confinement_active,
        _ => true,
    }
}
