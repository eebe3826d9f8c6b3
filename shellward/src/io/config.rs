//! Agent configuration, stored as TOML (`shellward.toml` by default).

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::AgentError;
use crate::io::sandbox::confinement_available;

pub const DEFAULT_CONFIG_FILE: &str = "shellward.toml";
pub const DEFAULT_MAX_TURNS: u32 = 10;
pub const DEFAULT_MAX_PRETASK_TURNS: u32 = 10;
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;
pub const DEFAULT_PRETASK_INPUT: &str = "Begin";

/// Top-level agent configuration (TOML).
///
/// Missing fields default to values that work out of the box: confinement
/// wherever the platform supports it and a turn cap of ten.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AgentConfig {
    /// Seeds the primary conversation when set.
    pub system_prompt: Option<String>,

    /// Model round-trips allowed per `chat` call.
    pub max_turns: u32,

    /// Model round-trips allowed per pre-task.
    pub max_pretask_turns: u32,

    /// Truncate captured shell output beyond this many bytes.
    pub output_limit_bytes: usize,

    pub sandbox: SandboxConfig,

    /// Side conversations run before the first `chat` turn.
    pub pretasks: Vec<PreTaskConfig>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: None,
            max_turns: DEFAULT_MAX_TURNS,
            max_pretask_turns: DEFAULT_MAX_PRETASK_TURNS,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
            sandbox: SandboxConfig::default(),
            pretasks: Vec::new(),
        }
    }
}

impl AgentConfig {
    pub fn validate(&self) -> Result<(), AgentError> {
        if self.max_turns == 0 {
            return Err(AgentError::Configuration("max_turns must be > 0".into()));
        }
        if self.max_pretask_turns == 0 {
            return Err(AgentError::Configuration(
                "max_pretask_turns must be > 0".into(),
            ));
        }
        if self.output_limit_bytes == 0 {
            return Err(AgentError::Configuration(
                "output_limit_bytes must be > 0".into(),
            ));
        }
        for (idx, task) in self.pretasks.iter().enumerate() {
            if task.name.trim().is_empty() {
                return Err(AgentError::Configuration(format!(
                    "pretasks[{idx}].name must be non-empty"
                )));
            }
            if task.done_marker.is_empty() {
                return Err(AgentError::Configuration(format!(
                    "pretasks[{idx}] ({}): done_marker must be non-empty",
                    task.name
                )));
            }
        }
        Ok(())
    }
}

/// Confinement allow-list. Paths are directory subtrees.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    /// Run commands confined when the platform supports it.
    pub enabled: bool,
    pub allow_network: bool,
    pub read_paths: Vec<String>,
    pub write_paths: Vec<String>,
    pub exec_paths: Vec<String>,
    /// Offer unconfined re-execution after a denial.
    pub fallback_outside_sandbox: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let mut write_paths = Vec::new();
        if let Ok(cwd) = std::env::current_dir() {
            write_paths.push(cwd.display().to_string());
        }
        write_paths.push(std::env::temp_dir().display().to_string());
        write_paths.push("/private/tmp".to_string());
        write_paths.push("/private/var/folders".to_string());

        Self {
            enabled: confinement_available(),
            allow_network: false,
            read_paths: vec!["/".to_string()],
            write_paths,
            exec_paths: [
                "/bin",
                "/usr/bin",
                "/usr/local/bin",
                "/opt/homebrew/bin",
                "/usr/sbin",
                "/sbin",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            fallback_outside_sandbox: true,
        }
    }
}

/// One pre-task as written in configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PreTaskConfig {
    pub name: String,
    pub system_prompt: String,
    #[serde(default)]
    pub input: String,
    pub done_marker: String,
}

impl PreTaskConfig {
    /// First user message; `"Begin"` when no input is configured.
    pub fn initial_input(&self) -> &str {
        if self.input.is_empty() {
            DEFAULT_PRETASK_INPUT
        } else {
            &self.input
        }
    }
}

/// Load config from a TOML file.
///
/// If the file is missing, returns `AgentConfig::default()`.
pub fn load_config(path: &Path) -> Result<AgentConfig> {
    if !path.exists() {
        let cfg = AgentConfig::default();
        cfg.validate()?;
        return Ok(cfg);
    }
    let contents = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let cfg: AgentConfig =
        toml::from_str(&contents).with_context(|| format!("parse {}", path.display()))?;
    cfg.validate()?;
    Ok(cfg)
}

/// Atomically write config to disk (temp file + rename).
pub fn write_config(path: &Path, cfg: &AgentConfig) -> Result<()> {
    cfg.validate()?;
    let mut buf = toml::to_string_pretty(cfg).context("serialize config toml")?;
    buf.push('\n');
    write_atomic(path, &buf)
}

fn write_atomic(path: &Path, contents: &str) -> Result<()> {
    let parent = path
        .parent()
        .with_context(|| format!("config path missing parent {}", path.display()))?;
    fs::create_dir_all(parent).with_context(|| format!("create directory {}", parent.display()))?;
    let tmp_path = path.with_extension("toml.tmp");
    fs::write(&tmp_path, contents)
        .with_context(|| format!("write temp config {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path).with_context(|| format!("replace config {}", path.display()))?;
    Ok(())
}
