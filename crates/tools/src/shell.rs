//! Shell tool — execute system commands.
//!
//! Supports command allowlisting, host-platform command translation, and a
//! timeout.

use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use tiller_core::error::ToolError;
use tiller_core::tool::{ParamType, Tool, ToolParameter, ToolResult};

use crate::command_shim::{platform_default, CommandTranslator};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Execute shell commands with safety constraints.
pub struct ShellTool {
    /// If non-empty, only these base commands are allowed.
    allowed_commands: Vec<String>,
    translator: Box<dyn CommandTranslator>,
    timeout: Duration,
}

impl ShellTool {
    pub fn new(allowed_commands: Vec<String>) -> Self {
        Self {
            allowed_commands,
            translator: platform_default(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_translator(mut self, translator: Box<dyn CommandTranslator>) -> Self {
        self.translator = translator;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        if self.allowed_commands.is_empty() {
            return true; // No allowlist = all commands allowed
        }
        let base_cmd = command.split_whitespace().next().unwrap_or("").trim();
        self.allowed_commands.iter().any(|a| a == base_cmd)
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn name(&self) -> &str {
        "shell"
    }

    fn description(&self) -> &str {
        "Execute a shell command and return stdout/stderr. Use this for running programs, checking files, git operations, etc."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "command",
            ParamType::String,
            "The shell command to execute",
        )]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let raw = arguments["command"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'command' argument".into()))?;

        let command = self.translator.translate(raw);
        if !self.is_command_allowed(&command) {
            return Err(ToolError::PermissionDenied {
                tool_name: "shell".into(),
                reason: format!(
                    "Command '{}' not in allowlist",
                    command.split_whitespace().next().unwrap_or("")
                ),
            });
        }

        debug!(command = %command, "executing shell command");

        let run = if cfg!(target_os = "windows") {
            Command::new("cmd").args(["/C", &command]).output()
        } else {
            Command::new("sh").args(["-c", &command]).output()
        };

        let output = match tokio::time::timeout(self.timeout, run).await {
            Ok(result) => result.map_err(|e| ToolError::ExecutionFailed {
                tool_name: "shell".into(),
                reason: e.to_string(),
            })?,
            Err(_) => {
                return Err(ToolError::Timeout {
                    tool_name: "shell".into(),
                    timeout_secs: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if output.status.success() {
            let text = if stderr.is_empty() {
                stdout
            } else {
                format!("{stdout}\n[stderr]: {stderr}")
            };
            Ok(ToolResult::ok(text.trim()))
        } else {
            let code = output.status.code().unwrap_or(-1);
            warn!(command = %command, exit_code = code, "command failed");
            Ok(ToolResult::fail(
                format!("[exit code: {code}]\n{stdout}\n{stderr}").trim(),
            ))
        }
    }
}
