//! File write tool — create or overwrite a file, with path validation.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use tiller_core::error::ToolError;
use tiller_core::tool::{ParamType, Tool, ToolParameter, ToolResult};

use crate::guard;

pub struct FileWriteTool {
    forbidden_paths: Vec<String>,
}

impl FileWriteTool {
    pub fn new() -> Self {
        Self {
            forbidden_paths: Vec::new(),
        }
    }

    pub fn with_forbidden(forbidden_paths: Vec<String>) -> Self {
        Self { forbidden_paths }
    }
}

impl Default for FileWriteTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FileWriteTool {
    fn name(&self) -> &str {
        "file_write"
    }

    fn description(&self) -> &str {
        "Write content to a file, creating it (and parent directories) if needed. Overwrites existing content."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![
            ToolParameter::required("path", ParamType::String, "The file path to write"),
            ToolParameter::required("content", ParamType::String, "The content to write"),
        ]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;
        let content = arguments["content"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'content' argument".into()))?;

        if let Err(reason) = guard::validate_path(path, &self.forbidden_paths) {
            return Err(ToolError::PermissionDenied {
                tool_name: "file_write".into(),
                reason,
            });
        }

        if let Some(parent) = Path::new(path).parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = tokio::fs::create_dir_all(parent).await {
                    return Ok(ToolResult::fail(format!(
                        "Failed to create parent directory: {e}"
                    )));
                }
            }
        }

        match tokio::fs::write(path, content).await {
            Ok(()) => {
                debug!(path = %path, bytes = content.len(), "wrote file");
                Ok(ToolResult::ok(format!(
                    "Wrote {} bytes to {path}",
                    content.len()
                )))
            }
            Err(e) => Ok(ToolResult::fail(format!("Failed to write file: {e}"))),
        }
    }
}
