//! Directory listing tool.

use async_trait::async_trait;

use tiller_core::error::ToolError;
use tiller_core::tool::{ParamType, Tool, ToolParameter, ToolResult};

use crate::guard;

pub struct ListFilesTool;

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn description(&self) -> &str {
        "List the entries of a directory, one per line. Directories carry a trailing slash."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::optional(
            "path",
            ParamType::String,
            "The directory to list (defaults to the current directory)",
        )]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"].as_str().unwrap_or(".");

        if let Err(reason) = guard::validate_path(path, &[]) {
            return Err(ToolError::PermissionDenied {
                tool_name: "list_files".into(),
                reason,
            });
        }

        let mut dir = match tokio::fs::read_dir(path).await {
            Ok(dir) => dir,
            Err(e) => return Ok(ToolResult::fail(format!("Failed to list directory: {e}"))),
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = dir.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry
                .file_type()
                .await
                .map(|t| t.is_dir())
                .unwrap_or(false);
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();

        Ok(ToolResult::ok(entries.join("\n")))
    }
}
