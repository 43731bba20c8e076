//! File read tool — read file contents with path validation.

use async_trait::async_trait;

use tiller_core::error::ToolError;
use tiller_core::tool::{ParamType, Tool, ToolParameter, ToolResult};

use crate::guard;

pub struct FileReadTool {
    /// Forbidden path prefixes beyond the built-in protected set.
    forbidden_paths: Vec<String>,
}

impl FileReadTool {
    pub fn new() -> Self {
        Self {
            forbidden_paths: Vec::new(),
        }
    }

    pub fn with_forbidden(forbidden_paths: Vec<String>) -> Self {
        Self { forbidden_paths }
    }
}

impl Default for FileReadTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for FileReadTool {
    fn name(&self) -> &str {
        "file_read"
    }

    fn description(&self) -> &str {
        "Read the contents of a file at the given path."
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::required(
            "path",
            ParamType::String,
            "The file path to read",
        )]
    }

    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
        let path = arguments["path"]
            .as_str()
            .ok_or_else(|| ToolError::InvalidArguments("Missing 'path' argument".into()))?;

        if let Err(reason) = guard::validate_path(path, &self.forbidden_paths) {
            return Err(ToolError::PermissionDenied {
                tool_name: "file_read".into(),
                reason,
            });
        }

        match tokio::fs::read_to_string(path).await {
            Ok(content) => Ok(ToolResult::ok(content)),
            Err(e) => Ok(ToolResult::fail(format!("Failed to read file: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn read_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("test.txt");
        let mut f = std::fs::File::create(&file_path).unwrap();
        writeln!(f, "Hello, world!").unwrap();

        let tool = FileReadTool::new();
        let result = tool
            .execute(serde_json::json!({"path": file_path.to_str().unwrap()}))
            .await
            .unwrap();

        assert!(result.success);
        assert!(result.output.contains("Hello, world!"));
    }

    #[tokio::test]
    async fn read_nonexistent_file() {
        let tool = FileReadTool::new();
        let result = tool
            .execute(serde_json::json!({"path": "/tmp/tiller_test_nonexistent_12345.txt"}))
            .await
            .unwrap();

        assert!(!result.success);
        assert!(result.error.unwrap().contains("Failed to read file"));
    }

    #[tokio::test]
    async fn missing_path_argument() {
        let tool = FileReadTool::new();
        let result = tool.execute(serde_json::json!({})).await;
        assert!(matches!(result, Err(ToolError::InvalidArguments(_))));
    }

    #[tokio::test]
    async fn traversal_blocked() {
        let tool = FileReadTool::new();
        let result = tool
            .execute(serde_json::json!({"path": "../../../etc/passwd"}))
            .await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }

    #[tokio::test]
    async fn protected_path_blocked() {
        let tool = FileReadTool::new();
        let result = tool.execute(serde_json::json!({"path": "/etc/shadow"})).await;
        assert!(matches!(result, Err(ToolError::PermissionDenied { .. })));
    }
}
