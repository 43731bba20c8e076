//! Tool trait — the abstraction over agent capabilities.
//!
//! Tools are what give the assistant the ability to act in the editor's
//! world: run shell commands, read/write files, list directories, search.
//! Every execution funnels through the same `ToolResult` contract: failures
//! are values (`success = false`), never panics crossing the boundary.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::error::ToolError;

/// The declared type of a tool parameter.
///
/// Array parameters carry an explicit item type — some model providers
/// reject array schemas without `items`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Number,
    Boolean,
    Array(ItemType),
    Object,
}

/// Item type for array-typed parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemType {
    String,
    Number,
    Boolean,
    Object,
}

impl ParamType {
    fn json_name(&self) -> &'static str {
        match self {
            ParamType::String => "string",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array(_) => "array",
            ParamType::Object => "object",
        }
    }
}

impl ItemType {
    fn json_name(&self) -> &'static str {
        match self {
            ItemType::String => "string",
            ItemType::Number => "number",
            ItemType::Boolean => "boolean",
            ItemType::Object => "object",
        }
    }
}

/// A statically declared tool parameter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolParameter {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: ParamType,
    pub description: String,
    pub required: bool,
}

impl ToolParameter {
    pub fn required(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, param_type: ParamType, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type,
            description: description.into(),
            required: false,
        }
    }
}

/// The universal result of a tool execution.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolResult {
    /// Whether the tool executed successfully
    pub success: bool,

    /// The output content
    pub output: String,

    /// Human-readable failure description when `success` is false
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    /// A successful result carrying output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: output.into(),
            error: None,
        }
    }

    /// A failed result carrying a human-readable error.
    pub fn fail(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: String::new(),
            error: Some(error.into()),
        }
    }
}

impl From<ToolError> for ToolResult {
    fn from(err: ToolError) -> Self {
        ToolResult::fail(err.to_string())
    }
}

/// A structured tool definition for native tool-calling APIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    /// The tool name
    pub name: String,

    /// Description of what the tool does
    pub description: String,

    /// JSON-schema-shaped parameter object
    pub parameters: serde_json::Value,

    /// Names of required parameters
    pub required: Vec<String>,
}

/// The core Tool trait.
///
/// Each tool (shell, file_read, file_write, list_files, ...) implements
/// this trait. Tools are registered in the ToolRegistry and made available
/// to the execution strategies.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "shell", "file_read").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the model).
    fn description(&self) -> &str;

    /// The declared parameters of this tool.
    fn parameters(&self) -> Vec<ToolParameter>;

    /// Execute the tool with the given arguments.
    async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError>;
}

/// A name-keyed registry of available tools.
///
/// The execution strategies use this to:
/// 1. Render tool definitions (prompt text or structured schemas)
/// 2. Look up and execute tools when the model requests them
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: BTreeMap::new(),
        }
    }

    /// Register a tool. Rejects duplicates by name.
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(ToolError::AlreadyRegistered(name));
        }
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Remove a tool by name. Returns whether it was present.
    pub fn unregister(&mut self, name: &str) -> bool {
        self.tools.remove(name).is_some()
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Whether a tool with this name is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// List all registered tool names, sorted.
    pub fn list(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Execute a named tool. The caller converts `Err` into a failed
    /// `ToolResult` — no tool error escapes a strategy as a panic.
    pub async fn execute(
        &self,
        name: &str,
        arguments: serde_json::Value,
    ) -> Result<ToolResult, ToolError> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        tool.execute(arguments).await
    }

    /// Render every tool as a prompt fragment for free-text strategies.
    ///
    /// One markdown-like block per tool: name, description, itemized
    /// parameters with a required/optional tag.
    pub fn describe_for_prompt(&self) -> String {
        let mut out = String::new();
        for tool in self.tools.values() {
            out.push_str(&format!("### {}\n{}\n", tool.name(), tool.description()));
            let params = tool.parameters();
            if params.is_empty() {
                out.push_str("Parameters: none\n");
            } else {
                out.push_str("Parameters:\n");
                for p in &params {
                    let tag = if p.required { "required" } else { "optional" };
                    out.push_str(&format!(
                        "- {} ({}, {}): {}\n",
                        p.name,
                        p.param_type.json_name(),
                        tag,
                        p.description
                    ));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Render every tool as a structured schema for native tool-calling.
    pub fn schema_definitions(&self) -> Vec<ToolSchema> {
        self.tools
            .values()
            .map(|tool| {
                let params = tool.parameters();
                let mut properties = serde_json::Map::new();
                let mut required = Vec::new();
                for p in &params {
                    let mut prop = serde_json::Map::new();
                    prop.insert("type".into(), p.param_type.json_name().into());
                    prop.insert("description".into(), p.description.clone().into());
                    if let ParamType::Array(item) = p.param_type {
                        prop.insert(
                            "items".into(),
                            serde_json::json!({ "type": item.json_name() }),
                        );
                    }
                    properties.insert(p.name.clone(), serde_json::Value::Object(prop));
                    if p.required {
                        required.push(p.name.clone());
                    }
                }
                ToolSchema {
                    name: tool.name().to_string(),
                    description: tool.description().to_string(),
                    parameters: serde_json::json!({
                        "type": "object",
                        "properties": properties,
                        "required": required,
                    }),
                    required,
                }
            })
            .collect()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// A simple test tool for unit tests.
    struct EchoTool;

    #[async_trait]
    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters(&self) -> Vec<ToolParameter> {
            vec![
                ToolParameter::required("text", ParamType::String, "Text to echo"),
                ToolParameter::optional(
                    "tags",
                    ParamType::Array(ItemType::String),
                    "Labels to attach",
                ),
            ]
        }
        async fn execute(&self, arguments: serde_json::Value) -> Result<ToolResult, ToolError> {
            let text = arguments["text"]
                .as_str()
                .ok_or_else(|| ToolError::InvalidArguments("missing 'text'".into()))?;
            Ok(ToolResult::ok(text))
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        assert!(registry.has("echo"));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("nonexistent").is_none());
        assert_eq!(registry.list(), vec!["echo".to_string()]);
    }

    #[test]
    fn registry_rejects_duplicate_name() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        let err = registry.register(Arc::new(EchoTool)).unwrap_err();
        assert!(matches!(err, ToolError::AlreadyRegistered(_)));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn registry_unregister() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();
        assert!(registry.unregister("echo"));
        assert!(!registry.unregister("echo"));
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn registry_execute_tool() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let result = registry
            .execute("echo", serde_json::json!({"text": "hello world"}))
            .await
            .unwrap();
        assert!(result.success);
        assert_eq!(result.output, "hello world");
    }

    #[tokio::test]
    async fn registry_execute_missing_tool() {
        let registry = ToolRegistry::new();
        let err = registry
            .execute("nonexistent", serde_json::json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn prompt_description_lists_parameters() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let prompt = registry.describe_for_prompt();
        assert!(prompt.contains("### echo"));
        assert!(prompt.contains("Echoes back the input"));
        assert!(prompt.contains("text (string, required)"));
        assert!(prompt.contains("tags (array, optional)"));
    }

    #[test]
    fn schema_arrays_carry_items() {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(EchoTool)).unwrap();

        let schemas = registry.schema_definitions();
        assert_eq!(schemas.len(), 1);
        let schema = &schemas[0];
        assert_eq!(schema.name, "echo");
        assert_eq!(schema.required, vec!["text".to_string()]);
        assert_eq!(
            schema.parameters["properties"]["tags"]["items"]["type"],
            "string"
        );
    }

    #[test]
    fn tool_result_from_error() {
        let result: ToolResult = ToolError::NotFound("frobnicate".into()).into();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("frobnicate"));
    }
}
