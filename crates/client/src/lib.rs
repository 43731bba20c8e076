//! OpenAI-compatible model client.
//!
//! Works with OpenAI, OpenRouter, DeepSeek, Ollama, vLLM, and any other
//! endpoint exposing `/v1/chat/completions`. Implements both halves of the
//! `ModelClient` contract: streaming text completions over SSE, and
//! non-streaming tool-calling completions.

use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace, warn};

use tiller_core::client::{
    ChatMessage, ChatRole, ChunkStream, ContentPart, MessageBody, ModelClient, ToolCallOptions,
    ToolCallRequest, ToolCompletion,
};
use tiller_core::error::ClientError;
use tiller_core::tool::ToolSchema;

/// A client for OpenAI-compatible chat completion endpoints.
pub struct OpenAiClient {
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
    max_tokens: u32,
    native_tools: bool,
    http: reqwest::Client,
}

impl OpenAiClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(|e| ClientError::NotConfigured(format!("HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature: 0.7,
            max_tokens: 4096,
            native_tools: true,
            http,
        })
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Disable native tool calling; the orchestrator will fall back to the
    /// free-text reasoning strategy.
    pub fn without_native_tools(mut self) -> Self {
        self.native_tools = false;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn request_body(&self, messages: &[ChatMessage], stream: bool) -> serde_json::Value {
        serde_json::json!({
            "model": self.model,
            "messages": to_api_messages(messages),
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
            "stream": stream,
        })
    }

    async fn post_completions(
        &self,
        body: &serde_json::Value,
        sse: bool,
    ) -> Result<reqwest::Response, ClientError> {
        let url = format!("{}/chat/completions", self.base_url);
        let mut request = self
            .http
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json");
        if sse {
            request = request.header("Accept", "text/event-stream");
        }

        let response = request.json(body).send().await.map_err(map_reqwest_error)?;
        check_status(response).await
    }
}

/// Map transport-level failures onto the client error taxonomy.
fn map_reqwest_error(e: reqwest::Error) -> ClientError {
    if e.is_timeout() {
        ClientError::Timeout(e.to_string())
    } else {
        ClientError::Network(e.to_string())
    }
}

/// Map HTTP status codes onto the client error taxonomy.
async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = response.status().as_u16();

    if status == 429 {
        let retry_after_secs = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or(5);
        return Err(ClientError::RateLimited { retry_after_secs });
    }

    if status == 401 || status == 403 {
        return Err(ClientError::AuthenticationFailed(
            "Invalid API key or insufficient permissions".into(),
        ));
    }

    if status != 200 {
        let message = response.text().await.unwrap_or_default();
        warn!(status, body = %message, "model endpoint returned error");
        return Err(ClientError::ApiError {
            status_code: status,
            message,
        });
    }

    Ok(response)
}

#[async_trait]
impl ModelClient for OpenAiClient {
    fn name(&self) -> &str {
        "openai"
    }

    fn supports_native_tools(&self) -> bool {
        self.native_tools
    }

    async fn stream_complete(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<ChunkStream, ClientError> {
        let body = self.request_body(&messages, true);
        debug!(model = %self.model, messages = messages.len(), "streaming completion request");

        let response = self.post_completions(&body, true).await?;

        let (tx, rx) = tokio::sync::mpsc::channel(64);
        tokio::spawn(async move {
            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let bytes = match chunk_result {
                    Ok(b) => b,
                    Err(e) => {
                        let _ = tx
                            .send(Err(ClientError::StreamInterrupted(e.to_string())))
                            .await;
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&bytes));

                // Process complete lines; a partial line stays buffered.
                while let Some(line_end) = buffer.find('\n') {
                    let line = buffer[..line_end].trim_end_matches('\r').to_string();
                    buffer = buffer[line_end + 1..].to_string();

                    if line.is_empty() || line.starts_with(':') {
                        continue;
                    }

                    let Some(data) = line.strip_prefix("data: ") else {
                        continue;
                    };
                    let data = data.trim();

                    if data == "[DONE]" {
                        return;
                    }

                    match serde_json::from_str::<StreamResponse>(data) {
                        Ok(resp) => {
                            let Some(choice) = resp.choices.first() else {
                                continue;
                            };
                            if let Some(content) = &choice.delta.content {
                                if !content.is_empty()
                                    && tx.send(Ok(content.clone())).await.is_err()
                                {
                                    return; // receiver dropped
                                }
                            }
                            if choice.finish_reason.is_some() {
                                return;
                            }
                        }
                        Err(e) => {
                            trace!(data = %data, error = %e, "ignoring unparseable SSE chunk");
                        }
                    }
                }
            }
        });

        Ok(rx)
    }

    async fn complete_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        options: ToolCallOptions,
    ) -> Result<ToolCompletion, ClientError> {
        let mut body = self.request_body(&messages, false);

        if let Some(temperature) = options.temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if !options.tools.is_empty() {
            body["tools"] = serde_json::json!(to_api_tools(&options.tools));
            body["tool_choice"] =
                serde_json::json!(options.tool_choice.as_deref().unwrap_or("auto"));
        }

        debug!(
            model = %self.model,
            messages = messages.len(),
            tools = options.tools.len(),
            "tool-calling completion request"
        );

        let response = self.post_completions(&body, false).await?;

        let api_response: ApiResponse = response.json().await.map_err(|e| ClientError::ApiError {
            status_code: 200,
            message: format!("Failed to parse response: {e}"),
        })?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ClientError::ApiError {
                status_code: 200,
                message: "No choices in response".into(),
            })?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|tc| ToolCallRequest {
                id: tc.id,
                name: tc.function.name,
                arguments: tc.function.arguments,
            })
            .collect();

        Ok(ToolCompletion {
            content: choice.message.content,
            tool_calls,
            finish_reason: choice.finish_reason,
        })
    }
}

/// Convert wire-format chat messages to the OpenAI request shape.
fn to_api_messages(messages: &[ChatMessage]) -> Vec<ApiMessage> {
    messages
        .iter()
        .map(|m| ApiMessage {
            role: match m.role {
                ChatRole::System => "system".into(),
                ChatRole::User => "user".into(),
                ChatRole::Assistant => "assistant".into(),
                ChatRole::Tool => "tool".into(),
            },
            content: to_api_content(&m.body),
            tool_calls: if m.tool_calls.is_empty() {
                None
            } else {
                Some(
                    m.tool_calls
                        .iter()
                        .map(|tc| ApiToolCall {
                            id: tc.id.clone(),
                            r#type: "function".into(),
                            function: ApiFunction {
                                name: tc.name.clone(),
                                arguments: tc.arguments.clone(),
                            },
                        })
                        .collect(),
                )
            },
            tool_call_id: m.tool_call_id.clone(),
        })
        .collect()
}

/// Plain text serializes as a string; image-bearing bodies serialize as the
/// multi-part vision format.
fn to_api_content(body: &MessageBody) -> serde_json::Value {
    match body {
        MessageBody::Text(text) => serde_json::json!(text),
        MessageBody::Parts(parts) => {
            let api_parts: Vec<serde_json::Value> = parts
                .iter()
                .map(|p| match p {
                    ContentPart::Text { text } => {
                        serde_json::json!({"type": "text", "text": text})
                    }
                    ContentPart::Image { mime_type, data } => serde_json::json!({
                        "type": "image_url",
                        "image_url": {"url": format!("data:{mime_type};base64,{data}")},
                    }),
                })
                .collect();
            serde_json::json!(api_parts)
        }
    }
}

fn to_api_tools(tools: &[ToolSchema]) -> Vec<ApiToolDefinition> {
    tools
        .iter()
        .map(|t| ApiToolDefinition {
            r#type: "function".into(),
            function: ApiToolFunction {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: t.parameters.clone(),
            },
        })
        .collect()
}

// --- OpenAI API types (internal) ---

#[derive(Debug, Serialize)]
struct ApiMessage {
    role: String,
    content: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<ApiToolCall>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiToolCall {
    id: String,
    r#type: String,
    function: ApiFunction,
}

#[derive(Debug, Serialize, Deserialize)]
struct ApiFunction {
    name: String,
    arguments: String,
}

#[derive(Debug, Serialize)]
struct ApiToolDefinition {
    r#type: String,
    function: ApiToolFunction,
}

#[derive(Debug, Serialize)]
struct ApiToolFunction {
    name: String,
    description: String,
    parameters: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    choices: Vec<ApiChoice>,
}

#[derive(Debug, Deserialize)]
struct ApiChoice {
    message: ApiResponseMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ApiToolCall>>,
}

// --- Streaming SSE types ---

#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_trimmed() {
        let client = OpenAiClient::new("https://api.example.com/v1/", "sk-test", "gpt-4o").unwrap();
        assert_eq!(client.base_url, "https://api.example.com/v1");
    }

    #[test]
    fn native_tools_opt_out() {
        let client = OpenAiClient::new("https://api.example.com/v1", "sk-test", "gpt-4o")
            .unwrap()
            .without_native_tools();
        assert!(!client.supports_native_tools());
    }

    #[test]
    fn message_conversion_roles() {
        let messages = vec![
            ChatMessage::system("You are helpful"),
            ChatMessage::user("Hello"),
            ChatMessage::assistant("Hi there"),
            ChatMessage::tool_result("call_1", "output"),
        ];
        let api = to_api_messages(&messages);
        assert_eq!(api.len(), 4);
        assert_eq!(api[0].role, "system");
        assert_eq!(api[1].role, "user");
        assert_eq!(api[2].role, "assistant");
        assert_eq!(api[3].role, "tool");
        assert_eq!(api[3].tool_call_id.as_deref(), Some("call_1"));
    }

    #[test]
    fn message_conversion_with_tool_calls() {
        let msg = ChatMessage::assistant_with_calls(
            "",
            vec![ToolCallRequest {
                id: "call_1".into(),
                name: "shell".into(),
                arguments: r#"{"command":"ls"}"#.into(),
            }],
        );
        let api = to_api_messages(&[msg]);
        let calls = api[0].tool_calls.as_ref().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].function.name, "shell");
        assert_eq!(calls[0].r#type, "function");
    }

    #[test]
    fn image_bodies_become_vision_parts() {
        let msg = ChatMessage::user_with_images(
            "what is this?",
            &[tiller_core::turn::ImageAttachment {
                mime_type: "image/png".into(),
                data: "aGk=".into(),
            }],
        );
        let api = to_api_messages(&[msg]);
        let parts = api[0].content.as_array().unwrap();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0]["type"], "image_url");
        assert_eq!(
            parts[0]["image_url"]["url"],
            "data:image/png;base64,aGk="
        );
        assert_eq!(parts[1]["type"], "text");
    }

    #[test]
    fn tool_schema_conversion() {
        let tools = vec![ToolSchema {
            name: "shell".into(),
            description: "Run a shell command".into(),
            parameters: serde_json::json!({"type": "object", "properties": {}}),
            required: vec![],
        }];
        let api = to_api_tools(&tools);
        assert_eq!(api.len(), 1);
        assert_eq!(api[0].r#type, "function");
        assert_eq!(api[0].function.name, "shell");
    }

    // --- SSE parsing tests ---

    #[test]
    fn parse_stream_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Hello"},"finish_reason":null}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].delta.content.as_deref(), Some("Hello"));
        assert!(parsed.choices[0].finish_reason.is_none());
    }

    #[test]
    fn parse_stream_finish_chunk() {
        let data = r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#;
        let parsed: StreamResponse = serde_json::from_str(data).unwrap();
        assert_eq!(parsed.choices[0].finish_reason.as_deref(), Some("stop"));
        assert!(parsed.choices[0].delta.content.is_none());
    }

    #[test]
    fn parse_tool_call_response() {
        let data = r#"{
            "choices": [{
                "message": {
                    "content": null,
                    "tool_calls": [{
                        "id": "call_abc",
                        "type": "function",
                        "function": {"name": "file_read", "arguments": "{\"path\":\"src/main.rs\"}"}
                    }]
                },
                "finish_reason": "tool_calls"
            }]
        }"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        let choice = &parsed.choices[0];
        assert!(choice.message.content.is_none());
        let tc = &choice.message.tool_calls.as_ref().unwrap()[0];
        assert_eq!(tc.function.name, "file_read");
        assert_eq!(choice.finish_reason.as_deref(), Some("tool_calls"));
    }

    #[test]
    fn parse_text_response() {
        let data = r#"{"choices":[{"message":{"content":"The answer is 4."},"finish_reason":"stop"}]}"#;
        let parsed: ApiResponse = serde_json::from_str(data).unwrap();
        assert_eq!(
            parsed.choices[0].message.content.as_deref(),
            Some("The answer is 4.")
        );
    }
}
