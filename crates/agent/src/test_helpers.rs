//! Scripted doubles for strategy and orchestrator tests.
//!
//! `ScriptedClient` replays a fixed sequence of model responses;
//! `ScriptedTool` replays tool results while recording the arguments it
//! was called with. Tests assert on the event stream and the recorded
//! calls instead of on wire traffic.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::mpsc;

use tiller_core::client::{
    ChatMessage, ChunkStream, ModelClient, ToolCallOptions, ToolCallRequest, ToolCompletion,
};
use tiller_core::error::{ClientError, ToolError};
use tiller_core::tool::{Tool, ToolParameter, ToolResult};

/// One scripted model response.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Plain text completion, streamed word by word.
    Text(String),
    /// Native tool-call completion with optional accompanying text.
    ToolCalls {
        text: Option<String>,
        calls: Vec<ToolCallRequest>,
    },
    /// A failed call.
    Fail(ClientError),
}

impl ScriptedResponse {
    pub fn tool_call(name: &str, arguments: Value) -> Self {
        Self::ToolCalls {
            text: None,
            calls: vec![ToolCallRequest {
                id: format!("call_{name}"),
                name: name.to_string(),
                arguments: arguments.to_string(),
            }],
        }
    }
}

/// A `ModelClient` that replays scripted responses in order and records
/// every message list it was handed.
pub struct ScriptedClient {
    script: Mutex<VecDeque<ScriptedResponse>>,
    pub calls: Mutex<Vec<Vec<ChatMessage>>>,
    native: bool,
    latency: Option<Duration>,
}

impl ScriptedClient {
    pub fn new(script: Vec<ScriptedResponse>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
            native: true,
            latency: None,
        }
    }

    /// Report no native tool support, forcing the ReAct path.
    pub fn without_native_tools(mut self) -> Self {
        self.native = false;
        self
    }

    /// Sleep before answering each call.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    fn next_response(&self, messages: &[ChatMessage]) -> ScriptedResponse {
        self.calls.lock().unwrap().push(messages.to_vec());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| ScriptedResponse::Text("script exhausted".into()))
    }
}

#[async_trait]
impl ModelClient for ScriptedClient {
    fn name(&self) -> &str {
        "scripted"
    }

    fn supports_native_tools(&self) -> bool {
        self.native
    }

    async fn stream_complete(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<ChunkStream, ClientError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let response = self.next_response(&messages);
        let (tx, rx) = mpsc::channel(32);
        tokio::spawn(async move {
            match response {
                ScriptedResponse::Text(text) => {
                    let mut rest = text.as_str();
                    while !rest.is_empty() {
                        let split = rest
                            .char_indices()
                            .filter(|(_, c)| *c == ' ')
                            .map(|(i, _)| i + 1)
                            .find(|&i| i > 0)
                            .unwrap_or(rest.len());
                        let (chunk, tail) = rest.split_at(split);
                        if tx.send(Ok(chunk.to_string())).await.is_err() {
                            return;
                        }
                        rest = tail;
                    }
                }
                ScriptedResponse::ToolCalls { text, .. } => {
                    // Streaming endpoint carries text only.
                    if let Some(text) = text {
                        let _ = tx.send(Ok(text)).await;
                    }
                }
                ScriptedResponse::Fail(err) => {
                    let _ = tx.send(Err(err)).await;
                }
            }
        });
        Ok(rx)
    }

    async fn complete_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        _options: ToolCallOptions,
    ) -> Result<ToolCompletion, ClientError> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        match self.next_response(&messages) {
            ScriptedResponse::Text(text) => Ok(ToolCompletion {
                content: Some(text),
                tool_calls: Vec::new(),
                finish_reason: Some("stop".into()),
            }),
            ScriptedResponse::ToolCalls { text, calls } => Ok(ToolCompletion {
                content: text,
                tool_calls: calls,
                finish_reason: Some("tool_calls".into()),
            }),
            ScriptedResponse::Fail(err) => Err(err),
        }
    }
}

/// A `Tool` that replays scripted results and records call arguments.
pub struct ScriptedTool {
    name: String,
    results: Mutex<VecDeque<Result<ToolResult, ToolError>>>,
    pub calls: Arc<Mutex<Vec<Value>>>,
}

impl ScriptedTool {
    pub fn new(name: &str, results: Vec<Result<ToolResult, ToolError>>) -> Self {
        Self {
            name: name.to_string(),
            results: Mutex::new(results.into()),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// A tool that always succeeds with the same output.
    pub fn ok(name: &str, output: &str) -> Self {
        Self {
            name: name.to_string(),
            results: Mutex::new(
                std::iter::repeat_with(|| Ok(ToolResult::ok(output)))
                    .take(16)
                    .collect(),
            ),
            calls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl Tool for ScriptedTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "scripted test tool"
    }

    fn parameters(&self) -> Vec<ToolParameter> {
        vec![ToolParameter::optional(
            "input",
            tiller_core::tool::ParamType::String,
            "free-form input",
        )]
    }

    async fn execute(&self, args: Value) -> Result<ToolResult, ToolError> {
        self.calls.lock().unwrap().push(args);
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(ToolResult::ok("scripted default")))
    }
}

/// Drain every event from a receiver into a Vec.
pub async fn collect_events<T>(mut rx: mpsc::Receiver<T>) -> Vec<T> {
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}
