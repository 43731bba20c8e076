//! Native tool-calling loop.
//!
//! Drives the provider's structured tool-call API: ask for a completion
//! with the registry's schemas attached, execute every requested call in
//! order, feed the results back, and repeat until the model answers in
//! plain text or the iteration ceiling is hit.

use tracing::{debug, warn};

use tiller_core::client::{ChatMessage, ToolCallOptions};
use tiller_core::event::AgentEvent;

use crate::retry::RetryPolicy;
use crate::strategies::{
    execute_tool_with_retry, RunOutcome, StrategyContext, MAX_ITERATIONS,
};

pub struct NativeToolLoop {
    max_iterations: usize,
    model_retry: RetryPolicy,
    tool_retry: RetryPolicy,
}

impl NativeToolLoop {
    pub fn new() -> Self {
        Self {
            max_iterations: MAX_ITERATIONS,
            model_retry: RetryPolicy::model_call(),
            tool_retry: RetryPolicy::tool_call(),
        }
    }

    pub fn with_max_iterations(mut self, max: usize) -> Self {
        self.max_iterations = max;
        self
    }

    pub async fn run(&self, ctx: &StrategyContext, messages: Vec<ChatMessage>) -> RunOutcome {
        let mut messages = messages;
        let options_template = ToolCallOptions {
            tools: ctx.tools.schema_definitions(),
            tool_choice: None,
            temperature: None,
        };

        for iteration in 0..self.max_iterations {
            if ctx.cancel.is_cancelled() {
                return RunOutcome::cancelled();
            }

            let completion = match self
                .complete_with_retry(ctx, &messages, options_template.clone())
                .await
            {
                Ok(completion) => completion,
                Err(message) => {
                    ctx.emit(AgentEvent::Error {
                        message: message.clone(),
                    })
                    .await;
                    return RunOutcome::failed(message);
                }
            };

            if ctx.cancel.is_cancelled() {
                return RunOutcome::cancelled();
            }

            if completion.tool_calls.is_empty() {
                let answer = completion.content.unwrap_or_default();
                debug!(iteration, "native loop answered");
                ctx.emit(AgentEvent::Answer {
                    content: answer.clone(),
                })
                .await;
                return RunOutcome::answered(answer);
            }

            // Text accompanying tool calls is commentary, streamed whole.
            if let Some(text) = &completion.content {
                if !text.is_empty() {
                    ctx.emit(AgentEvent::Token {
                        content: text.clone(),
                    })
                    .await;
                }
            }

            messages.push(ChatMessage::assistant_with_calls(
                completion.content.clone().unwrap_or_default(),
                completion.tool_calls.clone(),
            ));

            for call in &completion.tool_calls {
                if ctx.cancel.is_cancelled() {
                    return RunOutcome::cancelled();
                }
                let params = call.parsed_arguments();
                ctx.emit(AgentEvent::Action {
                    tool: call.name.clone(),
                    params: params.clone(),
                })
                .await;

                let result =
                    execute_tool_with_retry(ctx, &call.name, params, self.tool_retry).await;
                ctx.emit(AgentEvent::Observation {
                    result: result.clone(),
                })
                .await;
                if !result.success {
                    // Permanent failure: surfaced as an error too, so the
                    // UI can flag it while the loop lets the model react.
                    ctx.emit(AgentEvent::Error {
                        message: result
                            .error
                            .clone()
                            .unwrap_or_else(|| "tool execution failed".into()),
                    })
                    .await;
                }

                let feedback = if result.success {
                    result.output.clone()
                } else {
                    format!(
                        "Error: {}",
                        result.error.clone().unwrap_or_else(|| "unknown".into())
                    )
                };
                messages.push(ChatMessage::tool_result(call.id.clone(), feedback));
            }
        }

        warn!(max = self.max_iterations, "native loop hit iteration ceiling");
        let message = format!(
            "stopped after {} iterations without a final answer",
            self.max_iterations
        );
        ctx.emit(AgentEvent::Error {
            message: message.clone(),
        })
        .await;
        RunOutcome::failed(message)
    }

    async fn complete_with_retry(
        &self,
        ctx: &StrategyContext,
        messages: &[ChatMessage],
        options: ToolCallOptions,
    ) -> Result<tiller_core::client::ToolCompletion, String> {
        let mut attempt = 0u32;
        loop {
            match ctx
                .client
                .complete_with_tools(messages.to_vec(), options.clone())
                .await
            {
                Ok(completion) => return Ok(completion),
                Err(err) if attempt < self.model_retry.max_retries => {
                    attempt += 1;
                    warn!(attempt, error = %err, "tool completion failed, retrying");
                    tokio::time::sleep(self.model_retry.delay(attempt)).await;
                }
                Err(err) => return Err(err.to_string()),
            }
        }
    }
}

impl Default for NativeToolLoop {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tokio::sync::mpsc;

    use tiller_core::cancel::CancellationToken;
    use tiller_core::error::ClientError;
    use tiller_core::tool::{ToolRegistry, ToolResult};

    use super::*;
    use crate::test_helpers::{collect_events, ScriptedClient, ScriptedResponse, ScriptedTool};

    fn context(
        client: ScriptedClient,
        tools: ToolRegistry,
    ) -> (StrategyContext, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(128);
        (
            StrategyContext {
                client: Arc::new(client),
                tools: Arc::new(tools),
                events: tx,
                cancel: CancellationToken::new(),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn executes_tool_then_answers() {
        let tool = ScriptedTool::ok("list_files", "main.rs\nlib.rs");
        let calls = tool.calls.clone();
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool)).unwrap();

        let client = ScriptedClient::new(vec![
            ScriptedResponse::tool_call("list_files", serde_json::json!({"path": "src"})),
            ScriptedResponse::Text("Two files: main.rs and lib.rs".into()),
        ]);
        let (ctx, rx) = context(client, registry);

        let outcome = NativeToolLoop::new()
            .run(&ctx, vec![ChatMessage::user("what files are in src?")])
            .await;
        drop(ctx);

        assert_eq!(
            outcome.answer.as_deref(),
            Some("Two files: main.rs and lib.rs")
        );
        assert_eq!(calls.lock().unwrap().len(), 1);
        assert_eq!(calls.lock().unwrap()[0]["path"], "src");

        let events = collect_events(rx).await;
        let types: Vec<&str> = events.iter().map(|e| e.event_type()).collect();
        assert_eq!(types, vec!["action", "observation", "answer"]);
    }

    #[tokio::test]
    async fn sequential_calls_feed_prior_observations() {
        // Call A, then call B; the request carrying B must already contain
        // A's observation.
        let tool = ScriptedTool::new(
            "shell",
            vec![Ok(ToolResult::ok("output-A")), Ok(ToolResult::ok("output-B"))],
        );
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool)).unwrap();

        let client = Arc::new(ScriptedClient::new(vec![
            ScriptedResponse::tool_call("shell", serde_json::json!({"command": "step-a"})),
            ScriptedResponse::tool_call("shell", serde_json::json!({"command": "step-b"})),
            ScriptedResponse::Text("both done".into()),
        ]));

        let (tx, rx) = mpsc::channel(128);
        let ctx = StrategyContext {
            client: client.clone(),
            tools: Arc::new(registry),
            events: tx,
            cancel: CancellationToken::new(),
        };

        let outcome = NativeToolLoop::new()
            .run(&ctx, vec![ChatMessage::user("run a then b")])
            .await;
        drop(ctx);
        let _ = collect_events(rx).await;

        assert_eq!(outcome.answer.as_deref(), Some("both done"));
        let recorded = client.calls.lock().unwrap();
        assert_eq!(recorded.len(), 3);
        // Second model call sees A's result.
        let second: Vec<String> = recorded[1].iter().map(|m| m.body.text()).collect();
        assert!(second.iter().any(|t| t.contains("output-A")));
        assert!(!second.iter().any(|t| t.contains("output-B")));
        // Third sees both.
        let third: Vec<String> = recorded[2].iter().map(|m| m.body.text()).collect();
        assert!(third.iter().any(|t| t.contains("output-A")));
        assert!(third.iter().any(|t| t.contains("output-B")));
    }

    #[tokio::test]
    async fn failed_tool_feeds_error_back_to_model() {
        let tool = ScriptedTool::new(
            "file_read",
            vec![Ok(ToolResult::fail("file not found: missing.rs"))],
        );
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool)).unwrap();

        let client = Arc::new(ScriptedClient::new(vec![
            ScriptedResponse::tool_call("file_read", serde_json::json!({"path": "missing.rs"})),
            ScriptedResponse::Text("That file does not exist.".into()),
        ]));

        let (tx, rx) = mpsc::channel(128);
        let ctx = StrategyContext {
            client: client.clone(),
            tools: Arc::new(registry),
            events: tx,
            cancel: CancellationToken::new(),
        };

        let outcome = NativeToolLoop::new()
            .run(&ctx, vec![ChatMessage::user("read missing.rs")])
            .await;
        drop(ctx);
        let events = collect_events(rx).await;

        // The failure is an observation plus an error, not a loop abort.
        assert!(events.iter().any(
            |e| matches!(e, AgentEvent::Observation { result } if !result.success)
        ));
        assert!(events.iter().any(
            |e| matches!(e, AgentEvent::Error { message } if message.contains("file not found"))
        ));
        assert_eq!(outcome.answer.as_deref(), Some("That file does not exist."));
        let recorded = client.calls.lock().unwrap();
        let second: Vec<String> = recorded[1].iter().map(|m| m.body.text()).collect();
        assert!(second.iter().any(|t| t.contains("file not found")));
    }

    #[tokio::test]
    async fn iteration_ceiling_surfaces_error() {
        let tool = ScriptedTool::ok("shell", "ok");
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(tool)).unwrap();

        // Model never answers, always calls the tool again.
        let script: Vec<ScriptedResponse> = (0..10)
            .map(|_| ScriptedResponse::tool_call("shell", serde_json::json!({"command": "spin"})))
            .collect();
        let (ctx, rx) = context(ScriptedClient::new(script), registry);

        let outcome = NativeToolLoop::new()
            .with_max_iterations(3)
            .run(&ctx, vec![ChatMessage::user("loop forever")])
            .await;
        drop(ctx);
        let events = collect_events(rx).await;

        assert!(!outcome.succeeded());
        assert!(events.iter().any(
            |e| matches!(e, AgentEvent::Error { message } if message.contains("3 iterations"))
        ));
    }

    #[tokio::test]
    async fn model_failure_retries_then_gives_up() {
        tokio::time::pause();
        let registry = ToolRegistry::new();
        let client = ScriptedClient::new(vec![
            ScriptedResponse::Fail(ClientError::Network("connection reset".into())),
            ScriptedResponse::Fail(ClientError::Network("connection reset".into())),
            ScriptedResponse::Fail(ClientError::Network("connection reset".into())),
        ]);
        let (ctx, rx) = context(client, registry);

        let handle = {
            let ctx = ctx.clone();
            tokio::spawn(async move {
                NativeToolLoop::new()
                    .run(&ctx, vec![ChatMessage::user("hi")])
                    .await
            })
        };
        drop(ctx);
        let outcome = handle.await.unwrap();
        let events = collect_events(rx).await;

        assert!(outcome.error.is_some());
        assert!(matches!(events.last(), Some(AgentEvent::Error { .. })));
    }
}
