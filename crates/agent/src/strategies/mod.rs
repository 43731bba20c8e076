//! Execution strategies.
//!
//! A strategy takes an exported message window and drives it to an answer,
//! emitting `AgentEvent`s along the way. Strategies never touch the
//! conversation state; the orchestrator's processing task folds their
//! events back into turns. Four strategies exist:
//!
//! - [`direct::DirectChat`] — one streamed completion, no tools
//! - [`native::NativeToolLoop`] — provider-native tool calling
//! - [`react::ReactLoop`] — text-format Thought/Action/Observation loop
//! - [`plan::PlanExecute`] — plan first, then execute steps via ReAct

pub mod direct;
pub mod native;
pub mod plan;
pub mod react;

use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::warn;

use tiller_core::cancel::CancellationToken;
use tiller_core::client::{ChatMessage, ModelClient};
use tiller_core::error::ClientError;
use tiller_core::event::AgentEvent;
use tiller_core::tool::{ToolRegistry, ToolResult};

use crate::retry::{self, RetryPolicy};

/// Hard ceiling on model-call iterations within a single strategy run.
pub const MAX_ITERATIONS: usize = 20;

/// Everything a strategy needs to run: the model, the tools, the event
/// channel back to the orchestrator, and the cancellation token for this
/// message.
#[derive(Clone)]
pub struct StrategyContext {
    pub client: Arc<dyn ModelClient>,
    pub tools: Arc<ToolRegistry>,
    pub events: mpsc::Sender<AgentEvent>,
    pub cancel: CancellationToken,
}

impl StrategyContext {
    /// Emit an event, ignoring a closed channel (the caller went away).
    pub async fn emit(&self, event: AgentEvent) {
        let _ = self.events.send(event).await;
    }
}

/// How a strategy run ended.
#[derive(Debug, Clone, PartialEq)]
pub struct RunOutcome {
    pub answer: Option<String>,
    pub cancelled: bool,
    pub error: Option<String>,
}

impl RunOutcome {
    pub fn answered(answer: impl Into<String>) -> Self {
        Self {
            answer: Some(answer.into()),
            cancelled: false,
            error: None,
        }
    }

    pub fn cancelled() -> Self {
        Self {
            answer: None,
            cancelled: true,
            error: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            answer: None,
            cancelled: false,
            error: Some(message.into()),
        }
    }

    pub fn succeeded(&self) -> bool {
        self.answer.is_some() && self.error.is_none()
    }
}

/// Collect a full completion from the streaming endpoint, retrying failed
/// attempts per `policy`. An error arriving after text has already been
/// received is a stream interruption and is not retried; the partial text
/// would otherwise be double-spoken.
pub async fn collect_text(
    ctx: &StrategyContext,
    messages: &[ChatMessage],
    policy: RetryPolicy,
) -> Result<String, ClientError> {
    let mut attempt = 0u32;
    loop {
        if ctx.cancel.is_cancelled() {
            return Err(ClientError::StreamInterrupted("cancelled".into()));
        }
        match try_collect(ctx, messages).await {
            Ok(text) => return Ok(text),
            Err((err, partial)) if partial || attempt >= policy.max_retries => return Err(err),
            Err((err, _)) => {
                attempt += 1;
                warn!(attempt, error = %err, "model call failed, retrying");
                tokio::time::sleep(policy.delay(attempt)).await;
            }
        }
    }
}

async fn try_collect(
    ctx: &StrategyContext,
    messages: &[ChatMessage],
) -> Result<String, (ClientError, bool)> {
    let mut rx = ctx
        .client
        .stream_complete(messages.to_vec())
        .await
        .map_err(|e| (e, false))?;
    let mut text = String::new();
    while let Some(chunk) = rx.recv().await {
        match chunk {
            Ok(piece) => text.push_str(&piece),
            Err(err) => return Err((err, !text.is_empty())),
        }
    }
    Ok(text)
}

/// Execute a tool with linear-backoff retries on transient failures.
/// Non-transient failures and structured tool errors return immediately
/// as a failed `ToolResult` so the model can see what went wrong. A
/// request for an unregistered tool fails with the valid tool set named.
pub async fn execute_tool_with_retry(
    ctx: &StrategyContext,
    tool_name: &str,
    params: serde_json::Value,
    policy: RetryPolicy,
) -> ToolResult {
    if !ctx.tools.has(tool_name) {
        return ToolResult::fail(format!(
            "Unknown tool '{}'. Available tools: {}",
            tool_name,
            ctx.tools.list().join(", ")
        ));
    }
    let mut attempt = 0u32;
    loop {
        if ctx.cancel.is_cancelled() {
            return ToolResult::fail("execution cancelled");
        }
        let result = match ctx.tools.execute(tool_name, params.clone()).await {
            Ok(result) => result,
            Err(err) => ToolResult::from(err),
        };
        if result.success {
            return result;
        }
        let message = result.error.clone().unwrap_or_default();
        if attempt >= policy.max_retries || !retry::is_transient(&message) {
            return result;
        }
        attempt += 1;
        warn!(tool = tool_name, attempt, error = %message, "transient tool failure, retrying");
        tokio::time::sleep(policy.delay(attempt)).await;
    }
}
