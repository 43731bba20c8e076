//! Direct chat strategy: one streamed completion, no tools.
//!
//! Used when the request needs conversation only. Each received chunk is
//! forwarded as a `Token` event, and the accumulated text becomes the
//! `Answer`. This is the cheap path: a transport failure surfaces one
//! `Error` event and stops, leaving the retry decision to the caller.

use tracing::debug;

use tiller_core::client::ChatMessage;
use tiller_core::event::AgentEvent;

use crate::strategies::{RunOutcome, StrategyContext};

pub struct DirectChat;

impl DirectChat {
    pub fn new() -> Self {
        Self
    }

    pub async fn run(&self, ctx: &StrategyContext, messages: Vec<ChatMessage>) -> RunOutcome {
        if ctx.cancel.is_cancelled() {
            return RunOutcome::cancelled();
        }

        let mut rx = match ctx.client.stream_complete(messages).await {
            Ok(rx) => rx,
            Err(err) => {
                ctx.emit(AgentEvent::Error {
                    message: err.to_string(),
                })
                .await;
                return RunOutcome::failed(err.to_string());
            }
        };

        let mut answer = String::new();
        while let Some(chunk) = rx.recv().await {
            if ctx.cancel.is_cancelled() {
                return RunOutcome::cancelled();
            }
            match chunk {
                Ok(piece) => {
                    answer.push_str(&piece);
                    ctx.emit(AgentEvent::Token { content: piece }).await;
                }
                Err(err) => {
                    ctx.emit(AgentEvent::Error {
                        message: err.to_string(),
                    })
                    .await;
                    if answer.is_empty() {
                        return RunOutcome::failed(err.to_string());
                    }
                    // Keep the partial text the user already saw as the
                    // answer; re-requesting would re-speak it.
                    ctx.emit(AgentEvent::Answer {
                        content: answer.clone(),
                    })
                    .await;
                    return RunOutcome::answered(answer);
                }
            }
        }

        debug!(chars = answer.len(), "direct chat completed");
        ctx.emit(AgentEvent::Answer {
            content: answer.clone(),
        })
        .await;
        RunOutcome::answered(answer)
    }
}

impl Default for DirectChat {
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
    use tiller_core::tool::ToolRegistry;

    use super::*;
    use crate::test_helpers::{collect_events, ScriptedClient, ScriptedResponse};

    fn context(client: ScriptedClient) -> (StrategyContext, mpsc::Receiver<AgentEvent>) {
        let (tx, rx) = mpsc::channel(128);
        (
            StrategyContext {
                client: Arc::new(client),
                tools: Arc::new(ToolRegistry::new()),
                events: tx,
                cancel: CancellationToken::new(),
            },
            rx,
        )
    }

    #[tokio::test]
    async fn streams_tokens_then_answer() {
        let client = ScriptedClient::new(vec![ScriptedResponse::Text(
            "hello from the model".into(),
        )]);
        let (ctx, rx) = context(client);

        let outcome = DirectChat::new()
            .run(&ctx, vec![ChatMessage::user("hi")])
            .await;
        drop(ctx);

        assert_eq!(outcome.answer.as_deref(), Some("hello from the model"));
        let events = collect_events(rx).await;
        let tokens: String = events
            .iter()
            .filter_map(|e| match e {
                AgentEvent::Token { content } => Some(content.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(tokens, "hello from the model");
        assert!(matches!(events.last(), Some(AgentEvent::Answer { .. })));
    }

    #[tokio::test]
    async fn transport_failure_surfaces_error_without_retry() {
        let client = ScriptedClient::new(vec![
            ScriptedResponse::Fail(ClientError::Network("connection refused".into())),
            ScriptedResponse::Text("should never be requested".into()),
        ]);
        let (ctx, rx) = context(client);

        let outcome = DirectChat::new()
            .run(&ctx, vec![ChatMessage::user("hi")])
            .await;
        drop(ctx);

        assert!(outcome.error.is_some());
        assert!(outcome.answer.is_none());
        // A retry would have consumed the second scripted response and
        // produced an answer; the only event is the surfaced error.
        let events = collect_events(rx).await;
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], AgentEvent::Error { .. }));
    }

    #[tokio::test]
    async fn cancellation_stops_before_answer() {
        let client = ScriptedClient::new(vec![ScriptedResponse::Text("never spoken".into())]);
        let (ctx, mut rx) = context(client);
        ctx.cancel.cancel();

        let outcome = DirectChat::new()
            .run(&ctx, vec![ChatMessage::user("hi")])
            .await;
        drop(ctx);

        assert!(outcome.cancelled);
        assert!(rx.recv().await.is_none());
    }
}
