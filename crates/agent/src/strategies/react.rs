//! ReAct loop: free-text Thought/Action/Observation cycling.
//!
//! The fallback strategy for providers without native tool calling, and
//! the per-step engine for plan execution. Tool definitions and the
//! response format are spliced into the prompt; each model response is
//! parsed, the chosen tool is run, and its observation is appended as a
//! user message for the next round.

use tracing::{debug, warn};

use tiller_core::client::{ChatMessage, ChatRole};
use tiller_core::event::AgentEvent;

use crate::parser::{self, ReactOutcome};
use crate::retry::RetryPolicy;
use crate::strategies::{
    collect_text, execute_tool_with_retry, RunOutcome, StrategyContext, MAX_ITERATIONS,
};

const FORMAT_INSTRUCTIONS: &str = "\
Answer using the following format, one directive per line:

Thought: your reasoning about what to do next
Action: the tool to use, exactly one of the tools listed below
Action Input: the tool arguments as a JSON object
Final Answer: the final answer, once no more tool use is needed

Use either Action or Final Answer in a response, never both.
After each Action you will receive an Observation with the result.

Available tools:
";

pub struct ReactLoop {
    max_iterations: usize,
    model_retry: RetryPolicy,
    tool_retry: RetryPolicy,
}

impl ReactLoop {
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

    /// Run the loop over an exported message window. The final answer is
    /// emitted as an `Answer` event and returned in the outcome so plan
    /// execution can aggregate per-step results.
    pub async fn run(&self, ctx: &StrategyContext, messages: Vec<ChatMessage>) -> RunOutcome {
        let mut working = messages;
        let instructions = format!(
            "{FORMAT_INSTRUCTIONS}{}",
            ctx.tools.describe_for_prompt()
        );
        let insert_at = working
            .iter()
            .position(|m| m.role != ChatRole::System)
            .unwrap_or(working.len());
        working.insert(insert_at, ChatMessage::system(instructions));

        for iteration in 0..self.max_iterations {
            if ctx.cancel.is_cancelled() {
                return RunOutcome::cancelled();
            }

            let response = match collect_text(ctx, &working, self.model_retry).await {
                Ok(text) => text,
                Err(err) => {
                    if ctx.cancel.is_cancelled() {
                        return RunOutcome::cancelled();
                    }
                    ctx.emit(AgentEvent::Error {
                        message: err.to_string(),
                    })
                    .await;
                    return RunOutcome::failed(err.to_string());
                }
            };

            if ctx.cancel.is_cancelled() {
                return RunOutcome::cancelled();
            }

            let step = parser::parse_react(&response);
            if let Some(thought) = &step.thought {
                ctx.emit(AgentEvent::Thought {
                    content: thought.clone(),
                })
                .await;
            }

            match step.outcome {
                ReactOutcome::FinalAnswer(answer) => {
                    debug!(iteration, "react loop answered");
                    ctx.emit(AgentEvent::Answer {
                        content: answer.clone(),
                    })
                    .await;
                    return RunOutcome::answered(answer);
                }
                ReactOutcome::ImplicitAnswer(answer) => {
                    // Format drift: no directive at all. Treat the text as
                    // the answer instead of re-prompting.
                    debug!(iteration, "react loop got implicit answer");
                    ctx.emit(AgentEvent::Answer {
                        content: answer.clone(),
                    })
                    .await;
                    return RunOutcome::answered(answer);
                }
                ReactOutcome::Action(action) => {
                    ctx.emit(AgentEvent::Action {
                        tool: action.tool.clone(),
                        params: action.params.clone(),
                    })
                    .await;

                    let result = execute_tool_with_retry(
                        ctx,
                        &action.tool,
                        action.params.clone(),
                        self.tool_retry,
                    )
                    .await;
                    if ctx.cancel.is_cancelled() {
                        return RunOutcome::cancelled();
                    }
                    ctx.emit(AgentEvent::Observation {
                        result: result.clone(),
                    })
                    .await;

                    let observation = if result.success {
                        format!("Observation: {}", result.output)
                    } else {
                        format!(
                            "Observation: Error: {}",
                            result.error.unwrap_or_else(|| "unknown".into())
                        )
                    };
                    working.push(ChatMessage::assistant(response));
                    working.push(ChatMessage::user(observation));
                }
            }
        }

        warn!(max = self.max_iterations, "react loop hit iteration ceiling");
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
}

impl Default for ReactLoop {
    fn default() -> Self {
        Self::new()
    }
}
