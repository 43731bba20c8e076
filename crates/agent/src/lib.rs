//! Agent orchestration for Tiller.
//!
//! The message-processing core: conversation state and its windowed export,
//! token budget heuristics, retry policies, structured-output parsers, the
//! four execution strategies, and the orchestrator that wires them to a
//! `ModelClient` and a `ToolRegistry`.

pub mod budget;
pub mod conversation;
pub mod orchestrator;
pub mod parser;
pub mod retry;
pub mod strategies;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use budget::{CostEstimator, HeuristicEstimator, IMAGE_COST};
pub use conversation::{ConversationState, SummaryPartition, EXPORT_WINDOW_UNITS};
pub use orchestrator::{decide_tool_need, AgentMode, AgentState, Orchestrator};
pub use retry::{Backoff, RetryPolicy};
pub use strategies::{RunOutcome, StrategyContext, MAX_ITERATIONS};
