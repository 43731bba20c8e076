//! Agent-level events.
//!
//! `AgentEvent` is the sole output contract of the core toward any
//! presentation layer (editor webview, CLI, ...). Strategies emit these and
//! the orchestrator forwards them verbatim, so consumers must treat unknown
//! or future event tags as ignorable.

use serde::{Deserialize, Serialize};

use crate::plan::{Plan, PlanStep};
use crate::tool::ToolResult;

/// Events emitted during a single processed message.
///
/// - `thought`       — a reasoning step (ReAct trace or orchestrator note)
/// - `action`        — a tool is about to be invoked
/// - `observation`   — tool execution completed
/// - `token`         — partial streamed answer text
/// - `answer`        — the final answer text
/// - `error`         — a surfaced failure
/// - `plan`          — a synthesized plan (plan mode)
/// - `step_complete` — one plan step finished
/// - `skill`         — a matched skill was injected
/// - `token_usage`   — context budget snapshot after appending a turn
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// A reasoning step.
    Thought { content: String },

    /// The agent is calling a tool.
    Action {
        tool: String,
        params: serde_json::Value,
    },

    /// Tool execution completed.
    Observation { result: ToolResult },

    /// Partial streamed answer text.
    Token { content: String },

    /// The final answer.
    Answer { content: String },

    /// An error surfaced mid-stream.
    Error { message: String },

    /// A synthesized plan (plan mode, phase 1).
    Plan { plan: Plan },

    /// One plan step finished (success or failure).
    StepComplete { step: PlanStep, result: String },

    /// A skill matched the utterance and its instructions were injected.
    Skill { name: String, description: String },

    /// Context budget snapshot.
    TokenUsage {
        current: usize,
        limit: usize,
        remaining: usize,
        percentage: f32,
    },
}

impl AgentEvent {
    /// The wire tag for this event type.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Thought { .. } => "thought",
            Self::Action { .. } => "action",
            Self::Observation { .. } => "observation",
            Self::Token { .. } => "token",
            Self::Answer { .. } => "answer",
            Self::Error { .. } => "error",
            Self::Plan { .. } => "plan",
            Self::StepComplete { .. } => "step_complete",
            Self::Skill { .. } => "skill",
            Self::TokenUsage { .. } => "token_usage",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_serialization_token() {
        let event = AgentEvent::Token {
            content: "Hello".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"token""#));
        assert!(json.contains(r#""content":"Hello""#));
    }

    #[test]
    fn event_serialization_action() {
        let event = AgentEvent::Action {
            tool: "list_files".into(),
            params: serde_json::json!({"path": "src"}),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"action""#));
        assert!(json.contains(r#""tool":"list_files""#));
    }

    #[test]
    fn event_serialization_observation() {
        let event = AgentEvent::Observation {
            result: ToolResult::fail("file not found"),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"observation""#));
        assert!(json.contains("file not found"));
    }

    #[test]
    fn event_serialization_token_usage() {
        let event = AgentEvent::TokenUsage {
            current: 1200,
            limit: 8192,
            remaining: 6992,
            percentage: 14.6,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains(r#""type":"token_usage""#));
        assert!(json.contains(r#""current":1200"#));
    }

    #[test]
    fn event_type_names() {
        assert_eq!(
            AgentEvent::Thought {
                content: "x".into()
            }
            .event_type(),
            "thought"
        );
        assert_eq!(
            AgentEvent::Answer {
                content: "x".into()
            }
            .event_type(),
            "answer"
        );
        assert_eq!(
            AgentEvent::Skill {
                name: "a".into(),
                description: "b".into()
            }
            .event_type(),
            "skill"
        );
        assert_eq!(
            AgentEvent::Error {
                message: "x".into()
            }
            .event_type(),
            "error"
        );
    }

    #[test]
    fn event_deserialization() {
        let json = r#"{"type":"token","content":"hi"}"#;
        let event: AgentEvent = serde_json::from_str(json).unwrap();
        match event {
            AgentEvent::Token { content } => assert_eq!(content, "hi"),
            _ => panic!("Wrong variant"),
        }
    }

    #[test]
    fn step_complete_roundtrip() {
        let step = PlanStep::new(2, "write tests", "tests pass");
        let event = AgentEvent::StepComplete {
            step,
            result: "12 tests passing".into(),
        };
        let json = serde_json::to_string(&event).unwrap();
        let back: AgentEvent = serde_json::from_str(&json).unwrap();
        match back {
            AgentEvent::StepComplete { step, result } => {
                assert_eq!(step.id, 2);
                assert_eq!(result, "12 tests passing");
            }
            _ => panic!("Wrong variant"),
        }
    }
}
