//! Parsers for structured model output: ReAct steps and plan listings.
//!
//! Models drift from the requested format constantly, so both parsers are
//! written to degrade instead of fail. A ReAct response with no Action and
//! no Final Answer is treated as an implicit answer; a plan response with
//! no recognizable steps collapses into a single synthetic step covering
//! the whole goal.

use regex::Regex;
use serde_json::Value;
use std::sync::OnceLock;

/// The parsed outcome of a single ReAct model response.
#[derive(Debug, Clone, PartialEq)]
pub enum ReactOutcome {
    /// The model chose a tool to invoke.
    Action(ParsedAction),
    /// The model declared a final answer.
    FinalAnswer(String),
    /// The model answered without following the format. The raw text is
    /// treated as the answer rather than re-prompting.
    ImplicitAnswer(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedAction {
    pub tool: String,
    pub params: Value,
}

/// A full parsed ReAct step: optional reasoning plus the outcome.
#[derive(Debug, Clone, PartialEq)]
pub struct ReactStep {
    pub thought: Option<String>,
    pub outcome: ReactOutcome,
}

fn thought_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Thought:\s*(.*?)(?:\n\s*(?:Action|Final Answer):|\z)").unwrap()
    })
}

fn action_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"Action:\s*([^\n]+)").unwrap())
}

fn action_input_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?s)Action Input:\s*(\{.*?\}|\[.*?\]|[^\n]+)").unwrap()
    })
}

fn final_answer_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)Final Answer:\s*(.*)").unwrap())
}

fn plan_step_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?m)^\s*Step\s+(\d+)\s*:\s*(.+?)\s*(?:Expected\s*:\s*(.+?)\s*)?$").unwrap()
    })
}

/// Parse one ReAct-formatted model response.
pub fn parse_react(response: &str) -> ReactStep {
    let thought = thought_re()
        .captures(response)
        .map(|c| c[1].trim().to_string())
        .filter(|t| !t.is_empty());

    // Final Answer wins even when an Action also appears; models sometimes
    // emit both and the answer is the terminal intent.
    if let Some(caps) = final_answer_re().captures(response) {
        return ReactStep {
            thought,
            outcome: ReactOutcome::FinalAnswer(caps[1].trim().to_string()),
        };
    }

    if let Some(caps) = action_re().captures(response) {
        let tool = caps[1].trim().trim_matches('`').to_string();
        let params = action_input_re()
            .captures(response)
            .and_then(|c| parse_params(c[1].trim()))
            .unwrap_or_else(|| Value::Object(Default::default()));
        return ReactStep {
            thought,
            outcome: ReactOutcome::Action(ParsedAction { tool, params }),
        };
    }

    // No recognizable directive: the whole response is the answer, minus a
    // leading Thought if one was given.
    let answer = match &thought {
        Some(t) if response.trim().starts_with("Thought:") => {
            let rest = response
                .trim()
                .strip_prefix("Thought:")
                .unwrap_or(response)
                .trim()
                .strip_prefix(t.as_str())
                .unwrap_or("")
                .trim();
            if rest.is_empty() { t.clone() } else { rest.to_string() }
        }
        _ => response.trim().to_string(),
    };
    ReactStep {
        thought,
        outcome: ReactOutcome::ImplicitAnswer(answer),
    }
}

fn parse_params(raw: &str) -> Option<Value> {
    if let Ok(value) = serde_json::from_str::<Value>(raw) {
        if value.is_object() || value.is_array() {
            return Some(value);
        }
    }
    // Bare strings become {"input": "..."} so tools still get something.
    let trimmed = raw.trim_matches('"').trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(serde_json::json!({ "input": trimmed }))
    }
}

/// Parse a plan listing of `Step N: <description> Expected: <outcome>`
/// lines. Lines missing the Expected clause get an empty expectation.
/// Returns `(description, expected)` pairs in listed order.
pub fn parse_plan(response: &str) -> Vec<(String, String)> {
    plan_step_re()
        .captures_iter(response)
        .map(|caps| {
            let description = caps[2].trim().trim_end_matches('.').to_string();
            let expected = caps
                .get(3)
                .map(|m| m.as_str().trim().to_string())
                .unwrap_or_default();
            (description, expected)
        })
        .collect()
}
