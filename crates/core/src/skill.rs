//! Skill types — curated instruction bundles matched against utterances.
//!
//! A skill carries domain-specific guidance that gets spliced into the
//! system prompt when the user's request looks like a fit. Matching is
//! best-effort: a false negative degrades to generic tool use, a false
//! positive only adds harmless extra instructions.

use serde::{Deserialize, Serialize};

/// A curated instruction bundle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Skill {
    /// Unique skill name (e.g., "code_navigation")
    pub name: String,

    /// One-line description shown to the user
    pub description: String,

    /// Full instruction text spliced into the system prompt
    pub instructions: String,

    /// Literal phrases that strongly indicate this skill
    #[serde(default)]
    pub example_phrases: Vec<String>,

    /// Keywords contributing to overlap scoring
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// A matched skill with its confidence score in [0, 1].
#[derive(Debug, Clone)]
pub struct SkillMatch {
    pub skill: Skill,
    pub score: f32,
}

/// The skill matching contract the orchestrator consumes.
pub trait SkillProvider: Send + Sync {
    /// Match skills against an utterance, highest relevance first.
    /// An empty result means "no skill override".
    fn match_skills(&self, utterance: &str) -> Vec<SkillMatch>;

    /// Instruction text for the given matches, ready to splice into the
    /// active system prompt.
    fn skills_prompt(&self, matches: &[SkillMatch]) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skill_serialization_roundtrip() {
        let skill = Skill {
            name: "code_navigation".into(),
            description: "Jump to definitions and references".into(),
            instructions: "Prefer symbol lookup over text search.".into(),
            example_phrases: vec!["go to definition".into()],
            keywords: vec!["definition".into(), "symbol".into()],
        };
        let json = serde_json::to_string(&skill).unwrap();
        let back: Skill = serde_json::from_str(&json).unwrap();
        assert_eq!(back.name, "code_navigation");
        assert_eq!(back.keywords.len(), 2);
    }
}
