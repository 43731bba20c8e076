//! Skill matching for Tiller.
//!
//! A `SkillMatcher` holds a set of [`Skill`]s and scores each against an
//! utterance. Three signals contribute, strongest wins:
//!
//! 1. literal example-phrase containment (0.9)
//! 2. a structural detector (0.8): the utterance names a code location and
//!    a definition-flavored word, for skills that declare
//!    navigation-flavored keywords
//! 3. keyword overlap, scaled by how much of the keyword set matched
//!
//! Matches below the threshold are dropped. Matching is deliberately
//! lexical: it runs on every message, so it has to be cheap, and a wrong
//! match only adds extra instructions to the prompt.

use std::sync::OnceLock;

use regex::Regex;
use tracing::debug;

use tiller_core::skill::{Skill, SkillMatch, SkillProvider};

/// Minimum score for a skill to be reported.
pub const MATCH_THRESHOLD: f32 = 0.5;

const PHRASE_SCORE: f32 = 0.9;
const STRUCTURAL_SCORE: f32 = 0.8;
const KEYWORD_SCALE: f32 = 0.8;

/// Keywords that mark a skill as caring about code locations.
const LOCATION_KEYWORDS: &[&str] = &["definition", "symbol", "reference", "navigate"];

/// Words that mark definition-seeking intent in the utterance itself. A
/// bare location reference is not enough; the user has to be asking about
/// a definition for the structural signal to fire.
const DEFINITION_WORDS: &[&str] = &[
    "definition", "defined", "declare", "symbol", "function", "fn ", "method", "struct", "impl ",
];

fn location_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    // "line 42", "src/main.rs:17", "fn parse_args", "function setup"
    RE.get_or_init(|| {
        Regex::new(r"(?i)(line\s+\d+|[\w/.-]+\.\w+:\d+|fn\s+\w+|function\s+\w+)").unwrap()
    })
}

fn seeks_definition(utterance_lower: &str) -> bool {
    DEFINITION_WORDS.iter().any(|w| utterance_lower.contains(w))
}

pub struct SkillMatcher {
    skills: Vec<Skill>,
    threshold: f32,
}

impl SkillMatcher {
    pub fn new(skills: Vec<Skill>) -> Self {
        Self {
            skills,
            threshold: MATCH_THRESHOLD,
        }
    }

    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn skills(&self) -> &[Skill] {
        &self.skills
    }

    fn score(&self, skill: &Skill, utterance_lower: &str, structural_intent: bool) -> f32 {
        let mut best = 0.0f32;

        for phrase in &skill.example_phrases {
            if utterance_lower.contains(&phrase.to_lowercase()) {
                best = best.max(PHRASE_SCORE);
            }
        }

        if structural_intent
            && skill
                .keywords
                .iter()
                .any(|k| LOCATION_KEYWORDS.contains(&k.to_lowercase().as_str()))
        {
            best = best.max(STRUCTURAL_SCORE);
        }

        if !skill.keywords.is_empty() {
            let matched = skill
                .keywords
                .iter()
                .filter(|k| utterance_lower.contains(&k.to_lowercase()))
                .count();
            let ratio = matched as f32 / skill.keywords.len() as f32;
            best = best.max(ratio * KEYWORD_SCALE);
        }

        best
    }
}

impl SkillProvider for SkillMatcher {
    fn match_skills(&self, utterance: &str) -> Vec<SkillMatch> {
        let lower = utterance.to_lowercase();
        let structural_intent = location_re().is_match(utterance) && seeks_definition(&lower);

        let mut matches: Vec<SkillMatch> = self
            .skills
            .iter()
            .filter_map(|skill| {
                let score = self.score(skill, &lower, structural_intent);
                (score >= self.threshold).then(|| SkillMatch {
                    skill: skill.clone(),
                    score,
                })
            })
            .collect();
        matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        if !matches.is_empty() {
            debug!(
                count = matches.len(),
                top = %matches[0].skill.name,
                score = matches[0].score,
                "skills matched"
            );
        }
        matches
    }

    fn skills_prompt(&self, matches: &[SkillMatch]) -> String {
        let mut out = String::from("Relevant skill instructions:\n");
        for m in matches {
            out.push_str(&format!("\n## {}\n{}\n", m.skill.name, m.skill.instructions));
        }
        out
    }
}

/// The built-in skill set for editor-assistant work.
pub fn default_skills() -> Vec<Skill> {
    vec![
        Skill {
            name: "code_navigation".into(),
            description: "Locate definitions, references, and symbols".into(),
            instructions: "When the user refers to a specific symbol or location, \
                           read the named file before answering. Quote line numbers \
                           in your answer so the editor can jump there."
                .into(),
            example_phrases: vec![
                "go to definition".into(),
                "where is this defined".into(),
                "find all references".into(),
            ],
            keywords: vec![
                "definition".into(),
                "symbol".into(),
                "reference".into(),
                "navigate".into(),
            ],
        },
        Skill {
            name: "error_diagnosis".into(),
            description: "Diagnose compiler errors and test failures".into(),
            instructions: "Reproduce the failure first: run the failing command and \
                           read the full output before proposing a fix. Quote the \
                           exact error line you are addressing."
                .into(),
            example_phrases: vec![
                "why does this fail".into(),
                "fix this error".into(),
                "编译错误".into(),
            ],
            keywords: vec![
                "error".into(),
                "panic".into(),
                "fails".into(),
                "stack trace".into(),
                "报错".into(),
            ],
        },
        Skill {
            name: "refactoring".into(),
            description: "Restructure code without changing behavior".into(),
            instructions: "Make one mechanical change at a time and keep the tests \
                           passing between steps. Never combine a rename with a \
                           behavior change."
                .into(),
            example_phrases: vec![
                "refactor this".into(),
                "extract a function".into(),
                "重构".into(),
            ],
            keywords: vec![
                "refactor".into(),
                "rename".into(),
                "extract".into(),
                "simplify".into(),
                "重构".into(),
            ],
        },
    ]
}
