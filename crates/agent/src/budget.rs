//! Token budget estimation.
//!
//! Uses a character-class heuristic, not a real tokenizer: wide-script
//! characters (CJK, Kana, Hangul) cost ~1.5 characters per unit, everything
//! else ~4. Image attachments add a flat surcharge instead of being
//! measured. The estimate is deterministic — same text, same cost — which
//! is what the truncation and windowing logic needs; it is not bit-accurate
//! to any vendor tokenizer and tests must only assert ordering/threshold
//! properties.

use tiller_core::turn::Turn;

/// Flat cost added per image attachment.
pub const IMAGE_COST: usize = 500;

/// Fallback context limit for unknown models.
pub const DEFAULT_MODEL_LIMIT: usize = 8192;

/// Known model context limits, looked up by exact name then longest prefix.
const MODEL_LIMITS: &[(&str, usize)] = &[
    ("gpt-4o", 128_000),
    ("gpt-4o-mini", 128_000),
    ("gpt-4-turbo", 128_000),
    ("gpt-4", 8_192),
    ("gpt-3.5-turbo", 16_385),
    ("claude-sonnet-4", 200_000),
    ("claude-3-5-sonnet", 200_000),
    ("claude-3-haiku", 200_000),
    ("deepseek-chat", 64_000),
    ("deepseek-reasoner", 64_000),
    ("qwen2.5", 32_768),
    ("glm-4", 128_000),
    ("llama-3.1", 128_000),
];

/// A pluggable text cost estimator.
pub trait CostEstimator: Send + Sync {
    /// Approximate cost of a block of text in model units.
    fn estimate(&self, text: &str) -> usize;

    /// Cost of a full turn: content plus per-image surcharge.
    fn turn_cost(&self, turn: &Turn) -> usize {
        self.estimate(&turn.content) + turn.images.len() * IMAGE_COST
    }
}

/// The default character-class heuristic.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicEstimator;

impl CostEstimator for HeuristicEstimator {
    fn estimate(&self, text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let mut wide = 0usize;
        let mut other = 0usize;
        for c in text.chars() {
            if is_wide_script(c) {
                wide += 1;
            } else {
                other += 1;
            }
        }
        (wide as f64 / 1.5 + other as f64 / 4.0).ceil() as usize
    }
}

/// Whether a character belongs to a wide script (CJK ideographs, Kana,
/// Hangul, fullwidth forms) that tokenizes densely.
fn is_wide_script(c: char) -> bool {
    matches!(c,
        '\u{4E00}'..='\u{9FFF}'     // CJK unified ideographs
        | '\u{3400}'..='\u{4DBF}'   // CJK extension A
        | '\u{3040}'..='\u{30FF}'   // Hiragana + Katakana
        | '\u{AC00}'..='\u{D7AF}'   // Hangul syllables
        | '\u{FF00}'..='\u{FFEF}'   // Fullwidth forms
    )
}

/// Context limit for a model id: exact lookup, then longest known prefix,
/// then a conservative default.
pub fn model_limit(model_id: &str) -> usize {
    if let Some((_, limit)) = MODEL_LIMITS.iter().find(|(name, _)| *name == model_id) {
        return *limit;
    }
    MODEL_LIMITS
        .iter()
        .filter(|(name, _)| model_id.starts_with(name))
        .max_by_key(|(name, _)| name.len())
        .map(|(_, limit)| *limit)
        .unwrap_or(DEFAULT_MODEL_LIMIT)
}

/// Whether `current` usage is at or past `threshold` (0..=1) of the limit.
pub fn is_near(current: usize, model_id: &str, threshold: f64) -> bool {
    current as f64 >= model_limit(model_id) as f64 * threshold
}

/// Units left before the model limit. Saturates at zero.
pub fn remaining(current: usize, model_id: &str) -> usize {
    model_limit(model_id).saturating_sub(current)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_string_is_zero() {
        assert_eq!(HeuristicEstimator.estimate(""), 0);
    }

    #[test]
    fn estimate_is_deterministic() {
        let text = "fn main() { println!(\"hello\"); }";
        let a = HeuristicEstimator.estimate(text);
        let b = HeuristicEstimator.estimate(text);
        assert_eq!(a, b);
        assert!(a > 0);
    }

    #[test]
    fn longer_text_costs_more() {
        let short = HeuristicEstimator.estimate("short");
        let long = HeuristicEstimator.estimate(&"long ".repeat(100));
        assert!(long > short);
    }

    #[test]
    fn wide_script_is_denser_than_ascii() {
        // Same character count, different classes: CJK should cost more.
        let ascii = HeuristicEstimator.estimate(&"a".repeat(30));
        let cjk = HeuristicEstimator.estimate(&"码".repeat(30));
        assert!(cjk > ascii);
    }

    #[test]
    fn image_surcharge_is_flat() {
        let plain = Turn::user("describe this");
        let with_images = Turn::user_with_images(
            "describe this",
            vec![
                tiller_core::ImageAttachment {
                    mime_type: "image/png".into(),
                    data: "aGk=".into(),
                },
                tiller_core::ImageAttachment {
                    mime_type: "image/png".into(),
                    data: "aGk=".into(),
                },
            ],
        );
        let est = HeuristicEstimator;
        assert_eq!(
            est.turn_cost(&with_images),
            est.turn_cost(&plain) + 2 * IMAGE_COST
        );
    }

    #[test]
    fn model_limit_exact_match() {
        assert_eq!(model_limit("gpt-4"), 8_192);
        assert_eq!(model_limit("claude-sonnet-4"), 200_000);
    }

    #[test]
    fn model_limit_longest_prefix() {
        // "gpt-4o-2024-08-06" should match "gpt-4o", not "gpt-4".
        assert_eq!(model_limit("gpt-4o-2024-08-06"), 128_000);
        assert_eq!(model_limit("qwen2.5-coder-32b"), 32_768);
    }

    #[test]
    fn model_limit_unknown_falls_back() {
        assert_eq!(model_limit("some-local-model"), DEFAULT_MODEL_LIMIT);
    }

    #[test]
    fn is_near_threshold() {
        // 85% of 8192 is 6963.2
        assert!(!is_near(6_000, "gpt-4", 0.85));
        assert!(is_near(7_000, "gpt-4", 0.85));
    }

    #[test]
    fn remaining_saturates() {
        assert_eq!(remaining(8_000, "gpt-4"), 192);
        assert_eq!(remaining(10_000, "gpt-4"), 0);
    }
}
