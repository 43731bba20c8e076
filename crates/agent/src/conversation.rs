//! Conversation state: the ordered turn history plus its export,
//! truncation, and summarization logic.
//!
//! Only the orchestrator's processing task writes to a `ConversationState`.
//! Strategies receive an export snapshot and report results back as events;
//! the processing task folds those events into turns. That single-writer
//! rule is what keeps the history consistent when a run is cancelled
//! mid-flight.

use std::sync::Arc;

use tracing::debug;
use uuid::Uuid;

use tiller_core::client::ChatMessage;
use tiller_core::turn::{Role, Turn};

use crate::budget::CostEstimator;

/// Default export window size in estimator units.
pub const EXPORT_WINDOW_UNITS: usize = 8_000;

/// Units reserved for the model's reply when auto-truncating.
pub const TRUNCATE_RESERVE_UNITS: usize = 4_000;

/// The slice of history handed to the summarizer, split from the slice
/// that must survive verbatim.
#[derive(Debug, Clone)]
pub struct SummaryPartition {
    /// Older turns to be compressed into a summary.
    pub to_summarize: Vec<Turn>,
    /// Recent turns kept verbatim after the summary is applied.
    pub to_keep: Vec<Turn>,
    /// Content of an earlier summary turn, if one exists. The summarizer
    /// should fold it into the new summary rather than lose it.
    pub previous_summary: Option<String>,
}

/// Ordered turn history for one conversation.
pub struct ConversationState {
    pub id: String,
    pub system_prompt: String,
    /// Model id used for budget lookups only; the client owns the real one.
    pub model: String,
    turns: Vec<Turn>,
    estimator: Arc<dyn CostEstimator>,
}

impl ConversationState {
    pub fn new(
        system_prompt: impl Into<String>,
        model: impl Into<String>,
        estimator: Arc<dyn CostEstimator>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            system_prompt: system_prompt.into(),
            model: model.into(),
            turns: Vec::new(),
            estimator,
        }
    }

    /// Replace the turn history wholesale (restore from storage).
    pub fn set_turns(&mut self, turns: Vec<Turn>) {
        self.turns = turns;
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    /// Remove and return the most recent turn, if any.
    pub fn remove_last(&mut self) -> Option<Turn> {
        self.turns.pop()
    }

    pub fn last(&self) -> Option<&Turn> {
        self.turns.last()
    }

    /// Total estimated cost of the history, system prompt included.
    pub fn total_cost(&self) -> usize {
        let turns: usize = self.turns.iter().map(|t| self.estimator.turn_cost(t)).sum();
        self.estimator.estimate(&self.system_prompt) + turns
    }

    /// Export the most recent turns that fit inside `window_units`,
    /// preceded by the system prompt when the prompt itself fits. The
    /// prompt's cost is charged against the window before any turn is
    /// considered. Turns are scanned newest-first and emitted oldest-first;
    /// a turn that would overflow the window stops the scan even if a
    /// smaller, older turn might still fit — relative order is never
    /// reshuffled.
    pub fn windowed_export(&self, window_units: usize) -> Vec<ChatMessage> {
        let mut budget = window_units;
        let system_cost = self.estimator.estimate(&self.system_prompt);
        let with_system = !self.system_prompt.is_empty() && system_cost <= budget;
        if with_system {
            budget -= system_cost;
        }
        let mut start = self.turns.len();
        for (i, turn) in self.turns.iter().enumerate().rev() {
            let cost = self.estimator.turn_cost(turn);
            if cost > budget {
                break;
            }
            budget -= cost;
            start = i;
        }

        let mut messages = Vec::with_capacity(self.turns.len() - start + 1);
        if with_system {
            messages.push(ChatMessage::system(&self.system_prompt));
        }
        for turn in &self.turns[start..] {
            messages.push(ChatMessage::from_turn(turn));
        }
        messages
    }

    /// Export with the default window.
    pub fn export(&self) -> Vec<ChatMessage> {
        self.windowed_export(EXPORT_WINDOW_UNITS)
    }

    /// Drop oldest turns until total cost fits within the model limit minus
    /// `reserve_units`. The most recent turn always survives. Returns how
    /// many turns were dropped.
    pub fn auto_truncate(&mut self, reserve_units: usize) -> usize {
        let limit = crate::budget::model_limit(&self.model);
        let target = limit.saturating_sub(reserve_units);
        let mut dropped = 0;
        while self.turns.len() > 1 && self.total_cost() > target {
            self.turns.remove(0);
            dropped += 1;
        }
        if dropped > 0 {
            debug!(
                conversation = %self.id,
                dropped,
                remaining = self.turns.len(),
                "auto-truncated history"
            );
        }
        dropped
    }

    /// Split history for summarization: everything except the last
    /// `keep_recent` turns goes to the summarizer. Returns `None` when
    /// there is nothing old enough to compress.
    pub fn partition_for_summary(&self, keep_recent: usize) -> Option<SummaryPartition> {
        if self.turns.len() <= keep_recent {
            return None;
        }
        let split = self.turns.len() - keep_recent;
        let to_summarize: Vec<Turn> = self.turns[..split]
            .iter()
            .filter(|t| !t.summary)
            .cloned()
            .collect();
        if to_summarize.is_empty() {
            return None;
        }
        let previous_summary = self.turns[..split]
            .iter()
            .find(|t| t.summary)
            .map(|t| t.content.clone());
        Some(SummaryPartition {
            to_summarize,
            to_keep: self.turns[split..].to_vec(),
            previous_summary,
        })
    }

    /// Replace the summarized prefix with a single summary turn followed by
    /// the kept tail. Idempotent with respect to re-partitioning: the new
    /// summary turn is flagged and will be folded, not re-summarized.
    pub fn apply_summary(&mut self, summary_text: impl Into<String>, kept: Vec<Turn>) {
        let mut turns = Vec::with_capacity(kept.len() + 1);
        turns.push(Turn::summary(summary_text));
        turns.extend(kept);
        self.turns = turns;
    }

    /// Render the history as plain text for the summarization prompt.
    pub fn transcript_for_summary(partition: &SummaryPartition) -> String {
        let mut out = String::new();
        if let Some(prev) = &partition.previous_summary {
            out.push_str("Earlier summary:\n");
            out.push_str(prev);
            out.push_str("\n\n");
        }
        for turn in &partition.to_summarize {
            let speaker = match turn.role {
                Role::User => "User",
                Role::Assistant => "Assistant",
                Role::System => "System",
            };
            out.push_str(speaker);
            out.push_str(": ");
            out.push_str(&turn.content);
            out.push('\n');
        }
        out
    }
}

impl std::fmt::Debug for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationState")
            .field("id", &self.id)
            .field("model", &self.model)
            .field("turns", &self.turns.len())
            .finish()
    }
}
