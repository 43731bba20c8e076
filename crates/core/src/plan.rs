//! Plan and plan-step domain types for the plan-and-execute strategy.
//!
//! Step ids are contiguous and 1-based within a plan. `modify` preserves
//! completed steps and renumbers only the replacement tail, so a user can
//! re-plan after a failure without losing finished work.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanStatus {
    Draft,
    Approved,
    Executing,
    Completed,
    Failed,
}

/// Lifecycle status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StepStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

/// A single step in a plan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlanStep {
    /// 1-based sequence id, contiguous within the plan
    pub id: u32,

    /// What to do
    pub description: String,

    /// What a successful outcome looks like
    pub expected_outcome: String,

    pub status: StepStatus,

    /// The captured result once the step finished (or failed)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

impl PlanStep {
    pub fn new(id: u32, description: impl Into<String>, expected: impl Into<String>) -> Self {
        Self {
            id,
            description: description.into(),
            expected_outcome: expected.into(),
            status: StepStatus::Pending,
            result: None,
        }
    }
}

/// An ordered plan toward a goal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub goal: String,
    pub steps: Vec<PlanStep>,
    pub status: PlanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Plan {
    /// Create a draft plan from (description, expected outcome) pairs.
    /// Steps are numbered 1..=n.
    pub fn new(goal: impl Into<String>, steps: Vec<(String, String)>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            goal: goal.into(),
            steps: steps
                .into_iter()
                .enumerate()
                .map(|(i, (desc, expected))| PlanStep::new(i as u32 + 1, desc, expected))
                .collect(),
            status: PlanStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update a step's status (and optionally its result).
    pub fn set_step_status(&mut self, step_id: u32, status: StepStatus, result: Option<String>) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.id == step_id) {
            step.status = status;
            if result.is_some() {
                step.result = result;
            }
        }
        self.updated_at = Utc::now();
    }

    /// Number of completed steps.
    pub fn completed_count(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| s.status == StepStatus::Completed)
            .count()
    }

    /// Replace the unfinished tail of the plan with new steps.
    ///
    /// Completed steps are preserved; pending/running/failed steps are
    /// discarded; the replacements are renumbered to continue the sequence.
    /// Status resets to `Approved` so execution can resume.
    pub fn modify(&mut self, new_steps: Vec<(String, String)>) {
        self.steps.retain(|s| s.status == StepStatus::Completed);
        let mut next_id = self.steps.len() as u32 + 1;
        for (desc, expected) in new_steps {
            self.steps.push(PlanStep::new(next_id, desc, expected));
            next_id += 1;
        }
        self.status = PlanStatus::Approved;
        self.updated_at = Utc::now();
    }
}
