//! Plan-and-execute strategy.
//!
//! Phase 1 asks the model for a numbered step listing toward the goal and
//! parses it into a [`Plan`]. Phase 2 executes steps in order, each through
//! its own ReAct run, recording the step result before moving on.
//! Execution is fail-fast: the first failed step marks the plan failed and
//! stops. The plan lives in a shared slot so the caller can watch progress
//! and, once the run has settled, replace the unfinished tail.

use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tiller_core::client::{ChatMessage, ChatRole};
use tiller_core::event::AgentEvent;
use tiller_core::plan::{Plan, PlanStatus, PlanStep, StepStatus};

use crate::parser;
use crate::retry::RetryPolicy;
use crate::strategies::react::ReactLoop;
use crate::strategies::{collect_text, RunOutcome, StrategyContext};

const PLANNING_INSTRUCTIONS: &str = "\
Break the user's goal into a short sequence of concrete steps.
List each step on its own line in exactly this format:

Step 1: <what to do> Expected: <what success looks like>
Step 2: <what to do> Expected: <what success looks like>

Use as few steps as the goal allows. Do not execute anything yet.";

pub struct PlanExecute {
    model_retry: RetryPolicy,
    step_iterations: usize,
}

impl PlanExecute {
    pub fn new() -> Self {
        Self {
            model_retry: RetryPolicy::model_call(),
            step_iterations: super::MAX_ITERATIONS,
        }
    }

    pub fn with_step_iterations(mut self, max: usize) -> Self {
        self.step_iterations = max;
        self
    }

    pub async fn run(
        &self,
        ctx: &StrategyContext,
        messages: Vec<ChatMessage>,
        goal: &str,
        plan_slot: Arc<Mutex<Option<Plan>>>,
    ) -> RunOutcome {
        // Phase 1: synthesize the plan.
        let mut planning = messages.clone();
        let insert_at = planning
            .iter()
            .position(|m| m.role != ChatRole::System)
            .unwrap_or(planning.len());
        planning.insert(insert_at, ChatMessage::system(PLANNING_INSTRUCTIONS));

        let listing = match collect_text(ctx, &planning, self.model_retry).await {
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

        let mut steps = parser::parse_plan(&listing);
        if steps.is_empty() {
            // Unparseable listing: one synthetic step covering the goal.
            warn!("plan listing unparseable, falling back to a single step");
            steps = vec![(goal.to_string(), "goal accomplished".to_string())];
        }

        let mut plan = Plan::new(goal, steps);
        plan.status = PlanStatus::Executing;
        info!(plan_id = %plan.id, steps = plan.steps.len(), "plan synthesized");
        ctx.emit(AgentEvent::Plan { plan: plan.clone() }).await;
        *plan_slot.lock().unwrap() = Some(plan);

        // Phase 2: execute steps in order, fail-fast. A cancelled run
        // settles the slot before returning: no step stays `Running` and
        // the plan leaves `Executing`, so re-planning can pick up from the
        // completed prefix.
        let mut results: Vec<(u32, String, String)> = Vec::new();
        loop {
            if ctx.cancel.is_cancelled() {
                settle_cancelled(&plan_slot, None);
                return RunOutcome::cancelled();
            }

            let next = {
                let mut slot = plan_slot.lock().unwrap();
                let plan = slot.as_mut().unwrap();
                match plan.steps.iter_mut().find(|s| s.status == StepStatus::Pending) {
                    Some(step) => {
                        step.status = StepStatus::Running;
                        Some((step.id, step.description.clone(), step.expected_outcome.clone()))
                    }
                    None => None,
                }
            };
            let Some((step_id, description, expected)) = next else {
                break;
            };

            debug!(step_id, %description, "executing plan step");
            let mut step_messages = messages.clone();
            let mut brief = format!(
                "You are executing one step of a larger plan.\n\
                 Goal: {goal}\nCurrent step: {description}"
            );
            if !expected.is_empty() {
                brief.push_str(&format!("\nExpected outcome: {expected}"));
            }
            if !results.is_empty() {
                brief.push_str("\nCompleted steps so far:");
                for (id, desc, result) in &results {
                    brief.push_str(&format!("\n{id}. {desc}: {result}"));
                }
            }
            step_messages.push(ChatMessage::user(brief));

            // Run the step through its own channel so the step's internal
            // Answer event becomes a StepComplete instead of leaking out as
            // a final answer.
            let (sub_tx, mut sub_rx) = mpsc::channel(64);
            let sub_ctx = StrategyContext {
                client: ctx.client.clone(),
                tools: ctx.tools.clone(),
                events: sub_tx,
                cancel: ctx.cancel.clone(),
            };
            let outer = ctx.events.clone();
            let forwarder = tokio::spawn(async move {
                while let Some(event) = sub_rx.recv().await {
                    if !matches!(event, AgentEvent::Answer { .. }) {
                        let _ = outer.send(event).await;
                    }
                }
            });

            let outcome = ReactLoop::new()
                .with_max_iterations(self.step_iterations)
                .run(&sub_ctx, step_messages)
                .await;
            drop(sub_ctx);
            let _ = forwarder.await;

            if outcome.cancelled {
                settle_cancelled(&plan_slot, Some(step_id));
                return RunOutcome::cancelled();
            }
            match &outcome.answer {
                Some(answer) => {
                    let (step, done) = {
                        let mut slot = plan_slot.lock().unwrap();
                        let plan = slot.as_mut().unwrap();
                        let step = settle_step(
                            plan,
                            step_id,
                            &description,
                            &expected,
                            StepStatus::Completed,
                            answer,
                        );
                        let done = plan
                            .steps
                            .iter()
                            .all(|s| s.status == StepStatus::Completed);
                        if done {
                            plan.status = PlanStatus::Completed;
                        }
                        (step, done)
                    };
                    ctx.emit(AgentEvent::StepComplete {
                        step,
                        result: answer.clone(),
                    })
                    .await;
                    results.push((step_id, description, answer.clone()));
                    if done {
                        break;
                    }
                }
                None => {
                    let reason = outcome
                        .error
                        .clone()
                        .unwrap_or_else(|| "step produced no result".into());
                    let step = {
                        let mut slot = plan_slot.lock().unwrap();
                        let plan = slot.as_mut().unwrap();
                        plan.status = PlanStatus::Failed;
                        settle_step(
                            plan,
                            step_id,
                            &description,
                            &expected,
                            StepStatus::Failed,
                            &reason,
                        )
                    };
                    warn!(step_id, %reason, "plan step failed, stopping execution");
                    ctx.emit(AgentEvent::StepComplete {
                        step,
                        result: reason.clone(),
                    })
                    .await;
                    let message = format!("step {step_id} failed: {reason}");
                    ctx.emit(AgentEvent::Error {
                        message: message.clone(),
                    })
                    .await;
                    return RunOutcome::failed(message);
                }
            }
        }

        let mut answer = format!("Completed {} steps toward: {goal}", results.len());
        for (id, desc, result) in &results {
            answer.push_str(&format!("\n{id}. {desc}: {result}"));
        }
        ctx.emit(AgentEvent::Answer {
            content: answer.clone(),
        })
        .await;
        RunOutcome::answered(answer)
    }
}

impl Default for PlanExecute {
    fn default() -> Self {
        Self::new()
    }
}

/// Record a step outcome in the plan. The step is matched by id and
/// description so an altered slot is never mutated by mistake; if the step
/// is gone, the outcome is reported as a detached step instead of lost.
fn settle_step(
    plan: &mut Plan,
    step_id: u32,
    description: &str,
    expected: &str,
    status: StepStatus,
    result: &str,
) -> PlanStep {
    if let Some(step) = plan
        .steps
        .iter_mut()
        .find(|s| s.id == step_id && s.description == description)
    {
        step.status = status;
        step.result = Some(result.to_string());
        let step = step.clone();
        plan.updated_at = chrono::Utc::now();
        return step;
    }
    warn!(step_id, "step missing from plan slot, reporting outcome detached");
    let mut step = PlanStep::new(step_id, description, expected);
    step.status = status;
    step.result = Some(result.to_string());
    step
}

/// Leave the slot resumable after a cancelled run: the interrupted step
/// goes back to `Pending` and the plan returns to `Approved`, keeping the
/// completed prefix.
fn settle_cancelled(plan_slot: &Arc<Mutex<Option<Plan>>>, running_step: Option<u32>) {
    let mut slot = plan_slot.lock().unwrap();
    if let Some(plan) = slot.as_mut() {
        if let Some(step_id) = running_step {
            if let Some(step) = plan.steps.iter_mut().find(|s| s.id == step_id) {
                step.status = StepStatus::Pending;
                step.result = None;
            }
        }
        if plan.status == PlanStatus::Executing {
            plan.status = PlanStatus::Approved;
        }
    }
}
