//! The orchestrator: one processed message end to end.
//!
//! `process_message` appends the user turn, runs the budget guard, matches
//! skills, picks a strategy, and returns a receiver of `AgentEvent`s. Two
//! tasks are spawned per message: the strategy task, and a processing task
//! that pumps strategy events to the caller while folding them into the
//! conversation (tool observations and the final answer become turns).
//! The processing task is the only writer of conversation state; on a
//! cancelled run it also retracts the trailing unanswered user turn so the
//! stored history never ends with a question nobody answered.

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use tiller_core::cancel::CancellationToken;
use tiller_core::client::ModelClient;
use tiller_core::event::AgentEvent;
use tiller_core::plan::{Plan, PlanStatus};
use tiller_core::skill::SkillProvider;
use tiller_core::tool::ToolRegistry;
use tiller_core::turn::{ImageAttachment, Role, ToolCallRecord, Turn};

use crate::budget::{self, CostEstimator, HeuristicEstimator};
use crate::conversation::{ConversationState, EXPORT_WINDOW_UNITS, TRUNCATE_RESERVE_UNITS};
use crate::retry::{self, RetryPolicy};
use crate::strategies::direct::DirectChat;
use crate::strategies::native::NativeToolLoop;
use crate::strategies::plan::PlanExecute;
use crate::strategies::react::ReactLoop;
use crate::strategies::{collect_text, StrategyContext};

/// Fraction of the model limit at which the budget guard truncates.
pub const BUDGET_GUARD_THRESHOLD: f64 = 0.85;

/// How the orchestrator should approach a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    /// Answer directly or via tool loops, chosen per message.
    React,
    /// Synthesize a plan first, then execute it step by step.
    Plan,
}

/// Coarse lifecycle state, for UI affordances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentState {
    Idle,
    Thinking,
    Acting,
    Planning,
}

/// Action keywords suggesting the message needs tools rather than talk.
/// English and Chinese, matched case-insensitively as substrings.
const TOOL_KEYWORDS: &[&str] = &[
    "run", "execute", "create", "delete", "install", "build", "compile", "test",
    "search", "list", "read the file", "write", "rename", "refactor", "command",
    "directory", "terminal", "运行", "执行", "创建", "删除", "安装", "构建",
    "编译", "测试", "搜索", "列出", "读取", "写入", "重命名", "重构", "命令",
    "目录", "终端", "文件",
];

/// Whether a message likely needs tool execution.
///
/// Checked in order: a matched skill implies tool work; host-contributed
/// tools imply the editor expects tool use; otherwise the keyword list
/// decides. Pure so it can be tested without a runtime.
pub fn decide_tool_need(text: &str, skill_matched: bool, external_tools: usize) -> bool {
    if skill_matched {
        return true;
    }
    if external_tools > 0 {
        return true;
    }
    let lower = text.to_lowercase();
    TOOL_KEYWORDS.iter().any(|k| lower.contains(k))
}

pub struct Orchestrator {
    client: Arc<dyn ModelClient>,
    tools: Arc<ToolRegistry>,
    skills: Option<Arc<dyn SkillProvider>>,
    conversation: Arc<tokio::sync::Mutex<ConversationState>>,
    cancel: Mutex<CancellationToken>,
    plan_slot: Arc<Mutex<Option<Plan>>>,
    state: Arc<Mutex<AgentState>>,
    /// Tools contributed by the embedding host, beyond the built-in set.
    external_tools: usize,
    budget_threshold: f64,
}

impl Orchestrator {
    pub fn new(
        client: Arc<dyn ModelClient>,
        tools: Arc<ToolRegistry>,
        system_prompt: impl Into<String>,
        model: impl Into<String>,
    ) -> Self {
        let estimator: Arc<dyn CostEstimator> = Arc::new(HeuristicEstimator);
        let conversation = ConversationState::new(system_prompt, model, estimator);
        Self {
            client,
            tools,
            skills: None,
            conversation: Arc::new(tokio::sync::Mutex::new(conversation)),
            cancel: Mutex::new(CancellationToken::new()),
            plan_slot: Arc::new(Mutex::new(None)),
            state: Arc::new(Mutex::new(AgentState::Idle)),
            external_tools: 0,
            budget_threshold: BUDGET_GUARD_THRESHOLD,
        }
    }

    pub fn with_skills(mut self, skills: Arc<dyn SkillProvider>) -> Self {
        self.skills = Some(skills);
        self
    }

    pub fn with_external_tools(mut self, count: usize) -> Self {
        self.external_tools = count;
        self
    }

    pub fn with_budget_threshold(mut self, threshold: f64) -> Self {
        self.budget_threshold = threshold;
        self
    }

    /// Restore a previously stored history.
    pub async fn restore_turns(&self, id: impl Into<String>, turns: Vec<Turn>) {
        let mut conv = self.conversation.lock().await;
        conv.id = id.into();
        conv.set_turns(turns);
    }

    pub async fn conversation_id(&self) -> String {
        self.conversation.lock().await.id.clone()
    }

    /// Snapshot of the turn history.
    pub async fn turns(&self) -> Vec<Turn> {
        self.conversation.lock().await.turns().to_vec()
    }

    pub fn state(&self) -> AgentState {
        *self.state.lock().unwrap()
    }

    /// The plan from the most recent plan-mode run, if any.
    pub fn current_plan(&self) -> Option<Plan> {
        self.plan_slot.lock().unwrap().clone()
    }

    /// Replace the unfinished tail of the current plan. Completed steps
    /// stay; replacements are renumbered to continue the sequence. Rejected
    /// while the plan is still executing: re-planning is for a settled
    /// plan, and a mid-run swap would pull steps out from under the runner.
    pub fn modify_plan(&self, new_steps: Vec<(String, String)>) -> bool {
        let mut slot = self.plan_slot.lock().unwrap();
        match slot.as_mut() {
            Some(plan) if plan.status != PlanStatus::Executing => {
                plan.modify(new_steps);
                true
            }
            _ => false,
        }
    }

    /// Request cancellation of the in-flight message, if any.
    pub fn cancel(&self) {
        self.cancel.lock().unwrap().cancel();
    }

    /// Compress older history into a summary turn, keeping the most recent
    /// `keep_recent` turns verbatim. Returns whether anything was
    /// summarized.
    pub async fn summarize(&self, keep_recent: usize) -> Result<bool, tiller_core::Error> {
        let partition = {
            let conv = self.conversation.lock().await;
            conv.partition_for_summary(keep_recent)
        };
        let Some(partition) = partition else {
            return Ok(false);
        };

        let transcript = ConversationState::transcript_for_summary(&partition);
        let messages = vec![
            tiller_core::ChatMessage::system(
                "Summarize the conversation below in a few sentences. Keep decisions, \
                 file names, and unresolved questions. Output only the summary.",
            ),
            tiller_core::ChatMessage::user(transcript),
        ];

        let (tx, _rx) = mpsc::channel(8);
        let ctx = StrategyContext {
            client: self.client.clone(),
            tools: self.tools.clone(),
            events: tx,
            cancel: CancellationToken::new(),
        };
        let summary = collect_text(&ctx, &messages, RetryPolicy::model_call())
            .await
            .map_err(tiller_core::Error::from)?;

        let mut conv = self.conversation.lock().await;
        conv.apply_summary(summary, partition.to_keep);
        info!(conversation = %conv.id, turns = conv.len(), "history summarized");
        Ok(true)
    }

    /// Process one user message. Returns a receiver of the events this
    /// message produces; the channel closes when processing finishes.
    pub async fn process_message(
        &self,
        text: impl Into<String>,
        images: Vec<ImageAttachment>,
        mode: AgentMode,
    ) -> mpsc::Receiver<AgentEvent> {
        let text = text.into();
        let token = CancellationToken::new();
        *self.cancel.lock().unwrap() = token.clone();

        let (outer_tx, outer_rx) = mpsc::channel(128);

        // Skill matching happens on the raw utterance, before export.
        let matches = self
            .skills
            .as_ref()
            .map(|s| s.match_skills(&text))
            .unwrap_or_default();
        let skill_prompt = match (&self.skills, matches.is_empty()) {
            (Some(skills), false) => Some(skills.skills_prompt(&matches)),
            _ => None,
        };

        let needs_tools = !self.tools.is_empty()
            && decide_tool_need(&text, !matches.is_empty(), self.external_tools);

        // Append the user turn, run the budget guard, take the export.
        let (export, usage_event, dropped) = {
            let mut conv = self.conversation.lock().await;
            let turn = if images.is_empty() {
                Turn::user(&text)
            } else {
                Turn::user_with_images(&text, images)
            };
            conv.append(turn);

            let mut dropped = 0;
            if budget::is_near(conv.total_cost(), &conv.model, self.budget_threshold) {
                dropped = conv.auto_truncate(TRUNCATE_RESERVE_UNITS);
            }

            let current = conv.total_cost();
            let limit = budget::model_limit(&conv.model);
            let usage_event = AgentEvent::TokenUsage {
                current,
                limit,
                remaining: limit.saturating_sub(current),
                percentage: (current as f32 / limit as f32) * 100.0,
            };

            let mut export = conv.windowed_export(EXPORT_WINDOW_UNITS);
            let date_line =
                format!("Current date: {}", chrono::Utc::now().format("%Y-%m-%d"));
            match export.first_mut() {
                Some(m) if m.role == tiller_core::ChatRole::System => {
                    if let tiller_core::MessageBody::Text(text) = &mut m.body {
                        text.push('\n');
                        text.push_str(&date_line);
                    }
                }
                _ => export.insert(0, tiller_core::ChatMessage::system(date_line)),
            }
            if let Some(prompt) = &skill_prompt {
                let at = export
                    .iter()
                    .position(|m| m.role != tiller_core::ChatRole::System)
                    .unwrap_or(export.len());
                export.insert(at, tiller_core::ChatMessage::system(prompt.clone()));
            }
            (export, usage_event, dropped)
        };

        for m in &matches {
            let _ = outer_tx
                .send(AgentEvent::Skill {
                    name: m.skill.name.clone(),
                    description: m.skill.description.clone(),
                })
                .await;
        }
        if dropped > 0 {
            let _ = outer_tx
                .send(AgentEvent::Thought {
                    content: format!(
                        "Trimmed {dropped} earlier turns to stay within the context window."
                    ),
                })
                .await;
        }
        let _ = outer_tx.send(usage_event).await;

        *self.state.lock().unwrap() = match mode {
            AgentMode::Plan => AgentState::Planning,
            AgentMode::React => AgentState::Thinking,
        };
        debug!(
            mode = ?mode,
            needs_tools,
            native = self.client.supports_native_tools(),
            skills = matches.len(),
            "dispatching message"
        );

        let (inner_tx, inner_rx) = mpsc::channel(128);
        let ctx = StrategyContext {
            client: self.client.clone(),
            tools: self.tools.clone(),
            events: inner_tx,
            cancel: token.clone(),
        };

        let plan_slot = self.plan_slot.clone();
        let native = self.client.supports_native_tools();
        let strategy_handle = tokio::spawn(async move {
            match mode {
                AgentMode::Plan => {
                    PlanExecute::new().run(&ctx, export, &text, plan_slot).await
                }
                AgentMode::React if !needs_tools => DirectChat::new().run(&ctx, export).await,
                AgentMode::React if native => NativeToolLoop::new().run(&ctx, export).await,
                AgentMode::React => ReactLoop::new().run(&ctx, export).await,
            }
        });

        // The processing task: pump events outward, fold them into turns.
        let conversation = self.conversation.clone();
        let state = self.state.clone();
        tokio::spawn(async move {
            let mut inner_rx = inner_rx;
            let mut pending_action: Option<(String, Value)> = None;
            let mut answered = false;

            while let Some(event) = inner_rx.recv().await {
                match &event {
                    AgentEvent::Action { tool, params } => {
                        *state.lock().unwrap() = AgentState::Acting;
                        pending_action = Some((tool.clone(), params.clone()));
                    }
                    AgentEvent::Observation { result } => {
                        *state.lock().unwrap() = AgentState::Thinking;
                        if let Some((tool_name, parameters)) = pending_action.take() {
                            conversation.lock().await.append(Turn::tool_record(
                                ToolCallRecord {
                                    tool_name,
                                    parameters,
                                    result: result.clone(),
                                },
                            ));
                        }
                    }
                    AgentEvent::Answer { content } => {
                        conversation.lock().await.append(Turn::assistant(content.clone()));
                        answered = true;
                    }
                    _ => {}
                }

                let event = match event {
                    AgentEvent::Error { message } => {
                        let message = match retry::recovery_hint(&message) {
                            Some(hint) => format!("{message}\nHint: {hint}"),
                            None => message,
                        };
                        AgentEvent::Error { message }
                    }
                    other => other,
                };
                // A departed caller doesn't stop bookkeeping.
                let _ = outer_tx.send(event).await;
            }

            if let Err(err) = strategy_handle.await {
                warn!(error = %err, "strategy task panicked");
            }

            if token.is_cancelled() && !answered {
                let mut conv = conversation.lock().await;
                let trailing_user = conv
                    .last()
                    .map(|t| t.role == Role::User)
                    .unwrap_or(false);
                if trailing_user {
                    conv.remove_last();
                    debug!(conversation = %conv.id, "retracted unanswered user turn after cancel");
                }
            }
            *state.lock().unwrap() = AgentState::Idle;
        });

        outer_rx
    }
}
