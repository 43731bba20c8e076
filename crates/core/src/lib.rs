//! Core domain types for Tiller — the shared vocabulary of the agent loop.
//!
//! Everything the orchestration crates agree on lives here: conversation
//! turns, the tool and model-client contracts, the event union emitted
//! toward the UI, plans, skills, cancellation, and the error taxonomy.

pub mod cancel;
pub mod client;
pub mod error;
pub mod event;
pub mod plan;
pub mod skill;
pub mod tool;
pub mod turn;

pub use cancel::CancellationToken;
pub use client::{
    ChatMessage, ChatRole, ChunkStream, ContentPart, MessageBody, ModelClient, ToolCallOptions,
    ToolCallRequest, ToolCompletion,
};
pub use error::{ClientError, Error, Result, StoreError, ToolError};
pub use event::AgentEvent;
pub use plan::{Plan, PlanStatus, PlanStep, StepStatus};
pub use skill::{Skill, SkillMatch, SkillProvider};
pub use tool::{
    ItemType, ParamType, Tool, ToolParameter, ToolRegistry, ToolResult, ToolSchema,
};
pub use turn::{ImageAttachment, Role, ToolCallRecord, Turn};
