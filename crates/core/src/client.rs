//! ModelClient trait — the abstraction over the remote language model.
//!
//! The core consumes the model through two calls: a streaming text
//! completion and a tool-calling completion. Everything else (transport,
//! authentication, vendor format) lives behind the trait.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::ClientError;
use crate::tool::ToolSchema;
use crate::turn::{ImageAttachment, Role, Turn};

/// The role of a wire-format chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    System,
    User,
    Assistant,
    /// A tool execution result fed back to the model
    Tool,
}

/// One part of a multi-part message body (image turns export as parts).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    Image { mime_type: String, data: String },
}

/// The body of a chat message: plain text, or ordered parts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageBody {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl MessageBody {
    /// The text portion of the body (parts concatenated).
    pub fn text(&self) -> String {
        match self {
            MessageBody::Text(t) => t.clone(),
            MessageBody::Parts(parts) => parts
                .iter()
                .filter_map(|p| match p {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::Image { .. } => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// A chat message in the form the model client consumes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub body: MessageBody,

    /// Tool calls requested by the assistant (when echoing one back)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCallRequest>,

    /// If this is a tool result, which call it responds to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            body: MessageBody::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            body: MessageBody::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            body: MessageBody::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    pub fn assistant_with_calls(content: impl Into<String>, calls: Vec<ToolCallRequest>) -> Self {
        Self {
            role: ChatRole::Assistant,
            body: MessageBody::Text(content.into()),
            tool_calls: calls,
            tool_call_id: None,
        }
    }

    pub fn tool_result(call_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Tool,
            body: MessageBody::Text(content.into()),
            tool_calls: Vec::new(),
            tool_call_id: Some(call_id.into()),
        }
    }

    /// A user message with image parts first, then text — the export shape
    /// for turns carrying attachments.
    pub fn user_with_images(content: impl Into<String>, images: &[ImageAttachment]) -> Self {
        let mut parts: Vec<ContentPart> = images
            .iter()
            .map(|img| ContentPart::Image {
                mime_type: img.mime_type.clone(),
                data: img.data.clone(),
            })
            .collect();
        parts.push(ContentPart::Text {
            text: content.into(),
        });
        Self {
            role: ChatRole::User,
            body: MessageBody::Parts(parts),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Convert a conversation turn to its wire-format message.
    pub fn from_turn(turn: &Turn) -> Self {
        match turn.role {
            Role::User if !turn.images.is_empty() => {
                Self::user_with_images(turn.content.clone(), &turn.images)
            }
            Role::User => Self::user(turn.content.clone()),
            Role::Assistant => Self::assistant(turn.content.clone()),
            Role::System => Self::system(turn.content.clone()),
        }
    }
}

/// A tool call requested by the model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Unique ID for this call (matches the provider's tool_call id)
    pub id: String,

    /// Name of the tool to invoke
    pub name: String,

    /// Arguments as a JSON string, exactly as the model produced them
    pub arguments: String,
}

impl ToolCallRequest {
    /// Parse the argument string, degrading to an empty object on failure.
    pub fn parsed_arguments(&self) -> serde_json::Value {
        serde_json::from_str(&self.arguments)
            .unwrap_or_else(|_| serde_json::Value::Object(serde_json::Map::new()))
    }
}

/// The result of a tool-calling completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCompletion {
    /// Free text accompanying the response, if any
    #[serde(default)]
    pub content: Option<String>,

    /// Tool calls the model requested, in order
    #[serde(default)]
    pub tool_calls: Vec<ToolCallRequest>,

    /// Provider finish reason ("stop", "tool_calls", ...)
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// Options for a tool-calling completion.
#[derive(Debug, Clone, Default)]
pub struct ToolCallOptions {
    /// Tool schemas to attach
    pub tools: Vec<ToolSchema>,

    /// Tool choice directive ("auto" when empty)
    pub tool_choice: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,
}

/// A receiver of streamed text chunks. Finite; must be drained or dropped.
pub type ChunkStream = mpsc::Receiver<Result<String, ClientError>>;

/// The model client contract the core consumes.
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// A human-readable name for this client (e.g., "openai", "scripted").
    fn name(&self) -> &str;

    /// Whether the backing API supports native tool-calling. When false,
    /// the orchestrator falls back to the free-text ReAct strategy.
    fn supports_native_tools(&self) -> bool;

    /// Issue a streaming text completion. The returned stream is finite and
    /// not restartable.
    async fn stream_complete(
        &self,
        messages: Vec<ChatMessage>,
    ) -> Result<ChunkStream, ClientError>;

    /// Issue a tool-calling completion (non-streaming).
    async fn complete_with_tools(
        &self,
        messages: Vec<ChatMessage>,
        options: ToolCallOptions,
    ) -> Result<ToolCompletion, ClientError>;
}
