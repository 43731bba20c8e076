//! Turn and conversation-log domain types.
//!
//! A `Turn` is one logged entry in a conversation: what the user sent, what
//! the assistant answered, or a system note. Turns are immutable once
//! appended — the only mutations the log supports are truncate-oldest and
//! replace-prefix-with-summary, both owned by the conversation state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tool::ToolResult;

/// The role of a turn's author.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The end user
    User,
    /// The AI assistant
    Assistant,
    /// System instructions or synthetic entries (summaries)
    System,
}

/// An image attached to a turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageAttachment {
    /// MIME type, e.g. "image/png"
    pub mime_type: String,

    /// Base64-encoded payload
    pub data: String,
}

/// A record of one tool invocation, attached to the assistant turn that
/// reported it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCallRecord {
    /// Name of the tool that was invoked
    pub tool_name: String,

    /// The parameters it was invoked with
    pub parameters: serde_json::Value,

    /// The outcome of the execution
    pub result: ToolResult,
}

/// A single entry in the conversation log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Turn {
    /// Unique turn ID
    pub id: String,

    /// Who authored this turn
    pub role: Role,

    /// The text content
    pub content: String,

    /// Timestamp
    pub timestamp: DateTime<Utc>,

    /// Attached images, if any
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<ImageAttachment>,

    /// Attached tool-invocation record, if this turn reports one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call: Option<ToolCallRecord>,

    /// Whether this is a synthetic summary turn produced by compaction
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub summary: bool,
}

impl Turn {
    fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            timestamp: Utc::now(),
            images: Vec::new(),
            tool_call: None,
            summary: false,
        }
    }

    /// Create a new user turn.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    /// Create a user turn with image attachments.
    pub fn user_with_images(content: impl Into<String>, images: Vec<ImageAttachment>) -> Self {
        let mut turn = Self::new(Role::User, content);
        turn.images = images;
        turn
    }

    /// Create a new assistant turn.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create an assistant turn recording a tool invocation.
    pub fn tool_record(record: ToolCallRecord) -> Self {
        let content = format!(
            "[tool: {}] {}",
            record.tool_name,
            if record.result.success {
                record.result.output.as_str()
            } else {
                record.result.error.as_deref().unwrap_or("failed")
            }
        );
        let mut turn = Self::new(Role::Assistant, content);
        turn.tool_call = Some(record);
        turn
    }

    /// Create a new system turn.
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    /// Create a synthetic summary turn replacing a compacted prefix.
    pub fn summary(content: impl Into<String>) -> Self {
        let mut turn = Self::new(Role::System, content);
        turn.summary = true;
        turn
    }
}
