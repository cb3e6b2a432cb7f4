use chrono::{DateTime, Utc};
use evoagent_domain::tool::ContentPart;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventRole {
    User,
    Assistant,
    Tool,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Text,
    ToolCall,
    ToolResult,
    Control,
}

/// The durable unit of conversation history (spec §3, Invariant 1-3).
/// Appended only by the Agent Turn Engine, never mutated after commit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationEvent {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub role: EventRole,
    pub kind: EventKind,
    /// Monotonic, dense, unique per thread (1-indexed).
    pub position: u64,
    /// Opaque structured payload whose shape depends on `kind`.
    pub content: serde_json::Value,
    /// Correlates a `tool_result` event with the `tool_call` event that
    /// produced it. `None` for non-tool events.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default = "default_true")]
    pub visible_to_model: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<Uuid>,
    /// Tag identifying which provider produced `content_blocks`, so a
    /// replay only uses the snapshot when the active provider matches.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_format: Option<String>,
    /// Verbatim content-block snapshot for lossless replay (spec §3,
    /// Invariant 4).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_blocks: Option<Vec<ContentPart>>,
    pub created_at: DateTime<Utc>,
}

fn default_true() -> bool {
    true
}

/// Payload shapes stored in `ConversationEvent::content`, by kind.
pub mod content {
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct TextContent {
        pub text: String,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ToolCallContent {
        pub tool_name: String,
        pub arguments: serde_json::Value,
        /// Opaque thought-signature metadata captured from the provider
        /// stream, if any. See `LlmCapabilities::requires_signed_tool_replay`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub signature: Option<serde_json::Value>,
    }

    #[derive(Debug, Clone, Serialize, Deserialize)]
    pub struct ToolResultContent {
        pub tool_name: String,
        pub envelope: serde_json::Value,
    }
}
