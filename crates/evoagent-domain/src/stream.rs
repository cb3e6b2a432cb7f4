use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// A boxed async stream, used for provider streaming responses.
pub type BoxStream<'a, T> = Pin<Box<dyn futures_core::Stream<Item = T> + Send + 'a>>;

/// Events emitted during a provider stream. The Agent Turn Engine
/// forwards `Thinking`/`Token` to the Event Emitter as they arrive and
/// accumulates `ToolCall*` into complete `ToolCall`s.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum StreamEvent {
    /// A reasoning/thinking token.
    #[serde(rename = "thinking")]
    Thinking { text: String },

    /// A visible text token.
    #[serde(rename = "token")]
    Token { text: String },

    /// A tool-use block has started.
    #[serde(rename = "tool_call_started")]
    ToolCallStarted { call_id: String, tool_name: String },

    /// Incremental tool-call argument JSON fragment.
    #[serde(rename = "tool_call_delta")]
    ToolCallDelta { call_id: String, delta: String },

    /// A tool-use block finished with complete arguments.
    #[serde(rename = "tool_call_finished")]
    ToolCallFinished {
        call_id: String,
        tool_name: String,
        arguments: serde_json::Value,
        /// Opaque thought-signature metadata the provider attached to this
        /// tool call, if any. Carried through unchanged; see
        /// `LlmCapabilities::requires_signed_tool_replay`.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<serde_json::Value>,
    },

    /// Stream complete.
    #[serde(rename = "done")]
    Done {
        usage: Option<Usage>,
        finish_reason: Option<String>,
    },

    /// Transport/provider-level error.
    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Per-provider replay hints and bookkeeping returned alongside a
/// finished stream (stop reason, model actually used, token counts).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderState {
    pub model: String,
    pub stop_reason: Option<String>,
    pub usage: Usage,
}
