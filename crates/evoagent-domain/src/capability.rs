use serde::{Deserialize, Serialize};

/// Capabilities advertised by a {provider, model} pair. The provider
/// registry uses these to resolve roles rather than hardcoding provider
/// names.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmCapabilities {
    pub supports_tools: ToolSupport,
    pub supports_streaming: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window_tokens: Option<u32>,
    /// Whether a historical tool call from this provider can only be
    /// replayed if its thought-signature metadata is present; when true
    /// and the signature is missing, the message-view builder downgrades
    /// the tool call to a text placeholder rather than sending an
    /// unverifiable tool_use block back to the provider.
    #[serde(default)]
    pub requires_signed_tool_replay: bool,
}

impl Default for LlmCapabilities {
    fn default() -> Self {
        Self {
            supports_tools: ToolSupport::None,
            supports_streaming: false,
            context_window_tokens: None,
            requires_signed_tool_replay: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolSupport {
    None,
    Basic,
    StrictJson,
}

/// Role a provider may be assigned in config (`[roles.default]`, etc).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelRole {
    Default,
    Summarizer,
}
