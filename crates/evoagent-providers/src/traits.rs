use evoagent_domain::capability::LlmCapabilities;
use evoagent_domain::error::Result;
use evoagent_domain::stream::{BoxStream, StreamEvent};
use evoagent_domain::tool::{Message, ToolDefinition};

/// A provider-agnostic streaming chat request (spec §4.E).
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub tools: Vec<ToolDefinition>,
    pub system_prompt: Option<String>,
    /// Model override. `None` lets the provider use its configured default.
    pub model: Option<String>,
}

/// Trait every provider adapter implements: a single streaming call that
/// hides wire-format differences behind [`StreamEvent`].
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    fn capabilities(&self) -> &LlmCapabilities;

    fn provider_id(&self) -> &str;

    /// The fallback model to retry with when a "model not found" error is
    /// observed, if one is configured for this provider.
    fn fallback_model(&self) -> Option<&str> {
        None
    }
}
