//! OpenAI-compatible adapter.
//!
//! Works with OpenAI, Azure OpenAI, Ollama, vLLM, and any other endpoint
//! that follows the OpenAI chat completions contract.

use crate::traits::{ChatRequest, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use evoagent_domain::capability::{LlmCapabilities, ToolSupport};
use evoagent_domain::config::ProviderConfig;
use evoagent_domain::error::{Error, Result};
use evoagent_domain::stream::{BoxStream, StreamEvent, Usage};
use evoagent_domain::tool::{ContentPart, Message, MessageContent, Role, ToolDefinition};
use serde_json::Value;
use std::collections::HashMap;

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    default_model: String,
    fallback_model: Option<String>,
    capabilities: LlmCapabilities,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    pub fn from_config(cfg: &ProviderConfig, fallback_model: Option<String>) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.id, cfg.api_key_env.as_deref())?;
        let default_model = cfg.model.clone().unwrap_or_else(|| "gpt-4o".into());
        let base_url = cfg
            .base_url
            .clone()
            .unwrap_or_else(|| "https://api.openai.com".into());

        let capabilities = LlmCapabilities {
            supports_tools: ToolSupport::StrictJson,
            supports_streaming: true,
            context_window_tokens: Some(128_000),
            requires_signed_tool_replay: false,
        };

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: cfg.id.clone(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            default_model,
            fallback_model,
            capabilities,
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        self.client
            .post(url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
    }

    fn build_chat_body(&self, req: &ChatRequest) -> Value {
        let model = req.model.clone().unwrap_or_else(|| self.default_model.clone());
        let mut messages: Vec<Value> = Vec::new();
        if let Some(system) = &req.system_prompt {
            messages.push(serde_json::json!({"role": "system", "content": system}));
        }
        messages.extend(req.messages.iter().map(msg_to_openai));

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        body
    }
}

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => tool_result_to_openai(msg),
        Role::Assistant => assistant_to_openai(msg),
        _ => {
            let text = msg.content.text().unwrap_or_default().to_string();
            serde_json::json!({"role": role_to_str(msg.role), "content": text})
        }
    }
}

fn assistant_to_openai(msg: &Message) -> Value {
    let mut obj = serde_json::json!({"role": "assistant"});
    let mut text_parts: Vec<String> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => text_parts.push(t.clone()),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text.clone()),
                    ContentPart::ToolUse { id, name, input } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {"name": name, "arguments": input.to_string()},
                        }));
                    }
                    _ => {}
                }
            }
        }
    }

    obj["content"] = if text_parts.is_empty() {
        Value::Null
    } else {
        Value::String(text_parts.join("\n"))
    };
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_result_to_openai(msg: &Message) -> Value {
    match &msg.content {
        MessageContent::Parts(parts) => {
            for part in parts {
                if let ContentPart::ToolResult { tool_use_id, content, .. } = part {
                    return serde_json::json!({
                        "role": "tool",
                        "tool_call_id": tool_use_id,
                        "content": content,
                    });
                }
            }
            serde_json::json!({"role": "tool", "tool_call_id": "", "content": ""})
        }
        MessageContent::Text(t) => serde_json::json!({"role": "tool", "tool_call_id": "", "content": t}),
    }
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.input_schema,
        }
    })
}

#[derive(Default)]
struct PendingCall {
    id: String,
    name: String,
}

#[derive(Default)]
struct StreamState {
    pending: HashMap<u64, PendingCall>,
    started: std::collections::HashSet<u64>,
    usage: Option<Usage>,
}

fn parse_openai_sse(data: &str, state: &mut StreamState) -> Vec<Result<StreamEvent>> {
    let mut events = Vec::new();
    if data == "[DONE]" {
        events.push(Ok(StreamEvent::Done {
            usage: state.usage.clone(),
            finish_reason: Some("stop".into()),
        }));
        return events;
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            events.push(Err(Error::Json(e)));
            return events;
        }
    };

    if let Some(usage) = v.get("usage") {
        if let (Some(p), Some(c)) = (
            usage.get("prompt_tokens").and_then(Value::as_u64),
            usage.get("completion_tokens").and_then(Value::as_u64),
        ) {
            state.usage = Some(Usage {
                prompt_tokens: p as u32,
                completion_tokens: c as u32,
                total_tokens: (p + c) as u32,
            });
        }
    }

    let Some(choice) = v.get("choices").and_then(|c| c.as_array()).and_then(|a| a.first()) else {
        return events;
    };
    let Some(delta) = choice.get("delta") else {
        return events;
    };

    if let Some(content) = delta.get("content").and_then(Value::as_str) {
        if !content.is_empty() {
            events.push(Ok(StreamEvent::Token { text: content.to_string() }));
        }
    }

    if let Some(tool_calls) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tool_calls {
            let idx = tc.get("index").and_then(Value::as_u64).unwrap_or(0);
            let func = tc.get("function");
            let name = func.and_then(|f| f.get("name")).and_then(Value::as_str);
            let id = tc.get("id").and_then(Value::as_str);

            if !state.started.contains(&idx) {
                let call_id = id.unwrap_or_default().to_string();
                let tool_name = name.unwrap_or_default().to_string();
                events.push(Ok(StreamEvent::ToolCallStarted {
                    call_id: call_id.clone(),
                    tool_name: tool_name.clone(),
                }));
                state.started.insert(idx);
                state.pending.insert(idx, PendingCall { id: call_id, name: tool_name });
            }

            if let Some(args) = func.and_then(|f| f.get("arguments")).and_then(Value::as_str) {
                if let Some(p) = state.pending.get(&idx) {
                    events.push(Ok(StreamEvent::ToolCallDelta {
                        call_id: p.id.clone(),
                        delta: args.to_string(),
                    }));
                }
            }
        }
    }

    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        let normalized = match reason {
            "tool_calls" => "tool_calls",
            "stop" => "stop",
            other => other,
        };
        // Finish any pending tool calls: OpenAI streams raw argument deltas
        // rather than parsed values, so ToolCallFinished carries Null and
        // `stream_turn` falls back to the accumulated fragments.
        for (_, p) in state.pending.drain() {
            events.push(Ok(StreamEvent::ToolCallFinished {
                call_id: p.id,
                tool_name: p.name,
                arguments: Value::Null,
                signature: None,
            }));
        }
        events.push(Ok(StreamEvent::Done {
            usage: state.usage.clone(),
            finish_reason: Some(normalized.to_string()),
        }));
    }

    events
}

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat_stream(&self, req: ChatRequest) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/v1/chat/completions", self.base_url);
        let body = self.build_chat_body(&req);
        let provider_id = self.id.clone();

        tracing::debug!(provider = %self.id, url = %url, "openai-compat stream request");

        let resp = self.authed_post(&url).json(&body).send().await.map_err(from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: provider_id,
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        let mut state = StreamState::default();
        Ok(crate::sse::sse_response_stream(resp, move |data| {
            parse_openai_sse(data, &mut state)
        }))
    }

    fn capabilities(&self) -> &LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn fallback_model(&self) -> Option<&str> {
        self.fallback_model.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn done_sentinel_yields_done_event() {
        let mut state = StreamState::default();
        let events = parse_openai_sse("[DONE]", &mut state);
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0].as_ref().unwrap(), StreamEvent::Done { .. }));
    }

    #[test]
    fn text_delta_yields_token() {
        let mut state = StreamState::default();
        let events = parse_openai_sse(
            r#"{"choices":[{"delta":{"content":"hi"}}]}"#,
            &mut state,
        );
        assert_eq!(events.len(), 1);
        match events[0].as_ref().unwrap() {
            StreamEvent::Token { text } => assert_eq!(text, "hi"),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
