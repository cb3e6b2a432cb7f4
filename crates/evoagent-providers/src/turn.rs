//! `stream_turn` — the single streaming call the Agent Turn Engine drives
//! (spec §4.E). Consumes a provider's event stream, forwards thinking and
//! visible text tokens as they arrive, and assembles tool-use blocks from
//! accumulated JSON fragments.

use evoagent_domain::error::{Error, Result};
use evoagent_domain::stream::{ProviderState, StreamEvent};
use evoagent_domain::tool::ToolCall;
use futures_util::StreamExt;
use serde_json::Value;
use std::collections::HashMap;

use crate::traits::{ChatRequest, LlmProvider};

#[derive(Debug, Clone, Default)]
pub struct StreamResult {
    pub text: String,
    pub thinking: String,
    pub tool_calls: Vec<ToolCall>,
    pub provider_state: ProviderState,
}

#[derive(Default)]
struct PendingToolCall {
    tool_name: String,
    fragments: String,
}

/// Drive one streaming turn, forwarding thinking/text tokens via the given
/// callbacks as they arrive. On a "model not found" error, retries once
/// against `provider.fallback_model()` if one is configured.
pub async fn stream_turn(
    provider: &dyn LlmProvider,
    req: ChatRequest,
    mut on_thinking_token: impl FnMut(&str),
    mut on_text_token: impl FnMut(&str),
) -> Result<StreamResult> {
    match run_stream(provider, req.clone(), &mut on_thinking_token, &mut on_text_token).await {
        Ok(result) => Ok(result),
        Err(Error::Provider { message, .. }) if is_model_not_found(&message) => {
            let Some(fallback) = provider.fallback_model().map(str::to_owned) else {
                return Err(Error::Provider {
                    provider: provider.provider_id().to_string(),
                    message,
                });
            };
            tracing::warn!(
                provider = provider.provider_id(),
                from_model = ?req.model,
                to_model = %fallback,
                "model not found, retrying with fallback model"
            );
            let mut retry_req = req;
            retry_req.model = Some(fallback.clone());
            let mut result =
                run_stream(provider, retry_req, &mut on_thinking_token, &mut on_text_token).await?;
            result.provider_state.model = fallback;
            Ok(result)
        }
        Err(e) => Err(e),
    }
}

fn is_model_not_found(message: &str) -> bool {
    message.to_lowercase().contains("model not found")
}

async fn run_stream(
    provider: &dyn LlmProvider,
    req: ChatRequest,
    on_thinking_token: &mut impl FnMut(&str),
    on_text_token: &mut impl FnMut(&str),
) -> Result<StreamResult> {
    let mut stream = provider.chat_stream(req).await?;

    let mut text = String::new();
    let mut thinking = String::new();
    let mut pending: HashMap<String, PendingToolCall> = HashMap::new();
    let mut finished: Vec<ToolCall> = Vec::new();
    let mut provider_state = ProviderState::default();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Thinking { text: delta } => {
                on_thinking_token(&delta);
                thinking.push_str(&delta);
            }
            StreamEvent::Token { text: delta } => {
                on_text_token(&delta);
                text.push_str(&delta);
            }
            StreamEvent::ToolCallStarted { call_id, tool_name } => {
                pending.insert(
                    call_id,
                    PendingToolCall {
                        tool_name,
                        fragments: String::new(),
                    },
                );
            }
            StreamEvent::ToolCallDelta { call_id, delta } => {
                if let Some(entry) = pending.get_mut(&call_id) {
                    entry.fragments.push_str(&delta);
                }
            }
            StreamEvent::ToolCallFinished {
                call_id,
                tool_name,
                arguments,
                signature,
            } => {
                // `arguments` is already a parsed value in this event;
                // prefer it, falling back to the accumulated fragments
                // only if this variant was synthesized with a null value.
                let resolved = if arguments.is_null() {
                    pending
                        .get(&call_id)
                        .map(|p| parse_tool_arguments(&p.fragments))
                        .unwrap_or(Value::Null)
                } else {
                    arguments
                };
                pending.remove(&call_id);
                finished.push(ToolCall {
                    call_id,
                    tool_name,
                    arguments: resolved,
                    signature,
                });
            }
            StreamEvent::Done { usage, finish_reason } => {
                if let Some(u) = usage {
                    provider_state.usage = u;
                }
                provider_state.stop_reason = finish_reason;
            }
            StreamEvent::Error { message } => {
                return Err(Error::Provider {
                    provider: provider.provider_id().to_string(),
                    message,
                });
            }
        }
    }

    // Any tool call that started but never reached ToolCallFinished
    // (provider closed the stream mid-block) is finalized here from
    // whatever fragments accumulated.
    for (call_id, entry) in pending {
        finished.push(ToolCall {
            call_id,
            tool_name: entry.tool_name,
            arguments: parse_tool_arguments(&entry.fragments),
            signature: None,
        });
    }

    provider_state.model = provider.provider_id().to_string();

    Ok(StreamResult {
        text,
        thinking,
        tool_calls: finished,
        provider_state,
    })
}

/// Parse accumulated tool-call JSON fragments. Some providers emit two
/// concatenated JSON objects instead of one (observed in the wild); in
/// that case we parse only the first complete object. Malformed JSON
/// degrades to `{"raw": "..."}` rather than failing the whole turn.
fn parse_tool_arguments(fragments: &str) -> Value {
    if let Ok(value) = serde_json::from_str::<Value>(fragments) {
        return value;
    }
    let mut stream = serde_json::Deserializer::from_str(fragments).into_iter::<Value>();
    if let Some(Ok(value)) = stream.next() {
        return value;
    }
    serde_json::json!({ "raw": fragments })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_well_formed_json() {
        let v = parse_tool_arguments(r#"{"query": "senescence"}"#);
        assert_eq!(v["query"], "senescence");
    }

    #[test]
    fn parses_first_of_concatenated_objects() {
        let v = parse_tool_arguments(r#"{"a": 1}{"b": 2}"#);
        assert_eq!(v["a"], 1);
        assert!(v.get("b").is_none());
    }

    #[test]
    fn degrades_to_raw_on_malformed_json() {
        let v = parse_tool_arguments("not json at all {");
        assert_eq!(v["raw"], "not json at all {");
    }
}
