//! `TurnEngine::run_turn` — the bounded provider/tool loop of spec §4.F.

use std::sync::Arc;
use std::time::Duration;

use evoagent_domain::config::EngineConfig;
use evoagent_domain::envelope::{EnvelopeStatus, Lineage};
use evoagent_domain::error::{Error, Result};
use evoagent_domain::tool::ContentPart;
use evoagent_events::event::{content, EventKind, EventRole};
use evoagent_events::{ConversationEvent, EventStore, InvocationLedger, ToolInvocation};
use evoagent_providers::registry::ProviderRegistry;
use evoagent_providers::{stream_turn, ChatRequest, LlmProvider};
use evoagent_tools::{ArtifactStore, ToolRegistry};
use tokio_util::sync::CancellationToken;
use tracing::instrument;
use uuid::Uuid;

use crate::emitter::{EngineEvent, EventSink, SinkError};

const SYSTEM_PROMPT: &str = "You are a life-science evidence synthesis assistant. \
You retrieve, classify, score, and summarize biomedical evidence using the tools \
available to you; answer only from retrieved evidence and cite what you used.";

/// Everything one turn needs: the durable stores, the provider and tool
/// registries, and the engine's own tuning knobs.
pub struct TurnEngine {
    store: Arc<EventStore>,
    providers: Arc<ProviderRegistry>,
    tools: Arc<ToolRegistry>,
    artifacts: Arc<ArtifactStore>,
    invocations: Arc<InvocationLedger>,
    config: EngineConfig,
}

pub struct TurnInput {
    pub thread_id: Uuid,
    pub run_id: Uuid,
    pub provider_id: String,
    pub user_message: String,
    /// Cooperative cancellation signal (client disconnect / deadline).
    pub cancel: CancellationToken,
}

#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub text: String,
    pub iterations: u32,
}

impl TurnEngine {
    pub fn new(
        store: Arc<EventStore>,
        providers: Arc<ProviderRegistry>,
        tools: Arc<ToolRegistry>,
        artifacts: Arc<ArtifactStore>,
        invocations: Arc<InvocationLedger>,
        config: EngineConfig,
    ) -> Self {
        Self { store, providers, tools, artifacts, invocations, config }
    }

    #[instrument(skip(self, sink, input), fields(thread_id = %input.thread_id, run_id = %input.run_id))]
    pub async fn run_turn(&self, input: TurnInput, sink: &dyn EventSink) -> Result<TurnOutcome> {
        let TurnInput { thread_id, run_id, provider_id, user_message, cancel } = input;

        self.append_event(
            thread_id,
            EventRole::User,
            EventKind::Text,
            serde_json::to_value(content::TextContent { text: user_message }).unwrap(),
            None,
            None,
            None,
        );

        emit(sink, EngineEvent::Start { thread_id, run_id })?;

        let provider = self.providers.get(&provider_id).ok_or_else(|| {
            Error::Config(format!("no such provider '{provider_id}'"))
        })?;

        let turn_timeout = Duration::from_millis(self.config.turn_timeout_ms);
        let run = self.run_loop(thread_id, run_id, &provider_id, provider, sink, cancel);

        match tokio::time::timeout(turn_timeout, run).await {
            Ok(result) => result,
            Err(_) => Err(Error::Timeout(format!(
                "turn {run_id} exceeded {turn_timeout:?}"
            ))),
        }
    }

    async fn run_loop(
        &self,
        thread_id: Uuid,
        run_id: Uuid,
        provider_id: &str,
        provider: Arc<dyn evoagent_providers::LlmProvider>,
        sink: &dyn EventSink,
        cancel: CancellationToken,
    ) -> Result<TurnOutcome> {
        let mut segment_index: u32 = 0;

        for iteration in 0..self.config.max_iterations {
            if cancel.is_cancelled() {
                break;
            }

            let messages = evoagent_events::build_messages(
                &self.store,
                thread_id,
                provider_id,
                provider.capabilities().requires_signed_tool_replay,
            );
            let tools_def = self.tools.export_definitions();

            let req = ChatRequest {
                messages,
                tools: tools_def,
                system_prompt: Some(SYSTEM_PROMPT.to_string()),
                model: None,
            };

            let mut thinking_started = false;
            let mut segment_started = false;
            let this_segment = segment_index;

            let on_thinking_token = |delta: &str| {
                if delta.is_empty() {
                    return;
                }
                if !thinking_started {
                    thinking_started = true;
                    let _ = sink.emit(EngineEvent::ThinkingStart { thread_id, run_id, segment_index: this_segment });
                }
                let _ = sink.emit(EngineEvent::ThinkingToken {
                    thread_id,
                    run_id,
                    segment_index: this_segment,
                    text: delta.to_string(),
                });
            };
            let on_text_token = |delta: &str| {
                if delta.is_empty() {
                    return;
                }
                if !segment_started {
                    segment_started = true;
                    let _ = sink.emit(EngineEvent::SegmentStart { thread_id, run_id, segment_index: this_segment });
                }
                let _ = sink.emit(EngineEvent::SegmentToken {
                    thread_id,
                    run_id,
                    segment_index: this_segment,
                    text: delta.to_string(),
                });
            };

            let stream_result = tokio::select! {
                result = stream_turn(provider.as_ref(), req, on_thinking_token, on_text_token) => {
                    match result {
                        Ok(r) => r,
                        Err(e) => {
                            emit(sink, EngineEvent::Error {
                                thread_id,
                                run_id,
                                message: e.to_string(),
                            })?;
                            return Err(e);
                        }
                    }
                }
                _ = cancel.cancelled() => break,
            };

            if thinking_started {
                if !stream_result.thinking.is_empty() {
                    let title: String = stream_result.thinking.chars().take(80).collect();
                    emit(sink, EngineEvent::ThinkingTitle { thread_id, run_id, segment_index: this_segment, title })?;
                }
                emit(sink, EngineEvent::ThinkingEnd { thread_id, run_id, segment_index: this_segment })?;
            }
            if segment_started {
                emit(sink, EngineEvent::SegmentEnd { thread_id, run_id, segment_index: this_segment })?;
            }
            segment_index += 1;

            let message_id = Uuid::new_v4();
            let mut content_blocks = Vec::new();
            if !stream_result.thinking.is_empty() {
                content_blocks.push(ContentPart::Thinking { text: stream_result.thinking.clone() });
            }
            if !stream_result.text.is_empty() {
                content_blocks.push(ContentPart::Text { text: stream_result.text.clone() });
            }
            for call in &stream_result.tool_calls {
                content_blocks.push(ContentPart::ToolUse {
                    id: call.call_id.clone(),
                    name: call.tool_name.clone(),
                    input: call.arguments.clone(),
                });
            }

            let assistant_event = self.append_event(
                thread_id,
                EventRole::Assistant,
                EventKind::Text,
                serde_json::to_value(content::TextContent { text: stream_result.text.clone() }).unwrap(),
                None,
                Some(provider_id.to_string()),
                Some((content_blocks, message_id)),
            );

            if stream_result.tool_calls.is_empty() {
                emit(sink, EngineEvent::Complete { thread_id, run_id, text: stream_result.text.clone() })?;
                return Ok(TurnOutcome { text: stream_result.text, iterations: iteration + 1 });
            }

            for call in &stream_result.tool_calls {
                self.append_event(
                    thread_id,
                    EventRole::Assistant,
                    EventKind::ToolCall,
                    serde_json::to_value(content::ToolCallContent {
                        tool_name: call.tool_name.clone(),
                        arguments: call.arguments.clone(),
                        signature: call.signature.clone(),
                    })
                    .unwrap(),
                    Some(call.call_id.clone()),
                    None,
                    None,
                );
                self.invocations.record_pending(ToolInvocation::new(
                    call.call_id.clone(),
                    thread_id,
                    assistant_event.id,
                    call.tool_name.clone(),
                    call.arguments.clone(),
                ));
                emit(sink, EngineEvent::ToolStart {
                    thread_id,
                    run_id,
                    tool_use_id: call.call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    arguments: call.arguments.clone(),
                })?;
            }

            let envelopes = self
                .dispatch_tool_calls(thread_id, run_id, &stream_result.tool_calls, &cancel)
                .await;

            for (call, envelope) in stream_result.tool_calls.iter().zip(envelopes.into_iter()) {
                let is_error = envelope.status == EnvelopeStatus::Error;
                let envelope_json = serde_json::to_value(&envelope).unwrap_or(serde_json::Value::Null);

                let result_event = self.append_event(
                    thread_id,
                    EventRole::Tool,
                    EventKind::ToolResult,
                    serde_json::to_value(content::ToolResultContent {
                        tool_name: call.tool_name.clone(),
                        envelope: envelope_json.clone(),
                    })
                    .unwrap(),
                    Some(call.call_id.clone()),
                    None,
                    None,
                );
                self.invocations.complete(&call.call_id, result_event.id, is_error, envelope_json.clone());

                emit(sink, EngineEvent::ToolResult {
                    thread_id,
                    run_id,
                    tool_use_id: call.call_id.clone(),
                    tool_name: call.tool_name.clone(),
                    envelope: envelope_json,
                    is_error,
                })?;
            }
        }

        let text = format!("tool-iteration limit ({}) reached", self.config.max_iterations);
        self.append_event(
            thread_id,
            EventRole::Assistant,
            EventKind::Text,
            serde_json::to_value(content::TextContent { text: text.clone() }).unwrap(),
            None,
            None,
            None,
        );
        emit(sink, EngineEvent::Complete { thread_id, run_id, text: text.clone() })?;
        Ok(TurnOutcome { text, iterations: self.config.max_iterations as u32 })
    }

    /// Dispatch every tool call for the current provider step. Results are
    /// returned in the same order as `calls` regardless of completion
    /// order or `parallel_tool_dispatch` (spec §5): positions assigned by
    /// `append_event` must stay reproducible.
    async fn dispatch_tool_calls(
        &self,
        thread_id: Uuid,
        run_id: Uuid,
        calls: &[evoagent_domain::tool::ToolCall],
        cancel: &CancellationToken,
    ) -> Vec<evoagent_domain::envelope::ToolEnvelope> {
        let tool_timeout = Duration::from_millis(self.config.tool_timeout_ms);

        let dispatch_one = |call: &evoagent_domain::tool::ToolCall| {
            let lineage = Lineage {
                thread_id,
                run_id,
                tool_use_id: call.call_id.clone(),
            };
            let tool_name = call.tool_name.clone();
            let arguments = call.arguments.clone();
            async move {
                let fut = self.tools.dispatch(&tool_name, arguments, lineage.clone(), &self.artifacts);
                tokio::select! {
                    result = tokio::time::timeout(tool_timeout, fut) => {
                        match result {
                            Ok(envelope) => envelope,
                            Err(_) => timed_out_envelope(&tool_name, lineage),
                        }
                    }
                    _ = cancel.cancelled() => canceled_envelope(&tool_name, lineage),
                }
            }
        };

        if self.config.parallel_tool_dispatch {
            let futures = calls.iter().map(dispatch_one);
            futures_util::future::join_all(futures).await
        } else {
            let mut out = Vec::with_capacity(calls.len());
            for call in calls {
                out.push(dispatch_one(call).await);
            }
            out
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn append_event(
        &self,
        thread_id: Uuid,
        role: EventRole,
        kind: EventKind,
        content: serde_json::Value,
        tool_call_id: Option<String>,
        provider_format: Option<String>,
        content_blocks_and_message: Option<(Vec<ContentPart>, Uuid)>,
    ) -> ConversationEvent {
        let (content_blocks, message_id) = match content_blocks_and_message {
            Some((blocks, id)) => (Some(blocks), Some(id)),
            None => (None, None),
        };
        let event = ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role,
            kind,
            position: 0,
            content,
            tool_call_id,
            visible_to_model: true,
            message_id,
            provider_format,
            content_blocks,
            created_at: chrono::Utc::now(),
        };
        self.store
            .append_event(event)
            .expect("event store append is infallible for a well-formed event")
    }
}

fn emit(sink: &dyn EventSink, event: EngineEvent) -> Result<()> {
    match sink.emit(event) {
        Ok(()) => Ok(()),
        Err(SinkError::Disconnected) => Ok(()),
        Err(SinkError::Other(message)) => Err(Error::Other(message)),
    }
}

fn timed_out_envelope(tool_name: &str, lineage: Lineage) -> evoagent_domain::envelope::ToolEnvelope {
    evoagent_domain::envelope::ToolExecutionError::upstream(
        format!("tool '{tool_name}' timed out"),
        true,
    )
    .into_envelope(tool_name, lineage)
}

fn canceled_envelope(tool_name: &str, lineage: Lineage) -> evoagent_domain::envelope::ToolEnvelope {
    evoagent_domain::envelope::ToolExecutionError::upstream(
        format!("tool '{tool_name}' canceled"),
        false,
    )
    .with_details(serde_json::json!({"canceled": true}))
    .into_envelope(tool_name, lineage)
}

/// A provider that always issues a `calc` tool call, regardless of
/// history — used to exercise the iteration cap (spec §8 scenario S2),
/// since the general-purpose [`evoagent_providers::mock::MockProvider`]
/// stops re-triggering once a tool result is in context.
#[cfg(test)]
struct AlwaysToolCallProvider {
    capabilities: evoagent_domain::capability::LlmCapabilities,
}

#[cfg(test)]
#[async_trait::async_trait]
impl evoagent_providers::LlmProvider for AlwaysToolCallProvider {
    async fn chat_stream(
        &self,
        _req: ChatRequest,
    ) -> Result<evoagent_domain::stream::BoxStream<'static, Result<evoagent_domain::stream::StreamEvent>>> {
        use evoagent_domain::stream::StreamEvent;
        let call_id = format!("always-{}", Uuid::new_v4());
        let events: Vec<Result<StreamEvent>> = vec![
            Ok(StreamEvent::ToolCallStarted { call_id: call_id.clone(), tool_name: "calc".to_string() }),
            Ok(StreamEvent::ToolCallFinished {
                call_id,
                tool_name: "calc".to_string(),
                arguments: serde_json::json!({ "expression": "2+2" }),
                signature: None,
            }),
            Ok(StreamEvent::Done { usage: None, finish_reason: Some("tool_calls".to_string()) }),
        ];
        Ok(Box::pin(futures_util::stream::iter(events)))
    }

    fn capabilities(&self) -> &evoagent_domain::capability::LlmCapabilities {
        &self.capabilities
    }

    fn provider_id(&self) -> &str {
        "always-tool-call"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoagent_domain::capability::{LlmCapabilities, ToolSupport};
    use evoagent_domain::config::{EvidenceConfig, LlmConfig};
    use evoagent_providers::registry::ProviderRegistry;

    fn build_engine(dir: &std::path::Path) -> TurnEngine {
        let store = Arc::new(EventStore::new(&dir.join("events")).unwrap());
        let providers = Arc::new(ProviderRegistry::from_config(&LlmConfig::default()).unwrap());
        let mut registry = ToolRegistry::new();
        evoagent_tools::register_builtin_tools(&mut registry, &EvidenceConfig::default());
        let tools = Arc::new(registry);
        let artifacts = Arc::new(ArtifactStore::new(dir.join("artifacts"), dir.join("cache")));
        let invocations = Arc::new(InvocationLedger::new());
        TurnEngine::new(store, providers, tools, artifacts, invocations, EngineConfig::default())
    }

    #[tokio::test]
    async fn simple_arithmetic_turn_completes_with_calc_result() {
        let dir = tempfile::tempdir().unwrap();
        let engine = build_engine(dir.path());
        let thread_id = Uuid::new_v4();
        let sink = crate::emitter::VecSink::new();

        let outcome = engine
            .run_turn(
                TurnInput {
                    thread_id,
                    run_id: Uuid::new_v4(),
                    provider_id: "mock".to_string(),
                    user_message: "what is (2+3)*4?".to_string(),
                    cancel: CancellationToken::new(),
                },
                &sink,
            )
            .await
            .unwrap();

        assert_eq!(outcome.text, "20");

        let events = engine.store.get_canonical_events(thread_id);
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Text, EventKind::Text, EventKind::ToolCall, EventKind::ToolResult, EventKind::Text]
        );
        let positions: Vec<u64> = events.iter().map(|e| e.position).collect();
        assert_eq!(positions, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn iteration_cap_emits_synthetic_text() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine = build_engine(dir.path());
        engine.config.max_iterations = 2;
        Arc::get_mut(&mut engine.providers)
            .unwrap()
            .insert(
                "always",
                Arc::new(AlwaysToolCallProvider {
                    capabilities: LlmCapabilities {
                        supports_tools: ToolSupport::Basic,
                        supports_streaming: true,
                        context_window_tokens: None,
                        requires_signed_tool_replay: false,
                    },
                }),
            );
        let thread_id = Uuid::new_v4();
        let sink = crate::emitter::VecSink::new();

        let outcome = engine
            .run_turn(
                TurnInput {
                    thread_id,
                    run_id: Uuid::new_v4(),
                    provider_id: "always".to_string(),
                    user_message: "2+2".to_string(),
                    cancel: CancellationToken::new(),
                },
                &sink,
            )
            .await
            .unwrap();

        assert!(outcome.text.contains("tool-iteration limit (2)"));
        let events = engine.store.get_canonical_events(thread_id);
        let tool_calls = events.iter().filter(|e| e.kind == EventKind::ToolCall).count();
        assert_eq!(tool_calls, 2);
    }
}
