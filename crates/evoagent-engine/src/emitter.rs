//! Event Emitter (spec §4.H) — the typed outbound event taxonomy the UI
//! transport (WebSocket, SSE, or the non-streaming chat fallback)
//! consumes while a turn runs.

use serde::Serialize;
use uuid::Uuid;

/// One outbound event. Every variant carries `thread_id` and `run_id`;
/// `#[serde(tag = "type")]` renders the `main_agent_*` name the spec
/// names verbatim.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum EngineEvent {
    #[serde(rename = "main_agent_start")]
    Start { thread_id: Uuid, run_id: Uuid },

    #[serde(rename = "main_agent_thinking_start")]
    ThinkingStart { thread_id: Uuid, run_id: Uuid, segment_index: u32 },
    #[serde(rename = "main_agent_thinking_token")]
    ThinkingToken { thread_id: Uuid, run_id: Uuid, segment_index: u32, text: String },
    /// A short label derived from the accumulated reasoning text once it
    /// finishes, the way a UI collapses a reasoning block under a title.
    #[serde(rename = "main_agent_thinking_title")]
    ThinkingTitle { thread_id: Uuid, run_id: Uuid, segment_index: u32, title: String },
    #[serde(rename = "main_agent_thinking_end")]
    ThinkingEnd { thread_id: Uuid, run_id: Uuid, segment_index: u32 },

    #[serde(rename = "main_agent_segment_start")]
    SegmentStart { thread_id: Uuid, run_id: Uuid, segment_index: u32 },
    #[serde(rename = "main_agent_segment_token")]
    SegmentToken { thread_id: Uuid, run_id: Uuid, segment_index: u32, text: String },
    #[serde(rename = "main_agent_segment_end")]
    SegmentEnd { thread_id: Uuid, run_id: Uuid, segment_index: u32 },

    #[serde(rename = "main_agent_tool_start")]
    ToolStart {
        thread_id: Uuid,
        run_id: Uuid,
        tool_use_id: String,
        tool_name: String,
        arguments: serde_json::Value,
    },
    #[serde(rename = "main_agent_tool_result")]
    ToolResult {
        thread_id: Uuid,
        run_id: Uuid,
        tool_use_id: String,
        tool_name: String,
        envelope: serde_json::Value,
        is_error: bool,
    },

    #[serde(rename = "main_agent_complete")]
    Complete { thread_id: Uuid, run_id: Uuid, text: String },
    #[serde(rename = "main_agent_error")]
    Error { thread_id: Uuid, run_id: Uuid, message: String },
}

/// A sink a running turn emits [`EngineEvent`]s to. Implementations back
/// this with an mpsc channel to a WebSocket writer, an SSE stream, or
/// (for tests and the non-streaming chat fallback) an in-memory
/// collector.
///
/// Emission is synchronous and fires on the task driving the turn, so
/// token order within a segment is exactly stream order (spec §5).
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent) -> Result<(), SinkError>;
}

/// Whether a sink failure should be swallowed (client went away) or
/// abort the turn (spec §4.H: "non-disconnect exceptions on the sink
/// propagate and terminate the turn cleanly").
#[derive(Debug, Clone, thiserror::Error)]
pub enum SinkError {
    #[error("event sink disconnected")]
    Disconnected,
    #[error("{0}")]
    Other(String),
}

/// Collects emitted events in arrival order. Used by tests and by the
/// non-streaming `/api/chat/send` fallback (spec §6), which returns the
/// final text alongside a captured event list.
#[derive(Default)]
pub struct VecSink(parking_lot::Mutex<Vec<EngineEvent>>);

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_events(self) -> Vec<EngineEvent> {
        self.0.into_inner()
    }
}

impl EventSink for VecSink {
    fn emit(&self, event: EngineEvent) -> Result<(), SinkError> {
        self.0.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_sink_preserves_emission_order() {
        let sink = VecSink::new();
        let thread_id = Uuid::new_v4();
        let run_id = Uuid::new_v4();
        sink.emit(EngineEvent::Start { thread_id, run_id }).unwrap();
        sink.emit(EngineEvent::Complete { thread_id, run_id, text: "hi".into() }).unwrap();
        let events = sink.into_events();
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], EngineEvent::Start { .. }));
        assert!(matches!(events[1], EngineEvent::Complete { .. }));
    }
}
