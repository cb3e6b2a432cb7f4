use serde::Serialize;

/// Structured trace events emitted across all EvoAgent crates via
/// `tracing`. These are distinct from the user-facing Event Emitter
/// (`main_agent_*`) events — this is operator-facing observability.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    ThreadResolved {
        thread_id: String,
        is_new: bool,
    },
    EventAppended {
        thread_id: String,
        position: u64,
        kind: String,
    },
    ToolDispatched {
        tool_name: String,
        tool_use_id: String,
        duration_ms: u64,
        is_error: bool,
    },
    ProviderRequest {
        provider: String,
        model: String,
        streaming: bool,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ProviderFallback {
        from_model: String,
        to_model: String,
        reason: String,
    },
    TurnCompleted {
        thread_id: String,
        run_id: String,
        loop_count: u32,
        reason: String,
    },
    ScoreComputed {
        ledger_records: usize,
        final_confidence: f64,
        label: String,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "evoagent_event");
    }
}
