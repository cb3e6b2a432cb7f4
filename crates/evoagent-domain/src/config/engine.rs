use serde::{Deserialize, Serialize};

/// Agent Turn Engine tuning knobs (spec §4.F).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Bounded iteration cap for the provider/tool loop. Default 8 per
    /// spec §4.F.
    #[serde(default = "d_max_iterations")]
    pub max_iterations: usize,
    /// Per-tool-call timeout in milliseconds.
    #[serde(default = "d_tool_timeout_ms")]
    pub tool_timeout_ms: u64,
    /// Overall turn timeout in milliseconds.
    #[serde(default = "d_turn_timeout_ms")]
    pub turn_timeout_ms: u64,
    /// Whether independent tool calls within one provider step run
    /// concurrently (spec §5, Open Question 1). Default true, mirroring
    /// the teacher's `join_all` tool dispatch.
    #[serde(default = "d_true")]
    pub parallel_tool_dispatch: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_iterations: d_max_iterations(),
            tool_timeout_ms: d_tool_timeout_ms(),
            turn_timeout_ms: d_turn_timeout_ms(),
            parallel_tool_dispatch: true,
        }
    }
}

fn d_max_iterations() -> usize {
    8
}

fn d_tool_timeout_ms() -> u64 {
    30_000
}

fn d_turn_timeout_ms() -> u64 {
    120_000
}

fn d_true() -> bool {
    true
}
