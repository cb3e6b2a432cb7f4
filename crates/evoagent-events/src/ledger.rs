use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolInvocationStatus {
    Pending,
    Success,
    Error,
}

/// A ledger row for one dispatched tool call (spec §3). Derived
/// bookkeeping, not part of the append-only event log — its
/// `status`/`output`/`error` are the only fields ever mutated after
/// creation, and only while moving `pending -> success|error` exactly
/// once.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolInvocation {
    /// Equals the originating `tool_call_id` / `tool_use_id`.
    pub id: String,
    pub thread_id: Uuid,
    pub assistant_event_id: Uuid,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_event_id: Option<Uuid>,
    pub tool_name: String,
    pub input: serde_json::Value,
    pub status: ToolInvocationStatus,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub error: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub completed_at: Option<DateTime<Utc>>,
}

impl ToolInvocation {
    pub fn new(
        id: String,
        thread_id: Uuid,
        assistant_event_id: Uuid,
        tool_name: String,
        input: serde_json::Value,
    ) -> Self {
        Self {
            id,
            thread_id,
            assistant_event_id,
            result_event_id: None,
            tool_name,
            input,
            status: ToolInvocationStatus::Pending,
            output: None,
            error: None,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    pub fn complete(
        &mut self,
        result_event_id: Uuid,
        is_error: bool,
        output_or_error: serde_json::Value,
    ) {
        self.result_event_id = Some(result_event_id);
        self.completed_at = Some(Utc::now());
        if is_error {
            self.status = ToolInvocationStatus::Error;
            self.error = Some(output_or_error);
        } else {
            self.status = ToolInvocationStatus::Success;
            self.output = Some(output_or_error);
        }
    }
}

/// In-memory ledger of [`ToolInvocation`] rows, keyed by `tool_use_id`.
/// Derived bookkeeping only (spec §3 Invariant 3) — never part of the
/// append-only event log, so it carries no position and is safe to
/// mutate in place as a call moves `pending -> success|error`.
#[derive(Default)]
pub struct InvocationLedger {
    invocations: RwLock<HashMap<String, ToolInvocation>>,
}

impl InvocationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_pending(&self, invocation: ToolInvocation) {
        self.invocations.write().insert(invocation.id.clone(), invocation);
    }

    /// Move an invocation `pending -> success|error` exactly once.
    pub fn complete(&self, id: &str, result_event_id: Uuid, is_error: bool, output_or_error: serde_json::Value) {
        if let Some(inv) = self.invocations.write().get_mut(id) {
            inv.complete(result_event_id, is_error, output_or_error);
        }
    }

    pub fn get(&self, id: &str) -> Option<ToolInvocation> {
        self.invocations.read().get(id).cloned()
    }

    pub fn for_thread(&self, thread_id: Uuid) -> Vec<ToolInvocation> {
        let mut rows: Vec<ToolInvocation> = self
            .invocations
            .read()
            .values()
            .filter(|inv| inv.thread_id == thread_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        rows
    }
}

#[cfg(test)]
mod ledger_tests {
    use super::*;

    #[test]
    fn pending_moves_to_success_exactly_once() {
        let ledger = InvocationLedger::new();
        let thread_id = Uuid::new_v4();
        let inv = ToolInvocation::new(
            "call-1".into(),
            thread_id,
            Uuid::new_v4(),
            "calc".into(),
            serde_json::json!({"expression": "1+1"}),
        );
        ledger.record_pending(inv);
        assert_eq!(ledger.get("call-1").unwrap().status, ToolInvocationStatus::Pending);

        ledger.complete("call-1", Uuid::new_v4(), false, serde_json::json!({"value": 2}));
        let done = ledger.get("call-1").unwrap();
        assert_eq!(done.status, ToolInvocationStatus::Success);
        assert!(done.completed_at.is_some());
    }

    #[test]
    fn for_thread_filters_by_thread_id() {
        let ledger = InvocationLedger::new();
        let thread_a = Uuid::new_v4();
        let thread_b = Uuid::new_v4();
        ledger.record_pending(ToolInvocation::new("a".into(), thread_a, Uuid::new_v4(), "calc".into(), serde_json::json!({})));
        ledger.record_pending(ToolInvocation::new("b".into(), thread_b, Uuid::new_v4(), "calc".into(), serde_json::json!({})));
        assert_eq!(ledger.for_thread(thread_a).len(), 1);
    }
}
