//! Message-view derivation (spec §4.D).
//!
//! `build_messages` turns a thread's canonical event log into a
//! provider-native message sequence, reconciling orphaned tool calls and
//! results and de-duplicating replayed content blocks.

use std::collections::HashSet;

use evoagent_domain::tool::{ContentPart, Message, MessageContent, Role};
use serde_json::Value;

use crate::event::{content, EventKind, EventRole};
use crate::store::EventStore;

pub const ORPHAN_RESULT_SENTINEL: &str = "Historical tool output:";
pub const MISSING_THOUGHT_SIGNATURE_SENTINEL: &str = "[tool_call_without_thought_signature]";

fn event_role_to_wire(role: EventRole) -> Role {
    match role {
        EventRole::User => Role::User,
        EventRole::Assistant => Role::Assistant,
        EventRole::Tool => Role::Tool,
        EventRole::System => Role::System,
    }
}

/// Build the provider-native message sequence for `thread_id`.
///
/// `provider` identifies the active provider adapter (see §4.E); it
/// gates whether a stored `content_blocks` snapshot is replayed verbatim
/// (only when `event.provider_format == Some(provider)`) or serialized
/// to a degraded textual equivalent.
///
/// `requires_signed_tool_replay` mirrors the active provider's
/// `LlmCapabilities` flag: when true, a historical tool call is only
/// replayed as a real `tool_use` block if it carries its thought-signature
/// metadata; otherwise it is downgraded to a text sentinel. Providers that
/// don't require signed replay always get a real `tool_use` block.
pub fn build_messages(
    store: &EventStore,
    thread_id: uuid::Uuid,
    provider: &str,
    requires_signed_tool_replay: bool,
) -> Vec<Message> {
    let events = store.get_canonical_events(thread_id);

    // First pass: determine which tool_call_ids have a matching tool_result
    // and vice versa, so orphans can be reconciled in the second pass.
    let call_ids: HashSet<&str> = events
        .iter()
        .filter(|e| e.kind == EventKind::ToolCall)
        .filter_map(|e| e.tool_call_id.as_deref())
        .collect();
    let result_ids: HashSet<&str> = events
        .iter()
        .filter(|e| e.kind == EventKind::ToolResult)
        .filter_map(|e| e.tool_call_id.as_deref())
        .collect();

    // Canonical tool_call ids, used to drop duplicate tool_use blocks
    // embedded in an earlier replayed content_blocks snapshot.
    let canonical_call_ids: HashSet<&str> = call_ids.intersection(&result_ids).copied().collect();
    let mut seen_tool_use_ids: HashSet<String> = HashSet::new();

    let mut messages = Vec::with_capacity(events.len());

    for event in events.iter().filter(|e| e.visible_to_model) {
        match event.kind {
            EventKind::Text => {
                let wire_role = event_role_to_wire(event.role);
                if let (Some(stored_format), Some(blocks)) =
                    (&event.provider_format, &event.content_blocks)
                {
                    if stored_format == provider {
                        let deduped = dedupe_tool_use_blocks(
                            blocks,
                            &canonical_call_ids,
                            &mut seen_tool_use_ids,
                        );
                        messages.push(Message {
                            role: wire_role,
                            content: MessageContent::Parts(deduped),
                            provider_specific_fields: event.content.get("provider_specific_fields").cloned(),
                        });
                        continue;
                    }
                }
                let text = content_text(&event.content);
                messages.push(Message {
                    role: wire_role,
                    content: MessageContent::Text(text),
                    provider_specific_fields: None,
                });
            }
            EventKind::ToolCall => {
                let Some(call_id) = event.tool_call_id.clone() else {
                    continue;
                };
                if !result_ids.contains(call_id.as_str()) {
                    // Orphan tool_call: providers reject half-pairs.
                    continue;
                }
                if seen_tool_use_ids.contains(&call_id) {
                    continue;
                }
                let Ok(payload) = serde_json::from_value::<content::ToolCallContent>(
                    event.content.clone(),
                ) else {
                    continue;
                };
                let downgrade = requires_signed_tool_replay && payload.signature.is_none();
                let part = if downgrade {
                    ContentPart::Text {
                        text: format!(
                            "{MISSING_THOUGHT_SIGNATURE_SENTINEL} {}({})",
                            payload.tool_name, payload.arguments
                        ),
                    }
                } else {
                    ContentPart::ToolUse {
                        id: call_id.clone(),
                        name: payload.tool_name,
                        input: payload.arguments,
                    }
                };
                let provider_specific_fields = if downgrade { None } else { payload.signature.clone() };
                seen_tool_use_ids.insert(call_id);
                messages.push(Message {
                    role: Role::Assistant,
                    content: MessageContent::Parts(vec![part]),
                    provider_specific_fields,
                });
            }
            EventKind::ToolResult => {
                let Some(call_id) = event.tool_call_id.clone() else {
                    continue;
                };
                if !call_ids.contains(call_id.as_str()) {
                    // Orphan tool_result: downgrade into assistant text,
                    // drop the correlation.
                    let summary = content_text(&event.content);
                    messages.push(Message {
                        role: Role::Assistant,
                        content: MessageContent::Text(format!(
                            "{ORPHAN_RESULT_SENTINEL} {summary}"
                        )),
                        provider_specific_fields: None,
                    });
                    continue;
                }
                let Ok(payload) = serde_json::from_value::<content::ToolResultContent>(
                    event.content.clone(),
                ) else {
                    continue;
                };
                messages.push(Message::tool_result(
                    call_id,
                    payload.envelope.to_string(),
                    false,
                ));
            }
            EventKind::Control => {
                // Control events are bookkeeping only; never surfaced to the
                // provider.
            }
        }
    }

    messages
}

fn dedupe_tool_use_blocks(
    blocks: &[ContentPart],
    canonical_call_ids: &HashSet<&str>,
    seen: &mut HashSet<String>,
) -> Vec<ContentPart> {
    blocks
        .iter()
        .filter(|part| match part {
            ContentPart::ToolUse { id, .. } => {
                if canonical_call_ids.contains(id.as_str()) {
                    // A later canonical tool_call event supersedes this
                    // embedded copy.
                    false
                } else {
                    seen.insert(id.clone());
                    true
                }
            }
            _ => true,
        })
        .cloned()
        .collect()
}

fn content_text(value: &Value) -> String {
    if let Some(text) = value.get("text").and_then(Value::as_str) {
        return text.to_owned();
    }
    value.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{ConversationEvent, EventKind, EventRole};
    use chrono::Utc;
    use serde_json::json;
    use uuid::Uuid;

    fn text_event(thread_id: Uuid, role: EventRole, text: &str) -> ConversationEvent {
        ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role,
            kind: EventKind::Text,
            position: 0,
            content: json!({"text": text}),
            tool_call_id: None,
            visible_to_model: true,
            message_id: None,
            provider_format: None,
            content_blocks: None,
            created_at: Utc::now(),
        }
    }

    fn tool_result_event(thread_id: Uuid, call_id: &str) -> ConversationEvent {
        ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role: EventRole::Tool,
            kind: EventKind::ToolResult,
            position: 0,
            content: serde_json::to_value(content::ToolResultContent {
                tool_name: "search_pubmed".into(),
                envelope: json!({"status": "ok"}),
            })
            .unwrap(),
            tool_call_id: Some(call_id.to_owned()),
            visible_to_model: true,
            message_id: None,
            provider_format: None,
            content_blocks: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn orphan_tool_result_downgrades_to_sentinel_text() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let thread_id = Uuid::new_v4();

        store
            .append_event(text_event(thread_id, EventRole::User, "what does the paper say?"))
            .unwrap();
        store
            .append_event(tool_result_event(thread_id, "orphan-call-1"))
            .unwrap();

        let messages = build_messages(&store, thread_id, "anthropic", false);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[1].role, Role::Assistant);
        let MessageContent::Text(text) = &messages[1].content else {
            panic!("expected text content");
        };
        assert!(text.starts_with(ORPHAN_RESULT_SENTINEL));
    }

    #[test]
    fn orphan_tool_call_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let thread_id = Uuid::new_v4();

        let call = ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role: EventRole::Assistant,
            kind: EventKind::ToolCall,
            position: 0,
            content: serde_json::to_value(content::ToolCallContent {
                tool_name: "search_pubmed".into(),
                arguments: json!({"query": "senescence"}),
                signature: None,
            })
            .unwrap(),
            tool_call_id: Some("call-1".into()),
            visible_to_model: true,
            message_id: None,
            provider_format: None,
            content_blocks: None,
            created_at: Utc::now(),
        };
        store.append_event(call).unwrap();

        let messages = build_messages(&store, thread_id, "anthropic", false);
        assert!(messages.is_empty());
    }

    #[test]
    fn paired_tool_call_and_result_both_survive() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let thread_id = Uuid::new_v4();

        let call = ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role: EventRole::Assistant,
            kind: EventKind::ToolCall,
            position: 0,
            content: serde_json::to_value(content::ToolCallContent {
                tool_name: "search_pubmed".into(),
                arguments: json!({"query": "senescence"}),
                signature: None,
            })
            .unwrap(),
            tool_call_id: Some("call-1".into()),
            visible_to_model: true,
            message_id: None,
            provider_format: None,
            content_blocks: None,
            created_at: Utc::now(),
        };
        store.append_event(call).unwrap();
        store
            .append_event(tool_result_event(thread_id, "call-1"))
            .unwrap();

        let messages = build_messages(&store, thread_id, "anthropic", false);
        assert_eq!(messages.len(), 2);
    }

    #[test]
    fn paired_tool_call_defaults_to_real_tool_use_block() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let thread_id = Uuid::new_v4();

        let call = ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role: EventRole::Assistant,
            kind: EventKind::ToolCall,
            position: 0,
            content: serde_json::to_value(content::ToolCallContent {
                tool_name: "search_pubmed".into(),
                arguments: json!({"query": "senescence"}),
                signature: None,
            })
            .unwrap(),
            tool_call_id: Some("call-1".into()),
            visible_to_model: true,
            message_id: None,
            provider_format: None,
            content_blocks: None,
            created_at: Utc::now(),
        };
        store.append_event(call).unwrap();
        store
            .append_event(tool_result_event(thread_id, "call-1"))
            .unwrap();

        // openai-compat style: no signed replay requirement, no signature stored.
        let messages = build_messages(&store, thread_id, "openai", false);
        let MessageContent::Parts(parts) = &messages[0].content else {
            panic!("expected parts content");
        };
        assert!(matches!(parts[0], ContentPart::ToolUse { .. }));
    }

    #[test]
    fn signed_replay_required_and_absent_downgrades_to_sentinel() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let thread_id = Uuid::new_v4();

        let call = ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role: EventRole::Assistant,
            kind: EventKind::ToolCall,
            position: 0,
            content: serde_json::to_value(content::ToolCallContent {
                tool_name: "search_pubmed".into(),
                arguments: json!({"query": "senescence"}),
                signature: None,
            })
            .unwrap(),
            tool_call_id: Some("call-1".into()),
            visible_to_model: true,
            message_id: None,
            provider_format: None,
            content_blocks: None,
            created_at: Utc::now(),
        };
        store.append_event(call).unwrap();
        store
            .append_event(tool_result_event(thread_id, "call-1"))
            .unwrap();

        let messages = build_messages(&store, thread_id, "anthropic", true);
        let MessageContent::Parts(parts) = &messages[0].content else {
            panic!("expected parts content");
        };
        let ContentPart::Text { text } = &parts[0] else {
            panic!("expected sentinel text block");
        };
        assert!(text.starts_with(MISSING_THOUGHT_SIGNATURE_SENTINEL));
    }

    #[test]
    fn signed_replay_required_and_present_yields_real_tool_use_block() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::new(dir.path()).unwrap();
        let thread_id = Uuid::new_v4();

        let call = ConversationEvent {
            id: Uuid::new_v4(),
            thread_id,
            role: EventRole::Assistant,
            kind: EventKind::ToolCall,
            position: 0,
            content: serde_json::to_value(content::ToolCallContent {
                tool_name: "search_pubmed".into(),
                arguments: json!({"query": "senescence"}),
                signature: Some(json!("sig-abc")),
            })
            .unwrap(),
            tool_call_id: Some("call-1".into()),
            visible_to_model: true,
            message_id: None,
            provider_format: None,
            content_blocks: None,
            created_at: Utc::now(),
        };
        store.append_event(call).unwrap();
        store
            .append_event(tool_result_event(thread_id, "call-1"))
            .unwrap();

        let messages = build_messages(&store, thread_id, "anthropic", true);
        let MessageContent::Parts(parts) = &messages[0].content else {
            panic!("expected parts content");
        };
        assert!(matches!(parts[0], ContentPart::ToolUse { .. }));
        assert_eq!(
            messages[0].provider_specific_fields,
            Some(json!("sig-abc"))
        );
    }
}
