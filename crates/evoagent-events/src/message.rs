use chrono::{DateTime, Utc};
use evoagent_domain::tool::ContentPart;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::event::EventRole;

/// Per-turn assistant or user artifact. Stores rendered text plus the
/// provider-native content-block sequence so a historical turn can be
/// replayed faithfully even after switching providers. A message may be
/// referenced by several `ConversationEvent`s (one per block).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub thread_id: Uuid,
    pub role: EventRole,
    pub text: String,
    #[serde(default)]
    pub content_blocks: Vec<ContentPart>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider_format: Option<String>,
    #[serde(default)]
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}
