//! Tool Contract & Envelope (spec §4.A).
//!
//! Defines the one shape every tool result is normalized into before it
//! is appended as a `tool_result` event and fed back to the model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const CONTRACT_VERSION: &str = "2.0";
const DEFAULT_SCHEMA_VERSION: &str = "v1";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    IdList,
    RecordList,
    Document,
    Aggregate,
    Status,
}

/// The triple stamped on every artifact and envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lineage {
    pub thread_id: Uuid,
    pub run_id: Uuid,
    pub tool_use_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Pagination {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
    #[serde(default)]
    pub has_more: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AuthMeta {
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub configured: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceMeta {
    pub source: String,
    pub request_id: String,
    pub retrieved_at: DateTime<Utc>,
    pub data_schema_version: String,
    #[serde(default)]
    pub auth: AuthMeta,
    pub lineage: Lineage,
}

/// The normalized shape every tool result is coerced into. Re-normalizing
/// an envelope is idempotent (see [`normalize`]).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolEnvelope {
    pub contract_version: String,
    pub status: EnvelopeStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result_kind: Option<ResultKind>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(default)]
    pub data: serde_json::Value,
    #[serde(default)]
    pub ids: Vec<String>,
    #[serde(default)]
    pub citations: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
    #[serde(default)]
    pub artifacts: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagination: Option<Pagination>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_meta: Option<SourceMeta>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ToolError>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnvelopeStatus {
    Ok,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ToolErrorCode {
    ValidationError,
    NotFound,
    RateLimit,
    UpstreamError,
    DependencyMissing,
    Unconfigured,
}

impl ToolErrorCode {
    /// Whether this class of error is retryable by default. `UpstreamError`
    /// is `variable` per spec; callers construct it explicitly via
    /// [`ToolExecutionError::upstream`] with the right flag.
    pub fn default_retryable(self) -> bool {
        matches!(self, ToolErrorCode::RateLimit)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolError {
    pub code: ToolErrorCode,
    pub message: String,
    pub retryable: bool,
    #[serde(default)]
    pub details: serde_json::Value,
}

/// A typed error a tool handler may raise. The registry renders this
/// into a `status: "error"` envelope; it never terminates the turn.
#[derive(Debug, thiserror::Error)]
#[error("{code:?}: {message}")]
pub struct ToolExecutionError {
    pub code: ToolErrorCode,
    pub message: String,
    pub retryable: bool,
    pub details: serde_json::Value,
}

impl ToolExecutionError {
    pub fn new(code: ToolErrorCode, message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            retryable: code.default_retryable(),
            code,
            message,
            details: serde_json::Value::Null,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::ValidationError, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::NotFound, message)
    }

    pub fn rate_limit(message: impl Into<String>, retry_after_secs: Option<u64>) -> Self {
        let mut e = Self::new(ToolErrorCode::RateLimit, message);
        if let Some(secs) = retry_after_secs {
            e.details = serde_json::json!({ "retry_after": secs });
        }
        e
    }

    pub fn upstream(message: impl Into<String>, retryable: bool) -> Self {
        let mut e = Self::new(ToolErrorCode::UpstreamError, message);
        e.retryable = retryable;
        e
    }

    pub fn dependency_missing(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::DependencyMissing, message)
    }

    pub fn unconfigured(message: impl Into<String>) -> Self {
        Self::new(ToolErrorCode::Unconfigured, message)
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = details;
        self
    }

    pub fn into_envelope(self, source: &str, lineage: Lineage) -> ToolEnvelope {
        ToolEnvelope {
            contract_version: CONTRACT_VERSION.to_string(),
            status: EnvelopeStatus::Error,
            result_kind: None,
            summary: None,
            data: serde_json::Value::Null,
            ids: Vec::new(),
            citations: Vec::new(),
            warnings: Vec::new(),
            artifacts: Vec::new(),
            pagination: None,
            source_meta: Some(SourceMeta {
                source: source.to_string(),
                request_id: Uuid::new_v4().to_string(),
                retrieved_at: Utc::now(),
                data_schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
                auth: AuthMeta::default(),
                lineage,
            }),
            error: Some(ToolError {
                code: self.code,
                message: self.message,
                retryable: self.retryable,
                details: self.details,
            }),
        }
    }
}

/// Collapse an arbitrary panic/anyhow-style message into `UPSTREAM_ERROR`.
impl From<String> for ToolExecutionError {
    fn from(message: String) -> Self {
        ToolExecutionError::upstream(message, true)
    }
}

#[allow(clippy::too_many_arguments)]
pub fn make_envelope(
    source: &str,
    summary: impl Into<String>,
    result_kind: ResultKind,
    data: serde_json::Value,
    ids: Vec<String>,
    citations: Vec<String>,
    warnings: Vec<String>,
    artifacts: Vec<String>,
    pagination: Option<Pagination>,
    auth: AuthMeta,
    lineage: Lineage,
) -> ToolEnvelope {
    ToolEnvelope {
        contract_version: CONTRACT_VERSION.to_string(),
        status: EnvelopeStatus::Ok,
        result_kind: Some(result_kind),
        summary: Some(summary.into()),
        data,
        ids,
        citations,
        warnings,
        artifacts,
        pagination,
        source_meta: Some(SourceMeta {
            source: source.to_string(),
            request_id: Uuid::new_v4().to_string(),
            retrieved_at: Utc::now(),
            data_schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            auth,
            lineage,
        }),
        error: None,
    }
}

/// Coerce an arbitrary handler return value into the contract shape.
/// If `output` already looks like an envelope (has `contract_version`),
/// missing metadata is stamped in; otherwise the value is wrapped under
/// `data` with a best-effort summary. Idempotent: `normalize(normalize(x))
/// == normalize(x)` modulo `retrieved_at`.
pub fn normalize(output: serde_json::Value, source: &str, lineage: Lineage) -> ToolEnvelope {
    if let Some(obj) = output.as_object() {
        if obj.contains_key("contract_version") {
            if let Ok(mut env) = serde_json::from_value::<ToolEnvelope>(output.clone()) {
                stamp_defaults(&mut env, source, &lineage);
                return env;
            }
        }
    }

    let summary = best_effort_summary(&output);
    ToolEnvelope {
        contract_version: CONTRACT_VERSION.to_string(),
        status: EnvelopeStatus::Ok,
        result_kind: Some(ResultKind::Aggregate),
        summary: Some(summary),
        data: output,
        ids: Vec::new(),
        citations: Vec::new(),
        warnings: Vec::new(),
        artifacts: Vec::new(),
        pagination: None,
        source_meta: Some(SourceMeta {
            source: source.to_string(),
            request_id: Uuid::new_v4().to_string(),
            retrieved_at: Utc::now(),
            data_schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
            auth: AuthMeta::default(),
            lineage,
        }),
        error: None,
    }
}

fn stamp_defaults(env: &mut ToolEnvelope, source: &str, lineage: &Lineage) {
    if env.contract_version.is_empty() {
        env.contract_version = CONTRACT_VERSION.to_string();
    }
    match &mut env.source_meta {
        Some(meta) => {
            if meta.source.is_empty() {
                meta.source = source.to_string();
            }
            if meta.data_schema_version.is_empty() {
                meta.data_schema_version = DEFAULT_SCHEMA_VERSION.to_string();
            }
        }
        None => {
            env.source_meta = Some(SourceMeta {
                source: source.to_string(),
                request_id: Uuid::new_v4().to_string(),
                retrieved_at: Utc::now(),
                data_schema_version: DEFAULT_SCHEMA_VERSION.to_string(),
                auth: AuthMeta::default(),
                lineage: lineage.clone(),
            });
        }
    }
}

fn best_effort_summary(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "no data returned".to_string(),
        serde_json::Value::Array(items) => format!("{} item(s) returned", items.len()),
        serde_json::Value::Object(map) => {
            if let Some(serde_json::Value::String(s)) = map.get("summary") {
                s.clone()
            } else {
                format!("object with {} field(s)", map.len())
            }
        }
        serde_json::Value::String(s) => {
            let truncated: String = s.chars().take(120).collect();
            truncated
        }
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lineage() -> Lineage {
        Lineage {
            thread_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            tool_use_id: "tu_1".into(),
        }
    }

    #[test]
    fn normalize_wraps_raw_values() {
        let env = normalize(serde_json::json!({"pmid": "123"}), "pubmed", lineage());
        assert_eq!(env.status, EnvelopeStatus::Ok);
        assert_eq!(env.data["pmid"], "123");
        assert_eq!(env.source_meta.unwrap().source, "pubmed");
    }

    #[test]
    fn normalize_is_idempotent() {
        let l = lineage();
        let once = normalize(serde_json::json!({"x": 1}), "pubmed", l.clone());
        let once_json = serde_json::to_value(&once).unwrap();
        let twice = normalize(once_json.clone(), "pubmed", l);
        // Compare everything except the non-deterministic retrieved_at/request_id.
        assert_eq!(once.data, twice.data);
        assert_eq!(once.result_kind, twice.result_kind);
        assert_eq!(once.summary, twice.summary);
        assert_eq!(once.contract_version, twice.contract_version);
    }

    #[test]
    fn error_renders_into_error_envelope() {
        let err = ToolExecutionError::rate_limit("too fast", Some(30));
        let env = err.into_envelope("openfda", lineage());
        assert_eq!(env.status, EnvelopeStatus::Error);
        let e = env.error.unwrap();
        assert_eq!(e.code, ToolErrorCode::RateLimit);
        assert!(e.retryable);
        assert_eq!(e.details["retry_after"], 30);
    }
}
