//! Tool registry — maps tool names to handlers, exports provider-native
//! schemas, and dispatches one invocation end-to-end (spec §4.B).

use std::collections::HashMap;
use std::sync::Arc;

use evoagent_domain::envelope::{normalize, Lineage, ToolEnvelope, ToolExecutionError};
use evoagent_domain::tool::ToolDefinition;
use serde_json::Value;

use crate::artifacts::ArtifactStore;

/// Implement this to handle dispatched tool calls.
///
/// Handlers receive the raw JSON payload and the call's [`Lineage`]; they
/// return either a JSON value (coerced into the contract envelope by
/// [`normalize`]) or a [`ToolExecutionError`].
#[async_trait::async_trait]
pub trait ToolHandler: Send + Sync + 'static {
    async fn call(&self, payload: Value, lineage: &Lineage) -> Result<Value, ToolExecutionError>;
}

const REQUIRED_SECTIONS: [&str; 5] = ["WHEN", "AVOID", "CRITICAL_ARGS", "RETURNS", "FAILS_IF"];

/// Append a placeholder block for any of the five required description
/// sections (WHEN/AVOID/CRITICAL_ARGS/RETURNS/FAILS_IF) the author left out,
/// so every tool still documents its contract to the model even when a
/// handler was registered in a hurry.
fn ensure_description_sections(description: &str) -> String {
    let missing: Vec<&str> = REQUIRED_SECTIONS
        .iter()
        .filter(|section| !description.contains(*section))
        .copied()
        .collect();

    if missing.is_empty() {
        return description.to_owned();
    }

    let mut out = description.to_owned();
    if !out.ends_with('\n') {
        out.push('\n');
    }
    for section in missing {
        out.push_str(&format!("{section}: not documented.\n"));
    }
    out
}

/// A registered tool: its provider-facing definition plus the handler and
/// the source tag used for artifact paths and envelope stamping.
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
    pub source: String,
    handler: Arc<dyn ToolHandler>,
}

impl ToolSpec {
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }
}

#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        source: impl Into<String>,
        handler: impl ToolHandler,
    ) {
        let name = name.into();
        self.tools.insert(
            name.clone(),
            ToolSpec {
                name,
                description: ensure_description_sections(&description.into()),
                input_schema,
                source: source.into(),
                handler: Arc::new(handler),
            },
        );
    }

    pub fn get(&self, name: &str) -> Option<&ToolSpec> {
        self.tools.get(name)
    }

    /// All registered tool names, sorted.
    pub fn tool_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.tools.keys().cloned().collect();
        names.sort();
        names
    }

    /// Provider-agnostic tool definitions, sorted by name. The provider
    /// adapter renders these into its native schema shape.
    pub fn export_definitions(&self) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self.tools.values().map(ToolSpec::definition).collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    /// Dispatch one tool call end-to-end: resolve, persist the request
    /// artifact, invoke, normalize, persist the response + manifest.
    pub async fn dispatch(
        &self,
        tool_name: &str,
        payload: Value,
        lineage: Lineage,
        artifacts: &ArtifactStore,
    ) -> ToolEnvelope {
        let Some(spec) = self.tools.get(tool_name) else {
            return ToolExecutionError::not_found(format!("unknown tool '{tool_name}'"))
                .into_envelope("registry", lineage);
        };

        if let Err(err) = artifacts.write_request(&lineage, tool_name, &payload) {
            tracing::debug!(tool_name, error = %err, "failed to persist tool request artifact");
        }

        let result = spec.handler.call(payload, &lineage).await;

        let envelope = match result {
            Ok(value) => normalize(value, &spec.source, lineage.clone()),
            Err(err) => err.into_envelope(&spec.source, lineage.clone()),
        };

        if let Err(err) = artifacts.write_response(&lineage, tool_name, &envelope) {
            tracing::debug!(tool_name, error = %err, "failed to persist tool response artifact");
        }

        envelope
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoagent_domain::envelope::{EnvelopeStatus, ToolErrorCode};
    use serde_json::json;
    use uuid::Uuid;

    struct Echo;
    #[async_trait::async_trait]
    impl ToolHandler for Echo {
        async fn call(&self, payload: Value, _lineage: &Lineage) -> Result<Value, ToolExecutionError> {
            Ok(payload)
        }
    }

    struct AlwaysFails;
    #[async_trait::async_trait]
    impl ToolHandler for AlwaysFails {
        async fn call(&self, _payload: Value, _lineage: &Lineage) -> Result<Value, ToolExecutionError> {
            Err(ToolExecutionError::upstream("boom", true))
        }
    }

    fn lineage() -> Lineage {
        Lineage {
            thread_id: Uuid::new_v4(),
            run_id: Uuid::new_v4(),
            tool_use_id: "call-1".into(),
        }
    }

    #[test]
    fn description_gets_missing_sections_appended() {
        let mut reg = ToolRegistry::new();
        reg.register("echo", "A minimal tool.", json!({}), "test", Echo);
        let desc = &reg.get("echo").unwrap().description;
        for section in REQUIRED_SECTIONS {
            assert!(desc.contains(section), "missing {section} in {desc}");
        }
    }

    #[test]
    fn description_with_all_sections_is_untouched() {
        let full = "WHEN: always\nAVOID: never\nCRITICAL_ARGS: none\nRETURNS: echo\nFAILS_IF: never";
        let mut reg = ToolRegistry::new();
        reg.register("echo", full, json!({}), "test", Echo);
        assert_eq!(reg.get("echo").unwrap().description, full);
    }

    #[tokio::test]
    async fn dispatch_unknown_tool_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path().to_path_buf(), dir.path().join("cache"));
        let reg = ToolRegistry::new();
        let env = reg.dispatch("missing", json!({}), lineage(), &artifacts).await;
        assert_eq!(env.status, EnvelopeStatus::Error);
        assert_eq!(env.error.unwrap().code, ToolErrorCode::NotFound);
    }

    #[tokio::test]
    async fn dispatch_echo_normalizes_raw_value() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path().to_path_buf(), dir.path().join("cache"));
        let mut reg = ToolRegistry::new();
        reg.register("echo", "WHEN/AVOID/CRITICAL_ARGS/RETURNS/FAILS_IF", json!({}), "test", Echo);
        let env = reg
            .dispatch("echo", json!({"x": 1}), lineage(), &artifacts)
            .await;
        assert_eq!(env.status, EnvelopeStatus::Ok);
        assert_eq!(env.data, json!({"x": 1}));
    }

    #[tokio::test]
    async fn dispatch_handler_error_is_retryable_upstream() {
        let dir = tempfile::tempdir().unwrap();
        let artifacts = ArtifactStore::new(dir.path().to_path_buf(), dir.path().join("cache"));
        let mut reg = ToolRegistry::new();
        reg.register("fails", "WHEN/AVOID/CRITICAL_ARGS/RETURNS/FAILS_IF", json!({}), "test", AlwaysFails);
        let env = reg
            .dispatch("fails", json!({}), lineage(), &artifacts)
            .await;
        assert_eq!(env.status, EnvelopeStatus::Error);
        let error = env.error.unwrap();
        assert!(error.retryable);
    }
}
