//! Shared application state handed to every axum handler.

use std::path::Path;
use std::sync::Arc;

use evoagent_domain::config::Config;
use evoagent_domain::error::Result;
use evoagent_engine::TurnEngine;
use evoagent_events::{EventStore, InvocationLedger};
use evoagent_providers::registry::ProviderRegistry;
use evoagent_tools::{register_builtin_tools, ArtifactStore, ToolRegistry};

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<EventStore>,
    pub providers: Arc<ProviderRegistry>,
    pub engine: Arc<TurnEngine>,
}

impl AppState {
    /// Build every durable store and registry from `config` and wire them
    /// into a [`TurnEngine`]. Mirrors the teacher's `run_server` sequence
    /// of "construct each component, log it ready, assemble AppState".
    pub fn build(config: Config) -> Result<Self> {
        let config = Arc::new(config);

        let store = Arc::new(EventStore::new(Path::new(&config.events.state_root))?);
        tracing::info!(root = %config.events.state_root, "event store ready");

        let providers = Arc::new(ProviderRegistry::from_config(&config.llm)?);
        tracing::info!(providers = providers.len(), "provider registry ready");

        let mut tool_registry = ToolRegistry::new();
        register_builtin_tools(&mut tool_registry, &config.evidence);
        let tools = Arc::new(tool_registry);
        tracing::info!(tools = tools.tool_names().len(), "tool registry ready");

        let artifacts = Arc::new(ArtifactStore::new(
            config.artifacts.artifact_root.clone().into(),
            config.artifacts.source_cache_root.clone().into(),
        ));

        let invocations = Arc::new(InvocationLedger::new());

        let engine = Arc::new(TurnEngine::new(
            store.clone(),
            providers.clone(),
            tools,
            artifacts,
            invocations,
            config.engine.clone(),
        ));

        Ok(Self { config, store, providers, engine })
    }
}
