//! Provider registry (spec §4.E).
//!
//! Constructs and holds all configured LLM provider instances. At startup
//! the registry reads the [`LlmConfig`], resolves authentication (env
//! vars), and instantiates the appropriate adapter for each configured
//! provider. The mock adapter is always available regardless of config,
//! under the reserved id `"mock"`.

use std::collections::HashMap;
use std::sync::Arc;

use evoagent_domain::config::{LlmConfig, LlmStartupPolicy, ProviderKind};
use evoagent_domain::error::{Error, Result};

use crate::anthropic::AnthropicProvider;
use crate::mock::MockProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::LlmProvider;

/// Records a provider that failed to initialize.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub kind: String,
    pub error: String,
}

pub struct ProviderRegistry {
    providers: HashMap<String, Arc<dyn LlmProvider>>,
    roles: HashMap<String, String>,
    init_errors: Vec<ProviderInitError>,
}

impl ProviderRegistry {
    /// Build the registry from the application's [`LlmConfig`]. Providers
    /// that fail to initialize are logged and skipped rather than aborting
    /// startup; the mock adapter is registered unconditionally.
    pub fn from_config(config: &LlmConfig) -> Result<Self> {
        let mut providers: HashMap<String, Arc<dyn LlmProvider>> = HashMap::new();
        providers.insert("mock".to_string(), Arc::new(MockProvider::default()));

        let mut init_errors: Vec<ProviderInitError> = Vec::new();

        for pc in &config.providers {
            let result: Result<Arc<dyn LlmProvider>> = match pc.kind {
                ProviderKind::Mock => Ok(Arc::new(MockProvider::default()) as Arc<dyn LlmProvider>),
                ProviderKind::Anthropic => {
                    AnthropicProvider::from_config(pc, config.fallback_model.clone())
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
                ProviderKind::OpenaiCompat => {
                    OpenAiCompatProvider::from_config(pc, config.fallback_model.clone())
                        .map(|p| Arc::new(p) as Arc<dyn LlmProvider>)
                }
            };

            match result {
                Ok(provider) => {
                    tracing::info!(provider_id = %pc.id, kind = ?pc.kind, "registered LLM provider");
                    providers.insert(pc.id.clone(), provider);
                }
                Err(e) => {
                    let safe_error = mask_secrets(&e.to_string());
                    tracing::warn!(
                        provider_id = %pc.id,
                        kind = ?pc.kind,
                        error = %safe_error,
                        "failed to initialize LLM provider, skipping"
                    );
                    init_errors.push(ProviderInitError {
                        provider_id: pc.id.clone(),
                        kind: format!("{:?}", pc.kind),
                        error: safe_error,
                    });
                }
            }
        }

        let real_providers = providers.len() - 1; // exclude "mock"
        if real_providers == 0 && !config.providers.is_empty() {
            match config.startup_policy {
                LlmStartupPolicy::RequireOne => {
                    return Err(Error::Config(
                        "all configured LLM providers failed to initialize \
                         (startup_policy = require_one)"
                            .into(),
                    ));
                }
                LlmStartupPolicy::AllowNone => {
                    tracing::warn!(
                        failed_providers = init_errors.len(),
                        "no LLM providers initialized (startup_policy = allow_none); \
                         gateway will boot on the mock provider until credentials are configured"
                    );
                }
            }
        }

        let mut roles = HashMap::new();
        for (role_name, role_cfg) in &config.roles {
            roles.insert(role_name.clone(), role_cfg.model.clone());
        }

        Ok(Self { providers, roles, init_errors })
    }

    pub fn get(&self, provider_id: &str) -> Option<Arc<dyn LlmProvider>> {
        self.providers.get(provider_id).cloned()
    }

    /// Register a provider directly, bypassing config-driven construction.
    /// Used for test doubles and for embedding adapters the config format
    /// has no shape for; real deployments should prefer `from_config`.
    pub fn insert(&mut self, id: impl Into<String>, provider: Arc<dyn LlmProvider>) {
        self.providers.insert(id.into(), provider);
    }

    /// Resolve the provider assigned to `role`. The role config stores
    /// `"<provider_id>/<model>"`; falls back to the mock provider if the
    /// role is unassigned or its provider failed to initialize.
    pub fn for_role(&self, role: &str) -> Arc<dyn LlmProvider> {
        self.roles
            .get(role)
            .and_then(|spec| spec.split('/').next())
            .and_then(|id| self.providers.get(id))
            .cloned()
            .unwrap_or_else(|| self.providers.get("mock").cloned().expect("mock always registered"))
    }

    pub fn model_for_role(&self, role: &str) -> Option<&str> {
        self.roles
            .get(role)
            .and_then(|spec| spec.split_once('/'))
            .map(|(_, model)| model)
    }

    pub fn list_providers(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.providers.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn init_errors(&self) -> &[ProviderInitError] {
        &self.init_errors
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Mask substrings that look like API keys or bearer tokens before they
/// reach logs or readiness endpoints.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoagent_domain::config::{ProviderConfig, RoleConfig};

    #[test]
    fn mock_provider_always_registered() {
        let config = LlmConfig::default();
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.get("mock").is_some());
    }

    #[test]
    fn missing_api_key_is_recorded_not_fatal() {
        let mut config = LlmConfig::default();
        config.providers.push(ProviderConfig {
            id: "anthropic-main".into(),
            kind: ProviderKind::Anthropic,
            model: None,
            base_url: None,
            api_key_env: Some("EVOAGENT_TEST_MISSING_KEY_VAR".into()),
        });
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert!(registry.get("anthropic-main").is_none());
        assert_eq!(registry.init_errors().len(), 1);
    }

    #[test]
    fn unassigned_role_falls_back_to_mock() {
        let config = LlmConfig::default();
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.for_role("default").provider_id(), "mock");
    }

    #[test]
    fn role_resolves_to_provider_id_prefix() {
        let mut config = LlmConfig::default();
        config.roles.insert(
            "default".into(),
            RoleConfig { model: "mock/some-model".into() },
        );
        let registry = ProviderRegistry::from_config(&config).unwrap();
        assert_eq!(registry.for_role("default").provider_id(), "mock");
        assert_eq!(registry.model_for_role("default"), Some("some-model"));
    }

    #[test]
    fn mask_secrets_redacts_long_tokens() {
        let masked = mask_secrets("invalid key sk-abcdefghijklmnopqrstuvwxyz123456");
        assert!(!masked.contains("abcdefghijklmnopqrstuvwxyz"));
    }
}
