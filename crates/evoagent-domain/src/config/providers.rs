use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Registered LLM providers — data-driven, mirroring the teacher's
/// `LlmConfig`: adding a provider means adding a config entry, not a
/// recompile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_timeout_ms")]
    pub default_timeout_ms: u64,
    #[serde(default)]
    pub startup_policy: LlmStartupPolicy,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub roles: HashMap<String, RoleConfig>,
    /// Model to retry with once when a configured model raises
    /// "model not found" (spec §4.E model fallback).
    #[serde(default)]
    pub fallback_model: Option<String>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            default_timeout_ms: d_timeout_ms(),
            startup_policy: LlmStartupPolicy::default(),
            providers: Vec::new(),
            roles: HashMap::new(),
            fallback_model: None,
        }
    }
}

fn d_timeout_ms() -> u64 {
    30_000
}

/// Controls whether the gateway boots if zero providers initialize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmStartupPolicy {
    /// Gateway boots even if no providers initialize; provider-dependent
    /// endpoints fail until credentials are configured. The mock
    /// provider is always available regardless of this policy.
    #[default]
    AllowNone,
    /// Abort startup if no real provider successfully initializes.
    RequireOne,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    OpenaiCompat,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub id: String,
    pub kind: ProviderKind,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    /// Name of the environment variable holding the API key. The key
    /// itself is never stored in the config file.
    #[serde(default)]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoleConfig {
    /// `"<provider_id>/<model>"`.
    pub model: String,
}
