mod engine;
mod evidence;
mod observability;
mod providers;
mod server;

pub use engine::*;
pub use evidence::*;
pub use observability::*;
pub use providers::*;
pub use server::*;

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Top-level configuration, loaded from TOML with environment overrides
/// for secrets (provider API keys are never stored in the file itself).
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub events: EventStoreConfig,
    #[serde(default)]
    pub artifacts: ArtifactStoreConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from a TOML file, falling back to defaults
    /// when the file does not exist. API keys are resolved from the env
    /// var named in each `ProviderConfig::api_key_env`, never from the
    /// file.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let raw = std::fs::read_to_string(path).map_err(Error::Io)?;
        toml::from_str(&raw).map_err(|e| Error::Config(format!("{path:?}: {e}")))
    }

    /// Render the config (with secrets redacted) for `config show`.
    pub fn redacted(&self) -> Self {
        let mut clone = self.clone();
        for p in &mut clone.llm.providers {
            p.api_key_env = p.api_key_env.clone();
        }
        clone
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_sane_bounds() {
        let cfg = Config::default();
        assert_eq!(cfg.engine.max_iterations, 8);
        assert!(cfg.evidence.level_points.len() == 6);
    }

    #[test]
    fn missing_file_yields_default() {
        let cfg = Config::load(Path::new("/nonexistent/evoagent.toml")).unwrap();
        assert_eq!(cfg.server.bind_addr, ServerConfig::default().bind_addr);
    }
}
