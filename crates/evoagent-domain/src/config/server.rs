use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "d_bind_addr")]
    pub bind_addr: String,
    #[serde(default = "d_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: d_bind_addr(),
            cors_origins: d_cors_origins(),
        }
    }
}

fn d_bind_addr() -> String {
    "127.0.0.1:8787".to_string()
}

fn d_cors_origins() -> Vec<String> {
    vec!["*".to_string()]
}

/// Where the Conversation Event Store persists its JSON state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventStoreConfig {
    #[serde(default = "d_events_root")]
    pub state_root: String,
}

impl Default for EventStoreConfig {
    fn default() -> Self {
        Self {
            state_root: d_events_root(),
        }
    }
}

fn d_events_root() -> String {
    "./state/events".to_string()
}

/// Where the Artifact Store writes request/response/raw payloads, and
/// where the per-source content cache lives.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArtifactStoreConfig {
    #[serde(default = "d_artifact_root")]
    pub artifact_root: String,
    #[serde(default = "d_cache_root")]
    pub source_cache_root: String,
}

impl Default for ArtifactStoreConfig {
    fn default() -> Self {
        Self {
            artifact_root: d_artifact_root(),
            source_cache_root: d_cache_root(),
        }
    }
}

fn d_artifact_root() -> String {
    "./state/artifacts".to_string()
}

fn d_cache_root() -> String {
    "./state/cache".to_string()
}
