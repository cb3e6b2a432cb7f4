//! Shared helpers for real (non-mock) provider adapters.

use evoagent_domain::error::{Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}

/// Read the API key named by `api_key_env` out of the process environment.
pub(crate) fn resolve_api_key(provider_id: &str, api_key_env: Option<&str>) -> Result<String> {
    let env_var = api_key_env.ok_or_else(|| {
        Error::Config(format!(
            "provider '{provider_id}' has no api_key_env configured"
        ))
    })?;
    std::env::var(env_var).map_err(|_| {
        Error::Config(format!(
            "environment variable '{env_var}' not set for provider '{provider_id}'"
        ))
    })
}
