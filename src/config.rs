//! Configuration for the taskweave binary.
//!
//! Configuration can be set via environment variables:
//! - `OPENROUTER_API_KEY` - Required. Your OpenRouter API key.
//! - `DEFAULT_MODEL` - Optional. The decision model to use. Defaults to `openai/gpt-5-mini`.
//! - `MAX_ITERS` - Optional. Coordinator iteration budget. Defaults to `5`.
//! - `SPECIALIST_MAX_ITERS` - Optional. Specialist iteration budget. Defaults to `3`.
//! - `DECISION_TIMEOUT_SECS` - Optional. Per-turn model decision timeout.
//! - `TOOL_TIMEOUT_SECS` - Optional. Per-turn tool execution timeout.

use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Runtime configuration, loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// OpenRouter API key.
    pub openrouter_api_key: String,

    /// Decision model identifier.
    pub default_model: String,

    /// Coordinator iteration budget.
    pub max_iters: usize,

    /// Specialist iteration budget.
    pub specialist_max_iters: usize,

    /// Per-turn model decision timeout.
    pub decision_timeout: Option<Duration>,

    /// Per-turn tool execution timeout.
    pub tool_timeout: Option<Duration>,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        let openrouter_api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| ConfigError::MissingEnvVar("OPENROUTER_API_KEY".to_string()))?;

        let default_model =
            std::env::var("DEFAULT_MODEL").unwrap_or_else(|_| "openai/gpt-5-mini".to_string());

        Ok(Self {
            openrouter_api_key,
            default_model,
            max_iters: parse_env("MAX_ITERS")?.unwrap_or(5),
            specialist_max_iters: parse_env("SPECIALIST_MAX_ITERS")?.unwrap_or(3),
            decision_timeout: parse_env("DECISION_TIMEOUT_SECS")?.map(Duration::from_secs),
            tool_timeout: parse_env("TOOL_TIMEOUT_SECS")?.map(Duration::from_secs),
        })
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(name.to_string(), raw)),
        Err(_) => Ok(None),
    }
}
