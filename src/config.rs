use std::env;
use thiserror::Error;

/// Default provider endpoint when `OPENAI_BASE_URL` is not set.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
/// Chat model used when a request does not name one.
pub const DEFAULT_CHAT_MODEL: &str = "gpt-3.5-turbo";
/// Model used for document summaries.
pub const DEFAULT_SUMMARY_MODEL: &str = "gpt-4-turbo";

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
}

/// Runtime configuration for the chatdoc server.
#[derive(Debug, Clone)]
pub struct Config {
    /// Credential sent as a bearer token to the completion provider.
    pub openai_api_key: String,
    /// Base URL of the OpenAI-compatible provider.
    pub openai_base_url: String,
    /// Model applied to chat requests that omit `model`.
    pub chat_default_model: String,
    /// Model used when summarizing uploaded documents.
    pub summary_model: String,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            openai_api_key: load_env("OPENAI_API_KEY")?,
            openai_base_url: load_env_optional("OPENAI_BASE_URL")
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            chat_default_model: load_env_optional("CHAT_DEFAULT_MODEL")
                .unwrap_or_else(|| DEFAULT_CHAT_MODEL.to_string()),
            summary_model: load_env_optional("SUMMARY_MODEL")
                .unwrap_or_else(|| DEFAULT_SUMMARY_MODEL.to_string()),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    load_env_optional(key).ok_or_else(|| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Load `.env` (when present) and read the configuration from the environment.
pub fn init_config() -> Result<Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        base_url = %config.openai_base_url,
        chat_model = %config.chat_default_model,
        summary_model = %config.summary_model,
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    Ok(config)
}
