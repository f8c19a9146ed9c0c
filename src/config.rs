//! Application settings.
//!
//! Configuration is layered: config files first, then `APP_`-prefixed
//! environment variables, then plain environment variables. Secrets are
//! expected to arrive through the environment, never through files
//! committed to the repository.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

/// Chat model engine used when none is configured.
pub const DEFAULT_MODEL_ENGINE: &str = "gpt-3.5-turbo";

/// Conversation pairs remembered per user when none is configured.
pub const DEFAULT_MEMORY_WINDOW: usize = 2;

/// System prompt applied to users who have not registered their own.
pub const DEFAULT_SYSTEM_MESSAGE: &str = "あなたは日本語で丁寧に答える有能なアシスタントです。";

const DEFAULT_SERVER_HOST: &str = "0.0.0.0";
const DEFAULT_SERVER_PORT: u16 = 8080;
const DEFAULT_STORAGE_FILE: &str = "db.json";

/// Application settings.
///
/// Numeric knobs are kept as strings so the same field can be fed from
/// TOML files or environment variables without type mismatches; the
/// accessor methods parse and fall back to defaults.
#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    /// LINE channel secret, used to verify webhook signatures.
    pub line_channel_secret: String,
    /// LINE channel access token, used to call the reply API.
    pub line_channel_access_token: String,
    /// OpenAI API token for users who never registered their own.
    #[serde(default)]
    pub default_api_token: Option<String>,
    /// System prompt override for new conversations.
    #[serde(default)]
    pub system_message: Option<String>,
    /// OpenAI chat model engine.
    #[serde(default)]
    pub model_engine: Option<String>,
    /// Remembered conversation pairs per user.
    #[serde(default, rename = "memory_window")]
    pub memory_window_str: Option<String>,
    /// Bind host for the webhook server.
    #[serde(default)]
    pub server_host: Option<String>,
    /// Bind port for the webhook server.
    #[serde(default, rename = "server_port")]
    pub server_port_str: Option<String>,
    /// Credential storage backend, `file` or `r2`.
    #[serde(default)]
    pub storage_backend: Option<String>,
    /// Path of the credential JSON file for the `file` backend.
    #[serde(default)]
    pub storage_file: Option<String>,
    /// R2 access key id.
    #[serde(default)]
    pub r2_access_key_id: Option<String>,
    /// R2 secret access key.
    #[serde(default)]
    pub r2_secret_access_key: Option<String>,
    /// R2 endpoint URL.
    #[serde(default)]
    pub r2_endpoint_url: Option<String>,
    /// R2 bucket holding the credential object.
    #[serde(default)]
    pub r2_bucket_name: Option<String>,
}

impl Settings {
    /// Loads settings from config files and the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when no source supplies the required
    /// LINE channel credentials or when a config file is malformed.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("app"))
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Settings = s.try_deserialize()?;
        settings.apply_env_overrides();
        Ok(settings)
    }

    /// Direct environment fallbacks for deployments that export the R2
    /// credentials under their conventional names only.
    fn apply_env_overrides(&mut self) {
        if self.r2_access_key_id.is_none() {
            self.r2_access_key_id = std::env::var("R2_ACCESS_KEY_ID").ok();
        }
        if self.r2_secret_access_key.is_none() {
            self.r2_secret_access_key = std::env::var("R2_SECRET_ACCESS_KEY").ok();
        }
        if self.r2_endpoint_url.is_none() {
            self.r2_endpoint_url = std::env::var("R2_ENDPOINT_URL").ok();
        }
        if self.r2_bucket_name.is_none() {
            self.r2_bucket_name = std::env::var("R2_BUCKET_NAME").ok();
        }
    }

    /// Chat model engine, falling back to [`DEFAULT_MODEL_ENGINE`].
    #[must_use]
    pub fn model(&self) -> &str {
        self.model_engine.as_deref().unwrap_or(DEFAULT_MODEL_ENGINE)
    }

    /// Remembered conversation pairs, falling back to [`DEFAULT_MEMORY_WINDOW`].
    #[must_use]
    pub fn memory_window(&self) -> usize {
        self.memory_window_str
            .as_deref()
            .and_then(|s| s.trim().parse().ok())
            .unwrap_or(DEFAULT_MEMORY_WINDOW)
    }

    /// System prompt for users without a personal override.
    #[must_use]
    pub fn default_system_message(&self) -> String {
        self.system_message
            .clone()
            .unwrap_or_else(|| DEFAULT_SYSTEM_MESSAGE.to_string())
    }

    /// Socket address the webhook server binds to.
    #[must_use]
    pub fn bind_addr(&self) -> String {
        let host = self.server_host.as_deref().unwrap_or(DEFAULT_SERVER_HOST);
        let port = self
            .server_port_str
            .as_deref()
            .and_then(|s| s.trim().parse::<u16>().ok())
            .unwrap_or(DEFAULT_SERVER_PORT);
        format!("{host}:{port}")
    }

    /// Whether credentials should be persisted to Cloudflare R2.
    #[must_use]
    pub fn use_r2(&self) -> bool {
        matches!(self.storage_backend.as_deref(), Some("r2"))
    }

    /// Path of the credential file for the `file` backend.
    #[must_use]
    pub fn storage_path(&self) -> &str {
        self.storage_file.as_deref().unwrap_or(DEFAULT_STORAGE_FILE)
    }
}

#[cfg(test)]
impl Settings {
    /// Minimal settings for tests, with only the required fields set.
    #[must_use]
    pub fn for_tests() -> Self {
        Self {
            line_channel_secret: "secret".to_string(),
            line_channel_access_token: "token".to_string(),
            default_api_token: None,
            system_message: None,
            model_engine: None,
            memory_window_str: None,
            server_host: None,
            server_port_str: None,
            storage_backend: None,
            storage_file: None,
            r2_access_key_id: None,
            r2_secret_access_key: None,
            r2_endpoint_url: None,
            r2_bucket_name: None,
        }
    }
}
