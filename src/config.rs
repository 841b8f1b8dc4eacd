//! Settings loaded from the process environment (and `.env`, if present).

use std::path::PathBuf;

use config::{Config, Environment};
use serde::Deserialize;
use thiserror::Error;

use crate::api::telegram::DEFAULT_API_URL;
use crate::application::DEFAULT_CHUNK_SIZE;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} env var is required")]
    Missing(&'static str),

    #[error("invalid {name}: {reason}")]
    Invalid { name: &'static str, reason: String },

    #[error("failed to load settings: {0}")]
    Load(#[from] config::ConfigError),
}

#[derive(Debug, Clone, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub bot_token: String,
    /// Public base URL; the webhook path is appended to it.
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "default_port")]
    pub port: u16,
    pub tmp_dir: Option<PathBuf>,
    /// Last webhook path segment. Falls back to the bot token.
    pub webhook_secret: Option<String>,
    #[serde(default = "default_api_url")]
    pub telegram_api_url: String,
}

const fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}

const fn default_port() -> u16 {
    8000
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Settings {
    /// Load from the real environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if a required variable is missing or a value
    /// does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::load(Environment::default().try_parsing(true))
    }

    fn load(source: Environment) -> Result<Self, ConfigError> {
        let settings: Settings = Config::builder()
            .add_source(source)
            .build()?
            .try_deserialize()?;
        settings.validate()
    }

    fn validate(mut self) -> Result<Self, ConfigError> {
        if self.bot_token.trim().is_empty() {
            return Err(ConfigError::Missing("BOT_TOKEN"));
        }
        if self.webhook_url.trim().is_empty() {
            return Err(ConfigError::Missing("WEBHOOK_URL"));
        }
        if self.chunk_size == 0 {
            return Err(ConfigError::Invalid {
                name: "CHUNK_SIZE",
                reason: "must be greater than zero".to_string(),
            });
        }
        if let Some(secret) = &self.webhook_secret {
            if secret.is_empty() || secret.contains('/') {
                return Err(ConfigError::Invalid {
                    name: "WEBHOOK_SECRET",
                    reason: "must be a single non-empty path segment".to_string(),
                });
            }
        }

        self.webhook_url = self.webhook_url.trim().trim_end_matches('/').to_string();
        Ok(self)
    }

    pub fn webhook_secret(&self) -> &str {
        self.webhook_secret.as_deref().unwrap_or(&self.bot_token)
    }

    pub fn webhook_path(&self) -> String {
        format!("/webhook/{}", self.webhook_secret())
    }

    pub fn full_webhook_url(&self) -> String {
        format!("{}{}", self.webhook_url, self.webhook_path())
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.tmp_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}
