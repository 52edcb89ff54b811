//! # configs
//!
//! Layered dashboard configuration. Later layers win:
//! built-in defaults, an optional `dashboard.toml`, `.env`, then
//! `DASHBOARD__SECTION__KEY` environment variables.

use config::{Config, Environment, File};
use secrecy::SecretString;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

pub const ENV_PREFIX: &str = "DASHBOARD";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub timeout_ms: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000/api".into(),
            timeout_ms: 15_000,
        }
    }
}

impl ApiConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PushConfig {
    /// Live updates are disabled when unset
    pub url: Option<String>,
    pub connect_delay_ms: u64,
    pub connect_timeout_ms: u64,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for PushConfig {
    fn default() -> Self {
        Self {
            url: None,
            connect_delay_ms: 100,
            connect_timeout_ms: 5_000,
            reconnect_attempts: 3,
            reconnect_delay_ms: 1_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FallbackConfig {
    pub enabled: bool,
    pub latency_ms: u64,
}

impl Default for FallbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            latency_ms: 300,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialsMode {
    /// `x-user` role labels
    #[default]
    Label,
    /// `Authorization: Bearer` per role
    Token,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct CredentialsConfig {
    pub mode: CredentialsMode,
    pub contributor_label: String,
    pub admin_label: String,
    #[serde(deserialize_with = "optional_secret")]
    pub contributor_token: Option<SecretString>,
    #[serde(deserialize_with = "optional_secret")]
    pub admin_token: Option<SecretString>,
}

impl Default for CredentialsConfig {
    fn default() -> Self {
        Self {
            mode: CredentialsMode::Label,
            contributor_label: "reliefAdmin".into(),
            admin_label: "netrunnerX".into(),
            contributor_token: None,
            admin_token: None,
        }
    }
}

fn optional_secret<'de, D>(deserializer: D) -> Result<Option<SecretString>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.filter(|s| !s.is_empty()).map(SecretString::from))
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub json: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub api: ApiConfig,
    pub push: PushConfig,
    pub fallback: FallbackConfig,
    pub credentials: CredentialsConfig,
    pub server: ServerConfig,
    pub log: LogConfig,
}

impl DashboardConfig {
    /// Loads `.env`, then `dashboard.toml` from the working directory if
    /// present, then the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Err(err) = dotenvy::dotenv() {
            if !err.not_found() {
                tracing::warn!(error = %err, "ignoring unreadable .env file");
            }
        }
        let config = Config::builder()
            .add_source(File::with_name("dashboard").required(false))
            .add_source(environment())
            .build()?;
        Self::finish(config)
    }

    /// Loads from an explicit file and variable map without touching the
    /// process environment.
    pub fn load_from(
        file: Option<&Path>,
        vars: HashMap<String, String>,
    ) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }
        let config = builder.add_source(environment().source(Some(vars))).build()?;
        Self::finish(config)
    }

    fn finish(config: Config) -> Result<Self, ConfigError> {
        let loaded: DashboardConfig = config.try_deserialize()?;
        loaded.validate()?;
        Ok(loaded)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api.base_url.as_str();
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(ConfigError::Invalid(format!(
                "api.base_url must be an http(s) URL, got {base:?}"
            )));
        }
        if self.push.reconnect_attempts == 0 {
            return Err(ConfigError::Invalid(
                "push.reconnect_attempts must be at least 1".into(),
            ));
        }
        if self.credentials.mode == CredentialsMode::Token
            && (self.credentials.contributor_token.is_none()
                || self.credentials.admin_token.is_none())
        {
            return Err(ConfigError::Invalid(
                "credentials.mode = token requires contributor_token and admin_token".into(),
            ));
        }
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .separator("__")
        .try_parsing(true)
}
