//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Invitation configuration.
    #[serde(default)]
    pub invitations: InvitationConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Database connection URL (`postgres://...` or `sqlite:...`).
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait when connecting or acquiring a pooled connection.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Invitation configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct InvitationConfig {
    /// Length of generated invitation tokens.
    #[serde(default = "default_token_length")]
    pub token_length: usize,
    /// Expiry applied when the creator does not choose one. `None` never expires.
    #[serde(default)]
    pub default_expiry_hours: Option<i64>,
}

impl Default for InvitationConfig {
    fn default() -> Self {
        Self {
            token_length: default_token_length(),
            default_expiry_hours: None,
        }
    }
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

const fn default_timeout_secs() -> u64 {
    10
}

const fn default_token_length() -> usize {
    10
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `AIPONGE_ENV`)
    /// 3. Environment variables with `AIPONGE__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("AIPONGE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("AIPONGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("AIPONGE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
