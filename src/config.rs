use config::{Config as ConfigBuilder, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::auth::config::{JwtConfig, OAuthConfig, SessionConfig};
use crate::auth::jwt::parse_algorithm;
use crate::cache::config::CacheConfig;
use crate::database::config::DatabaseConfig;

const ENV_PREFIX: &str = "IDENTITY";

/// Longest accepted token or session lifetime (100 years)
const MAX_TTL_SECS: u64 = 100 * 365 * 24 * 3600;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub oauth: OAuthConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Identity providers with a built-in client
const SUPPORTED_OAUTH_PROVIDERS: [&str; 1] = ["github"];

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if Path::new("config.yaml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(environment());

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let mut builder =
            ConfigBuilder::builder().add_source(config::Config::try_from(&Config::default())?);

        if path.as_ref().exists() {
            builder = builder.add_source(File::from(path.as_ref()));
        }

        builder = builder.add_source(environment());

        let config: Config = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the token services cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.trim().is_empty() {
            return Err(ConfigError::Message(
                "jwt.secret must be set (IDENTITY_JWT__SECRET)".to_string(),
            ));
        }
        check_ttl("jwt.access_token_ttl", self.jwt.access_token_ttl)?;
        check_ttl("session.refresh_token_ttl", self.session.refresh_token_ttl)?;
        if self.session.hash_key.trim().is_empty() {
            return Err(ConfigError::Message(
                "session.hash_key must not be empty".to_string(),
            ));
        }
        parse_algorithm(&self.jwt.algorithm).map_err(|e| ConfigError::Message(e.to_string()))?;
        self.validate_oauth()?;
        match self.cache.backend.as_str() {
            "memory" | "redis" => Ok(()),
            other => Err(ConfigError::Message(format!(
                "cache.backend must be 'memory' or 'redis', got '{}'",
                other
            ))),
        }
    }
}

impl Config {
    fn validate_oauth(&self) -> Result<(), ConfigError> {
        for (name, provider) in &self.oauth.providers {
            if !SUPPORTED_OAUTH_PROVIDERS.contains(&name.as_str()) {
                return Err(ConfigError::Message(format!(
                    "oauth.providers.{} has no built-in client (supported: {})",
                    name,
                    SUPPORTED_OAUTH_PROVIDERS.join(", ")
                )));
            }
            if provider.client_id.trim().is_empty() || provider.client_secret.trim().is_empty() {
                return Err(ConfigError::Message(format!(
                    "oauth.providers.{} needs client_id and client_secret",
                    name
                )));
            }
        }
        if self.oauth.request_timeout == 0 {
            return Err(ConfigError::Message(
                "oauth.request_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn check_ttl(name: &str, secs: u64) -> Result<(), ConfigError> {
    if secs == 0 || secs > MAX_TTL_SECS {
        return Err(ConfigError::Message(format!(
            "{} must be between 1 and {} seconds, got {}",
            name, MAX_TTL_SECS, secs
        )));
    }
    Ok(())
}
