//! Configuration loading for Zoro Lite.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `ZORO_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use crate::sources::SourceSite;

/// Minimum decoded length of the action token secret.
pub const MIN_ACTION_SECRET_LEN: usize = 32;

/// Application configuration derived from `ZORO_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub operator_tokens: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_secret: Option<Vec<u8>>,
    #[serde(default = "default_action_token_lifetime_seconds")]
    pub action_token_lifetime_seconds: u64,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: PathBuf,
    #[serde(default = "default_providers_cache_ttl_seconds")]
    pub providers_cache_ttl_seconds: u64,
    #[serde(default = "default_notice_ttl_seconds")]
    pub notice_ttl_seconds: u64,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub source_sites: BTreeMap<String, SourceSite>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_backend_url: Option<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            operator_tokens: Vec::new(),
            action_secret: None,
            action_token_lifetime_seconds: default_action_token_lifetime_seconds(),
            cache_dir: default_cache_dir(),
            providers_cache_ttl_seconds: default_providers_cache_ttl_seconds(),
            notice_ttl_seconds: default_notice_ttl_seconds(),
            source_sites: BTreeMap::new(),
            source_backend_url: None,
        }
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// Time-to-live of the cached provider listing.
    pub fn providers_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.providers_cache_ttl_seconds)
    }

    /// Default time-to-live of a notice queue.
    pub fn notice_ttl(&self) -> Duration {
        Duration::from_secs(self.notice_ttl_seconds)
    }

    /// Returns true for profiles where relaxed local defaults apply.
    pub fn is_local_profile(&self) -> bool {
        matches!(self.profile.as_str(), "local" | "test")
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if !config.operator_tokens.is_empty() {
            config.operator_tokens = vec!["[REDACTED]".to_string()];
        }
        if config.action_secret.is_some() {
            config.action_secret = Some(b"[REDACTED]".to_vec());
        }
        for site in config.source_sites.values_mut() {
            if !site.access_key.is_empty() {
                site.access_key = "[REDACTED]".to_string();
            }
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.operator_tokens.is_empty() {
            return Err(ConfigError::MissingOperatorTokens);
        }

        match self.action_secret {
            Some(ref secret) if secret.len() < MIN_ACTION_SECRET_LEN => {
                return Err(ConfigError::InvalidActionSecretLength {
                    length: secret.len(),
                });
            }
            None if !self.is_local_profile() => return Err(ConfigError::MissingActionSecret),
            _ => {}
        }

        // Tokens are bucketed into half-lifetime ticks.
        if self.action_token_lifetime_seconds < 2 {
            return Err(ConfigError::InvalidDuration {
                field: "ACTION_TOKEN_LIFETIME_SECONDS",
                value: self.action_token_lifetime_seconds,
            });
        }
        if self.providers_cache_ttl_seconds == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "PROVIDERS_CACHE_TTL_SECONDS",
                value: self.providers_cache_ttl_seconds,
            });
        }
        if self.notice_ttl_seconds == 0 {
            return Err(ConfigError::InvalidDuration {
                field: "NOTICE_TTL_SECONDS",
                value: self.notice_ttl_seconds,
            });
        }

        for (name, site) in &self.source_sites {
            Url::parse(&site.url).map_err(|source| ConfigError::InvalidSourceSiteUrl {
                name: name.clone(),
                source,
            })?;
        }

        if let Some(ref backend) = self.source_backend_url {
            Url::parse(backend).map_err(|source| ConfigError::InvalidSourceBackendUrl {
                value: backend.clone(),
                source,
            })?;
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://zoro-lite.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_action_token_lifetime_seconds() -> u64 {
    86_400
}

fn default_cache_dir() -> PathBuf {
    PathBuf::from("storage/framework/cache/data")
}

fn default_providers_cache_ttl_seconds() -> u64 {
    600 // 10 minutes
}

fn default_notice_ttl_seconds() -> u64 {
    60
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("no operator tokens configured; set ZORO_OPERATOR_TOKEN or ZORO_OPERATOR_TOKENS")]
    MissingOperatorTokens,
    #[error("action secret is missing; set ZORO_ACTION_SECRET environment variable")]
    MissingActionSecret,
    #[error("action secret is invalid base64: {error}")]
    InvalidActionSecretBase64 { error: String },
    #[error("action secret must decode to at least 32 bytes, got {length} bytes")]
    InvalidActionSecretLength { length: usize },
    #[error("{field} must be a positive number of seconds, got {value}")]
    InvalidDuration { field: &'static str, value: u64 },
    #[error("{field} is not a valid number: '{value}'")]
    InvalidNumber { field: &'static str, value: String },
    #[error("source sites must be a JSON object of site entries: {source}")]
    InvalidSourceSites { source: serde_json::Error },
    #[error("source site '{name}' has an invalid url: {source}")]
    InvalidSourceSiteUrl {
        name: String,
        source: url::ParseError,
    },
    #[error("invalid source backend url '{value}': {source}")]
    InvalidSourceBackendUrl {
        value: String,
        source: url::ParseError,
    },
}

/// Loads configuration using layered `.env` files and `ZORO_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads, merges and validates the layered configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix("ZORO_") {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);

        // Support both a single token and a comma-separated list
        let operator_tokens = if let Some(tokens) = layered.remove("OPERATOR_TOKENS") {
            tokens
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect()
        } else if let Some(token) = layered.remove("OPERATOR_TOKEN") {
            vec![token]
        } else {
            Vec::new()
        };

        let action_secret = match layered.remove("ACTION_SECRET").filter(|v| !v.is_empty()) {
            Some(secret) => {
                use base64::{Engine as _, engine::general_purpose};
                Some(general_purpose::STANDARD.decode(secret.trim()).map_err(|e| {
                    ConfigError::InvalidActionSecretBase64 {
                        error: e.to_string(),
                    }
                })?)
            }
            None => None,
        };

        let action_token_lifetime_seconds = parse_seconds(
            &mut layered,
            "ACTION_TOKEN_LIFETIME_SECONDS",
            default_action_token_lifetime_seconds,
        )?;
        let providers_cache_ttl_seconds = parse_seconds(
            &mut layered,
            "PROVIDERS_CACHE_TTL_SECONDS",
            default_providers_cache_ttl_seconds,
        )?;
        let notice_ttl_seconds =
            parse_seconds(&mut layered, "NOTICE_TTL_SECONDS", default_notice_ttl_seconds)?;

        let cache_dir = layered
            .remove("CACHE_DIR")
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(default_cache_dir);

        let source_sites = match layered.remove("SOURCE_SITES").filter(|v| !v.trim().is_empty()) {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|source| ConfigError::InvalidSourceSites { source })?,
            None => BTreeMap::new(),
        };

        let source_backend_url = layered
            .remove("SOURCE_BACKEND_URL")
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty());

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            operator_tokens,
            action_secret,
            action_token_lifetime_seconds,
            cache_dir,
            providers_cache_ttl_seconds,
            notice_ttl_seconds,
            source_sites,
            source_backend_url,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("ZORO_PROFILE")
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix("ZORO_") {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn parse_seconds(
    layered: &mut BTreeMap<String, String>,
    field: &'static str,
    default: fn() -> u64,
) -> Result<u64, ConfigError> {
    match layered.remove(field).filter(|v| !v.trim().is_empty()) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { field, value: raw }),
        None => Ok(default()),
    }
}
