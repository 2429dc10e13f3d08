//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (BRACKETEER_*)
//! 2. TOML config file (if BRACKETEER_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};

mod validation;

pub use validation::ConfigError;

/// Whether the request-cache rate-limit gate blocks upstream calls.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitPolicy {
    /// Check and log only; upstream calls proceed on every miss.
    #[default]
    Advisory,
    /// While rate limited, serve the newest stored row instead of calling upstream.
    Enforce,
}

/// A tournament this event pulls matches from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TournamentKey {
    pub id: String,
    #[serde(default)]
    pub weightclass: Option<String>,
    #[serde(default = "default_tourn_type")]
    pub tourn_type: String,
}

impl TournamentKey {
    pub fn is_truefinals(&self) -> bool {
        self.tourn_type == "truefinals"
    }
}

fn default_tourn_type() -> String {
    "truefinals".into()
}

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (BRACKETEER_*)
/// 2. TOML config file (if BRACKETEER_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// TrueFinals user id sent as `x-api-user-id`.
    ///
    /// Set via BRACKETEER_TRUEFINALS_USER_ID environment variable.
    #[serde(default)]
    pub truefinals_user_id: Option<String>,

    /// TrueFinals API key sent as `x-api-key`.
    ///
    /// Set via BRACKETEER_TRUEFINALS_API_KEY environment variable.
    #[serde(default)]
    pub truefinals_api_key: Option<String>,

    /// Base URL that endpoint paths are appended to.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Path to SQLite cache database.
    ///
    /// Set via BRACKETEER_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for upstream requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Upstream request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Address the HTTP/WebSocket server binds to.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// Whether the rate-limit gate blocks upstream calls.
    #[serde(default)]
    pub rate_limit_policy: RateLimitPolicy,

    /// Upper bound on freshness for cached 401/403 answers.
    #[serde(default = "default_auth_error_expiry_secs")]
    pub auth_error_expiry_secs: u64,

    /// Age after which the background purge drops every row.
    #[serde(default = "default_purge_max_age_secs")]
    pub purge_max_age_secs: u64,

    /// Seconds between background purges; 0 disables them.
    #[serde(default = "default_purge_interval_secs")]
    pub purge_interval_secs: u64,

    /// Event name shown on the dashboard.
    #[serde(default)]
    pub event_name: Option<String>,

    /// Tournaments whose matches feed the queue.
    #[serde(default)]
    pub tournaments: Vec<TournamentKey>,

    /// Arena (cage) ids in use at this event.
    #[serde(default)]
    pub cages: Vec<u32>,
}

fn default_api_base_url() -> String {
    "https://truefinals.com/api".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./bracketeer-cache.sqlite")
}

fn default_user_agent() -> String {
    "bracketeer/0.1".into()
}

fn default_timeout_ms() -> u64 {
    10_000
}

fn default_bind_addr() -> String {
    "0.0.0.0:8080".into()
}

fn default_auth_error_expiry_secs() -> u64 {
    30
}

fn default_purge_max_age_secs() -> u64 {
    3600
}

fn default_purge_interval_secs() -> u64 {
    300
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            truefinals_user_id: None,
            truefinals_api_key: None,
            api_base_url: default_api_base_url(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            bind_addr: default_bind_addr(),
            rate_limit_policy: RateLimitPolicy::default(),
            auth_error_expiry_secs: default_auth_error_expiry_secs(),
            purge_max_age_secs: default_purge_max_age_secs(),
            purge_interval_secs: default_purge_interval_secs(),
            event_name: None,
            tournaments: Vec::new(),
            cages: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Background purge interval, or None when disabled.
    pub fn purge_interval(&self) -> Option<Duration> {
        (self.purge_interval_secs > 0).then(|| Duration::from_secs(self.purge_interval_secs))
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `BRACKETEER_`
    /// 2. TOML file from `BRACKETEER_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("BRACKETEER_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("BRACKETEER_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }

    /// Both upstream credentials, as `(user_id, api_key)`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` naming the first absent credential.
    pub fn require_credentials(&self) -> Result<(&str, &str), ConfigError> {
        let user_id = self
            .truefinals_user_id
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "truefinals_user_id".into(),
                hint: "Set BRACKETEER_TRUEFINALS_USER_ID environment variable".into(),
            })?;
        let api_key = self
            .truefinals_api_key
            .as_deref()
            .filter(|v| !v.is_empty())
            .ok_or_else(|| ConfigError::Missing {
                field: "truefinals_api_key".into(),
                hint: "Set BRACKETEER_TRUEFINALS_API_KEY environment variable".into(),
            })?;
        Ok((user_id, api_key))
    }

    /// Configured entry for a tournament id.
    pub fn tournament(&self, id: &str) -> Option<&TournamentKey> {
        self.tournaments.iter().find(|t| t.id == id)
    }
}
