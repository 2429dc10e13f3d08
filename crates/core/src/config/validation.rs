//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },

    #[error("missing required configuration: {field} ({hint})")]
    Missing { field: String, hint: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` or `api_base_url` is empty, or the base URL is not http(s)
    /// - `purge_max_age_secs` is shorter than the failed-row window (600s)
    /// - a tournament id is empty
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if !(self.api_base_url.starts_with("https://") || self.api_base_url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                field: "api_base_url".into(),
                reason: "must be an http(s) URL".into(),
            });
        }

        if self.purge_max_age_secs < 600 {
            return Err(ConfigError::Invalid {
                field: "purge_max_age_secs".into(),
                reason: "must be at least 600 seconds".into(),
            });
        }

        if self.tournaments.iter().any(|t| t.id.trim().is_empty()) {
            return Err(ConfigError::Invalid { field: "tournaments".into(), reason: "tournament id must not be empty".into() });
        }

        if self.truefinals_user_id.is_none() || self.truefinals_api_key.is_none() {
            tracing::warn!("TrueFinals credentials not provided; upstream requests will fail until they are set");
        }

        if self.auth_error_expiry_secs > self.purge_max_age_secs {
            tracing::warn!(
                auth_error_expiry_secs = self.auth_error_expiry_secs,
                purge_max_age_secs = self.purge_max_age_secs,
                "auth error expiry exceeds purge age; cached auth failures are purged before they expire"
            );
        }

        Ok(())
    }
}
