//! TrueFinals client error types.

use std::sync::Arc;

/// Errors from the TrueFinals API client.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UpstreamError {
    /// User id or API key not configured.
    #[error("missing credentials: {0}")]
    MissingCredentials(&'static str),

    /// Endpoint path is not a TrueFinals API path.
    #[error("invalid endpoint path: {0}")]
    InvalidPath(String),

    /// Request timeout.
    #[error("request timeout")]
    Timeout,

    /// Network error.
    #[error("network error: {0}")]
    Network(Arc<reqwest::Error>),

    /// Response body could not be read.
    #[error("parse error: {0}")]
    Parse(String),
}

impl UpstreamError {
    /// Whether a request actually left this process.
    ///
    /// Only these failures are recorded in the request history and count
    /// toward the rate-limit window.
    pub fn reached_network(&self) -> bool {
        matches!(self, UpstreamError::Timeout | UpstreamError::Network(_) | UpstreamError::Parse(_))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { UpstreamError::Timeout } else { UpstreamError::Network(Arc::new(err)) }
    }
}

impl From<UpstreamError> for bracketeer_core::Error {
    fn from(err: UpstreamError) -> Self {
        match err {
            UpstreamError::MissingCredentials(field) => bracketeer_core::Error::MissingCredentials(field.to_string()),
            UpstreamError::InvalidPath(path) => bracketeer_core::Error::InvalidInput(path),
            other => bracketeer_core::Error::Upstream(other.to_string()),
        }
    }
}
