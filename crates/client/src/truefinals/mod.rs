//! TrueFinals REST API client.
//!
//! ### Specification
//!
//! - **Base URL**: `https://truefinals.com/api`, endpoint paths are appended verbatim.
//! - **Authentication**: `x-api-user-id` and `x-api-key` headers.
//! - **Rate Limiting**: the upstream allows roughly 10 requests per 10 seconds
//!   and advertises its counters in `X-RateLimit-*` headers. This client does
//!   not retry or throttle; the request cache owns that policy.
//! - **Responses**: every status is returned as an [`UpstreamResponse`]. Only
//!   transport failures are errors.

pub mod error;
pub mod response;

pub use error::UpstreamError;
pub use response::{RateLimitHeaders, UpstreamResponse};

use async_trait::async_trait;
use bracketeer_core::AppConfig;
use bracketeer_core::cache::hash::fingerprint;
use reqwest::header;
use std::sync::{Arc, LazyLock};
use std::time::{Duration, Instant};

/// Default base URL for the TrueFinals API.
const DEFAULT_BASE_URL: &str = "https://truefinals.com/api";

/// Default request timeout.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default user agent.
const DEFAULT_USER_AGENT: &str = "bracketeer/0.1";

/// Path used to validate credentials.
pub const CREDENTIAL_CHECK_PATH: &str = "/v1/user/tournaments";

static ENDPOINT_PATH: LazyLock<regex::Regex> =
    LazyLock::new(|| regex::Regex::new(r"^/v1(/[A-Za-z0-9_~-]+)+$").expect("endpoint path pattern is valid"));

/// Whether `path` looks like a TrueFinals API path such as `/v1/tournaments/abc/games`.
pub fn is_valid_endpoint_path(path: &str) -> bool {
    ENDPOINT_PATH.is_match(path)
}

/// Anything that can answer a GET for an endpoint path.
///
/// The request cache talks to the upstream only through this trait.
#[async_trait]
pub trait Upstream: Send + Sync {
    async fn get(&self, endpoint_path: &str) -> Result<UpstreamResponse, UpstreamError>;
}

/// The two TrueFinals credential values.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub user_id: String,
    pub api_key: String,
}

impl Credentials {
    pub fn new(user_id: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self { user_id: user_id.into(), api_key: api_key.into() }
    }

    /// The same values in the opposite header positions.
    pub fn swapped(&self) -> Self {
        Self { user_id: self.api_key.clone(), api_key: self.user_id.clone() }
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("user_id", &fingerprint(&self.user_id))
            .field("api_key", &fingerprint(&self.api_key))
            .finish()
    }
}

/// TrueFinals client configuration.
#[derive(Debug, Clone)]
pub struct TrueFinalsConfig {
    /// None when credentials are not configured; requests then fail fast.
    pub credentials: Option<Credentials>,
    /// Base URL (default: https://truefinals.com/api).
    pub base_url: String,
    /// Request timeout (default: 10s).
    pub timeout: Duration,
    /// User-agent string (default: bracketeer/0.x).
    pub user_agent: String,
}

impl Default for TrueFinalsConfig {
    fn default() -> Self {
        Self {
            credentials: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl TrueFinalsConfig {
    /// Build from the application configuration.
    ///
    /// Missing credentials are tolerated here; they surface per request.
    pub fn from_app_config(config: &AppConfig) -> Self {
        let credentials = config
            .require_credentials()
            .ok()
            .map(|(user_id, api_key)| Credentials::new(user_id, api_key));
        Self {
            credentials,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            timeout: config.timeout(),
            user_agent: config.user_agent.clone(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }
}

/// TrueFinals API client.
#[derive(Debug, Clone)]
pub struct TrueFinalsClient {
    http: reqwest::Client,
    config: TrueFinalsConfig,
}

impl TrueFinalsClient {
    /// Create a new client with the given configuration.
    pub fn new(config: TrueFinalsConfig) -> Result<Self, UpstreamError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| UpstreamError::Network(Arc::new(e)))?;

        Ok(Self { http, config })
    }

    pub fn config(&self) -> &TrueFinalsConfig {
        &self.config
    }

    fn url_for(&self, endpoint_path: &str) -> Result<url::Url, UpstreamError> {
        if !is_valid_endpoint_path(endpoint_path) {
            return Err(UpstreamError::InvalidPath(endpoint_path.to_string()));
        }
        url::Url::parse(&format!("{}{}", self.config.base_url, endpoint_path))
            .map_err(|e| UpstreamError::InvalidPath(format!("{endpoint_path}: {e}")))
    }
}

#[async_trait]
impl Upstream for TrueFinalsClient {
    async fn get(&self, endpoint_path: &str) -> Result<UpstreamResponse, UpstreamError> {
        let credentials = self
            .config
            .credentials
            .as_ref()
            .ok_or(UpstreamError::MissingCredentials("truefinals_user_id/truefinals_api_key"))?;
        let url = self.url_for(endpoint_path)?;

        let start = Instant::now();
        tracing::debug!(endpoint = endpoint_path, user = %fingerprint(&credentials.user_id), "requesting TrueFinals API");

        let http_response = self
            .http
            .get(url)
            .header("x-api-user-id", &credentials.user_id)
            .header("x-api-key", &credentials.api_key)
            .header(header::ACCEPT, "application/json")
            .send()
            .await?;

        let status = http_response.status().as_u16();
        let headers = response::headers_to_json(http_response.headers());
        let bytes = http_response
            .bytes()
            .await
            .map_err(|e| UpstreamError::Parse(e.to_string()))?;

        let response = UpstreamResponse { status, body: response::parse_body(&bytes), headers };
        let limits = response.rate_limit();
        tracing::debug!(
            endpoint = endpoint_path,
            status,
            elapsed_ms = start.elapsed().as_millis() as u64,
            ratelimit_remaining = ?limits.remaining,
            "TrueFinals API responded"
        );

        Ok(response)
    }
}

/// Outcome of the credential-order self-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialCheck {
    Valid,
    /// Rejected as configured, accepted with the two values exchanged.
    Swapped,
    Invalid,
    /// No answer could be obtained.
    Unreachable(String),
}

impl CredentialCheck {
    pub fn status(&self) -> &'static str {
        match self {
            CredentialCheck::Valid => "valid",
            CredentialCheck::Swapped => "swapped",
            CredentialCheck::Invalid => "invalid",
            CredentialCheck::Unreachable(_) => "unreachable",
        }
    }

    /// Operator-facing diagnostic, or None when nothing needs attention.
    pub fn message(&self) -> Option<String> {
        match self {
            CredentialCheck::Valid => None,
            CredentialCheck::Swapped => {
                Some("API keys are valid, but backwards. Swap the user id and API key in the configuration.".into())
            }
            CredentialCheck::Invalid => Some("API keys are not valid.".into()),
            CredentialCheck::Unreachable(reason) => Some(format!("Could not reach TrueFinals to check keys: {reason}")),
        }
    }
}

/// One-shot check that the configured credentials work, and are not swapped.
///
/// `make` builds an upstream for a credential pair; it is called with the
/// configured pair and, after a 401, with the swapped pair.
pub async fn check_credentials<F, U>(credentials: &Credentials, make: F) -> CredentialCheck
where
    F: Fn(Credentials) -> Result<U, UpstreamError>,
    U: Upstream,
{
    let attempt = |creds: Credentials| {
        let upstream = make(creds);
        async move { upstream?.get(CREDENTIAL_CHECK_PATH).await }
    };

    let first = match attempt(credentials.clone()).await {
        Ok(resp) => resp,
        Err(e) => return CredentialCheck::Unreachable(e.to_string()),
    };

    match first.status {
        401 => {}
        200..=299 => return CredentialCheck::Valid,
        _ => return CredentialCheck::Invalid,
    }

    match attempt(credentials.swapped()).await {
        Ok(resp) if resp.status == 200 => {
            tracing::warn!(
                user = %fingerprint(&credentials.user_id),
                "TrueFinals credentials accepted only when swapped"
            );
            CredentialCheck::Swapped
        }
        Ok(_) => CredentialCheck::Invalid,
        Err(e) => CredentialCheck::Unreachable(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Accepts exactly one credential pair.
    struct AcceptOnly {
        creds: Credentials,
        accepted: Credentials,
    }

    #[async_trait]
    impl Upstream for AcceptOnly {
        async fn get(&self, _endpoint_path: &str) -> Result<UpstreamResponse, UpstreamError> {
            if self.creds == self.accepted {
                Ok(UpstreamResponse::new(200, json!([])))
            } else {
                Ok(UpstreamResponse::new(401, json!({"error": "unauthorized"})))
            }
        }
    }

    #[test]
    fn test_endpoint_path_validation() {
        assert!(is_valid_endpoint_path("/v1/user/tournaments"));
        assert!(is_valid_endpoint_path("/v1/tournaments/abc-123_X/games"));
        assert!(!is_valid_endpoint_path("v1/tournaments"));
        assert!(!is_valid_endpoint_path("/v1/"));
        assert!(!is_valid_endpoint_path("/v1/tournaments/../secrets"));
        assert!(!is_valid_endpoint_path("/v1/tournaments?id=1"));
        assert!(!is_valid_endpoint_path("https://evil.example/v1/x"));
    }

    #[test]
    fn test_credentials_debug_is_redacted() {
        let creds = Credentials::new("user-123", "secret-key");
        let debug = format!("{creds:?}");
        assert!(!debug.contains("user-123"));
        assert!(!debug.contains("secret-key"));
    }

    #[test]
    fn test_credentials_swapped() {
        let creds = Credentials::new("u", "k");
        assert_eq!(creds.swapped(), Credentials::new("k", "u"));
        assert_eq!(creds.swapped().swapped(), creds);
    }

    #[test]
    fn test_config_from_app_config() {
        let app = AppConfig {
            truefinals_user_id: Some("u".into()),
            truefinals_api_key: Some("k".into()),
            api_base_url: "https://example.test/api/".into(),
            ..Default::default()
        };
        let config = TrueFinalsConfig::from_app_config(&app);
        assert_eq!(config.credentials, Some(Credentials::new("u", "k")));
        assert_eq!(config.base_url, "https://example.test/api");
    }

    #[test]
    fn test_url_for_rejects_bad_path() {
        let client = TrueFinalsClient::new(TrueFinalsConfig::default()).unwrap();
        assert!(matches!(client.url_for("/v1/../x"), Err(UpstreamError::InvalidPath(_))));
        let url = client.url_for("/v1/tournaments/T1").unwrap();
        assert_eq!(url.as_str(), "https://truefinals.com/api/v1/tournaments/T1");
    }

    #[tokio::test]
    async fn test_get_without_credentials_fails_fast() {
        let client = TrueFinalsClient::new(TrueFinalsConfig::default()).unwrap();
        let result = client.get("/v1/user/tournaments").await;
        assert!(matches!(result, Err(UpstreamError::MissingCredentials(_))));
    }

    #[tokio::test]
    async fn test_check_credentials_valid() {
        let creds = Credentials::new("user", "key");
        let accepted = creds.clone();
        let outcome = check_credentials(&creds, |c| Ok(AcceptOnly { creds: c, accepted: accepted.clone() })).await;
        assert_eq!(outcome, CredentialCheck::Valid);
        assert!(outcome.message().is_none());
    }

    #[tokio::test]
    async fn test_check_credentials_swapped() {
        let creds = Credentials::new("key", "user");
        let accepted = Credentials::new("user", "key");
        let outcome = check_credentials(&creds, |c| Ok(AcceptOnly { creds: c, accepted: accepted.clone() })).await;
        assert_eq!(outcome, CredentialCheck::Swapped);
        assert!(outcome.message().unwrap().contains("backwards"));
    }

    #[tokio::test]
    async fn test_check_credentials_invalid() {
        let creds = Credentials::new("a", "b");
        let accepted = Credentials::new("c", "d");
        let outcome = check_credentials(&creds, |c| Ok(AcceptOnly { creds: c, accepted: accepted.clone() })).await;
        assert_eq!(outcome, CredentialCheck::Invalid);
    }

    #[tokio::test]
    async fn test_check_credentials_unreachable() {
        let creds = Credentials::new("a", "b");
        let outcome = check_credentials::<_, AcceptOnly>(&creds, |_| Err(UpstreamError::Timeout)).await;
        assert!(matches!(outcome, CredentialCheck::Unreachable(_)));
    }
}
