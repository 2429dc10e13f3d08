//! TrueFinals response types.

use reqwest::header::HeaderMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One upstream answer, whatever its status.
#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamResponse {
    pub status: u16,
    /// Parsed JSON body; a non-JSON body is kept as a string, an empty one as null.
    pub body: Value,
    /// Response headers as a lowercase-keyed JSON object.
    pub headers: Value,
}

impl UpstreamResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body, headers: Value::Object(Map::new()) }
    }

    pub fn with_headers(mut self, headers: Value) -> Self {
        self.headers = headers;
        self
    }

    pub fn rate_limit(&self) -> RateLimitHeaders {
        RateLimitHeaders::from_json(&self.headers)
    }
}

/// Decode a response body the way the cache stores it.
pub fn parse_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Convert a header map to a JSON object, keeping the last value of repeated names.
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let map = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_ascii_lowercase(), Value::String(v.to_string())))
        })
        .collect::<Map<String, Value>>();
    Value::Object(map)
}

/// The upstream's own rate-limit counters.
///
/// Reported for diagnostics only; the cache gates on its own request history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct RateLimitHeaders {
    /// `X-RateLimit-Limit`: requests allowed per window.
    pub limit: Option<u32>,
    /// `X-RateLimit-Remaining`: requests left in the current window.
    pub remaining: Option<u32>,
    /// `X-RateLimit-Reset`: window reset as Unix epoch milliseconds.
    pub reset_epoch_ms: Option<i64>,
}

impl RateLimitHeaders {
    pub fn from_json(headers: &Value) -> Self {
        let field = |name: &str| headers.get(name).and_then(Value::as_str).map(str::trim);
        Self {
            limit: field("x-ratelimit-limit").and_then(|v| v.parse().ok()),
            remaining: field("x-ratelimit-remaining").and_then(|v| v.parse().ok()),
            reset_epoch_ms: field("x-ratelimit-reset").and_then(|v| v.parse().ok()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.limit.is_none() && self.remaining.is_none() && self.reset_epoch_ms.is_none()
    }

    /// Reset time as a UTC timestamp, if the header was present and in range.
    pub fn reset_at(&self) -> Option<chrono::DateTime<chrono::Utc>> {
        self.reset_epoch_ms.and_then(chrono::DateTime::from_timestamp_millis)
    }
}
