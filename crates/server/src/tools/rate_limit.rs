//! rate_limit_status tool implementation.

use bracketeer_client::{CachedApi, RateLimitHeaders};
use bracketeer_core::cache::requests::{RATE_LIMIT_MAX_REQUESTS, RATE_LIMIT_WINDOW_SECS};
use bracketeer_core::{Error, RateLimitPolicy};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// The local request budget next to the upstream's own counters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateLimitStatus {
    pub rate_limited: bool,
    pub recent_requests: i64,
    pub window_secs: f64,
    pub max_requests: i64,
    pub policy: RateLimitPolicy,
    /// Counters from the newest upstream response, if any.
    pub upstream: Option<RateLimitHeaders>,
}

impl RateLimitStatus {
    pub async fn collect(api: &CachedApi) -> Result<Self, Error> {
        let recent_requests = api
            .db()
            .count_recent_requests(RATE_LIMIT_WINDOW_SECS, api.now())
            .await?;
        Ok(Self {
            rate_limited: recent_requests >= RATE_LIMIT_MAX_REQUESTS,
            recent_requests,
            window_secs: RATE_LIMIT_WINDOW_SECS,
            max_requests: RATE_LIMIT_MAX_REQUESTS,
            policy: api.policy(),
            upstream: api.last_rate_limit_headers().await?,
        })
    }
}

/// Implementation of the rate_limit_status tool.
pub async fn rate_limit_impl(api: &CachedApi) -> Result<CallToolResult, McpError> {
    json_result(&RateLimitStatus::collect(api).await?)
}
