//! cache_get tool implementation.
//!
//! Reads the newest stored row for an endpoint path without calling upstream.

use bracketeer_client::CachedApi;
use bracketeer_core::{CacheEntry, Error, Freshness};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Upstream endpoint path, e.g. `/v1/tournaments/{id}/games`.
    pub endpoint_path: String,

    /// Only accept rows younger than this many seconds. Any age when omitted.
    #[serde(default)]
    pub expiry_secs: Option<u64>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    pub entry: CacheEntry,
    /// Seconds since the row was recorded.
    pub age_secs: f64,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(api: &CachedApi, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    if params.endpoint_path.trim().is_empty() {
        return Err(Error::InvalidInput("endpoint_path cannot be empty".into()).into());
    }

    let freshness = params
        .expiry_secs
        .map_or(Freshness::Any, |secs| Freshness::within(secs as f64));
    let now = api.now();
    let entry = api
        .db()
        .get_request(&params.endpoint_path, freshness, now)
        .await?
        .ok_or_else(|| Error::CacheMiss(params.endpoint_path.clone()))?;

    json_result(&CacheGetOutput { age_secs: now - entry.last_requested, entry })
}
