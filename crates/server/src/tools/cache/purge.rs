//! cache_purge tool implementation.
//!
//! Deletes failed rows older than ten minutes and every row older than the
//! requested age. There is no confirmation step.

use bracketeer_client::CachedApi;
use bracketeer_core::PurgeStats;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Delete rows older than this many seconds (default: configured purge age).
    /// Zero removes everything recorded before now.
    #[serde(default)]
    pub max_age_secs: Option<u64>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    pub max_age_secs: u64,
    #[serde(flatten)]
    pub stats: PurgeStats,
    pub deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(
    api: &CachedApi, default_max_age_secs: u64, params: CachePurgeParams,
) -> Result<CallToolResult, McpError> {
    let max_age_secs = params.max_age_secs.unwrap_or(default_max_age_secs);
    let stats = api.purge(max_age_secs).await?;
    json_result(&CachePurgeOutput { max_age_secs, stats, deleted: stats.total() })
}
