//! MCP tool implementations.
//!
//! This module contains all tools exposed by the bracketeer-admin server.

pub mod cache;
pub mod credentials;
pub mod rate_limit;

pub use cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl};
pub use credentials::credentials_impl;
pub use rate_limit::rate_limit_impl;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use serde::Serialize;

/// Wrap a serializable value as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| bracketeer_core::Error::Serialization(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
