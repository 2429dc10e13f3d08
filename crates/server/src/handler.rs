//! MCP server handler for cache administration.
//!
//! This module defines the admin server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    CacheGetParams, CachePurgeParams, credentials_impl, get_impl, purge_impl, rate_limit_impl,
};
use bracketeer_client::CachedApi;
use bracketeer_core::AppConfig;

use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::{
        tool::{ToolCallContext, ToolRouter},
        wrapper::Parameters,
    },
    model::{
        CallToolRequestParam, CallToolResult, Implementation, ListToolsResult, PaginatedRequestParam, ProtocolVersion,
        ServerCapabilities, ServerInfo,
    },
    service::{RequestContext, RoleServer},
    tool, tool_router,
};

/// The MCP server handler for bracketeer-admin.
#[derive(Clone)]
pub struct AdminServer {
    api: CachedApi,
    config: Arc<AppConfig>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl AdminServer {
    pub fn new(api: CachedApi, config: AppConfig) -> Self {
        Self { api, config: Arc::new(config), tool_router: Self::tool_router() }
    }

    #[tool(description = "Read the newest cached upstream response for an endpoint path without calling TrueFinals.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.api, params.0).await
    }

    /// Destructive; callers gate access themselves.
    #[tool(
        description = "Purge the request cache: failed rows older than 10 minutes and all rows older than max_age_secs."
    )]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(&self.api, self.config.purge_max_age_secs, params.0).await
    }

    #[tool(description = "Report the local request budget and the upstream's last rate-limit headers.")]
    async fn rate_limit_status(&self) -> Result<CallToolResult, McpError> {
        rate_limit_impl(&self.api).await
    }

    #[tool(description = "Check the configured TrueFinals credentials, detecting a swapped user id and API key.")]
    async fn check_credentials(&self) -> Result<CallToolResult, McpError> {
        credentials_impl(&self.config).await
    }
}

impl ServerHandler for AdminServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "bracketeer-admin".into(),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            protocol_version: ProtocolVersion::LATEST,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }

    async fn list_tools(
        &self, _request: Option<PaginatedRequestParam>, _context: RequestContext<RoleServer>,
    ) -> Result<ListToolsResult, rmcp::model::ErrorData> {
        Ok(ListToolsResult { meta: None, tools: self.tool_router.list_all(), next_cursor: None })
    }

    async fn call_tool(
        &self, request: CallToolRequestParam, context: RequestContext<RoleServer>,
    ) -> Result<CallToolResult, rmcp::model::ErrorData> {
        self.tool_router
            .call(ToolCallContext::new(self, request, context))
            .await
    }
}
