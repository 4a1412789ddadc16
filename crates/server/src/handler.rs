//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use edge_cache_client::CacheManager;
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

use crate::tools::cache::{CacheGetParams, CacheSweepParams, get_impl, stats_impl, sweep_impl};
use crate::tools::fetch::{CacheFetchParams, fetch_impl};
use crate::tools::lifecycle::{CacheMessageParams, activate_impl, install_impl, message_impl};

/// The main MCP server handler for edge-cache.
#[derive(Clone)]
pub struct EdgeCacheServer {
    manager: Arc<CacheManager>,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl EdgeCacheServer {
    /// Create a new server handler around a cache manager.
    pub fn new(manager: Arc<CacheManager>) -> Self {
        Self { manager, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Intercept a request as a controlled page would. Returns the route taken, the response status, headers and body."
    )]
    async fn cache_fetch(&self, params: Parameters<CacheFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.manager, params.0).await
    }

    #[tool(description = "Install the current version: open the precache bucket and warm it with the site root.")]
    async fn cache_install(&self) -> Result<CallToolResult, McpError> {
        install_impl(&self.manager).await
    }

    /// Fails if install has not completed.
    #[tool(description = "Activate the current version: delete buckets from other versions and notify clients.")]
    async fn cache_activate(&self) -> Result<CallToolResult, McpError> {
        activate_impl(&self.manager).await
    }

    #[tool(description = "Post a client message, e.g. {\"type\": \"SKIP_WAITING\"}.")]
    async fn cache_message(&self, params: Parameters<CacheMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.manager, params.0).await
    }

    #[tool(description = "Evict the oldest entries from live buckets over the size ceiling.")]
    async fn cache_sweep(&self, params: Parameters<CacheSweepParams>) -> Result<CallToolResult, McpError> {
        sweep_impl(&self.manager, params.0).await
    }

    #[tool(description = "Get the stored entry for a URL from a category's live bucket.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(&self.manager, params.0).await
    }

    #[tool(description = "List buckets with entry counts and total bytes, plus the lifecycle state.")]
    async fn cache_stats(&self) -> Result<CallToolResult, McpError> {
        stats_impl(&self.manager).await
    }
}

impl ServerHandler for EdgeCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "edge-cache".into(),
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
