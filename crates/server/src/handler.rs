//! MCP server handler implementation.
//!
//! This module defines the main server handler that
//! routes tool calls to the appropriate implementations.
use std::sync::Arc;

use crate::tools::{
    cache::{CacheGetParams, CachePurgeParams, get_impl, purge_impl},
    sw::{
        SwClientsParams, SwFetchParams, SwMessageParams, SwRegisterParams, clients_impl, fetch_impl, message_impl,
        register_impl, status_impl,
    },
};

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
use swcache_client::Registration;
use swcache_core::AppConfig;
use url::Url;

/// The main MCP server handler for swcache.
#[derive(Clone)]
pub struct SwCacheServer {
    registration: Arc<Registration>,
    config: Arc<AppConfig>,
    origin: Url,
    tool_router: ToolRouter<Self>,
}

/// Tool router implementation using the #[tool_router] macro.
///
/// This macro generates the routing logic that maps tool names to handler methods.
#[tool_router]
impl SwCacheServer {
    /// Create a new server handler over a registration.
    pub fn new(registration: Arc<Registration>, config: AppConfig, origin: Url) -> Self {
        Self { registration, config: Arc::new(config), origin, tool_router: Self::tool_router() }
    }

    #[tool(
        description = "Install a worker for a cache version (default: configured version). Precaches the manifest, then activates or waits for old clients."
    )]
    async fn sw_register(&self, params: Parameters<SwRegisterParams>) -> Result<CallToolResult, McpError> {
        register_impl(&self.registration, &self.config, params.0).await
    }

    /// Issue a request as a controlled page would.
    ///
    /// The request is classified by the route table and answered network-first,
    /// cache-first with offline page, or stale-while-revalidate.
    #[tool(description = "Fetch a URL or site path through the active worker. Returns the response, its route and where it came from.")]
    async fn sw_fetch(&self, params: Parameters<SwFetchParams>) -> Result<CallToolResult, McpError> {
        fetch_impl(&self.registration, &self.origin, params.0).await
    }

    #[tool(description = "Post a control message ({\"type\":\"SKIP_WAITING\"} or {\"type\":\"GET_VERSION\"}) to the worker.")]
    async fn sw_message(&self, params: Parameters<SwMessageParams>) -> Result<CallToolResult, McpError> {
        message_impl(&self.registration, params.0).await
    }

    #[tool(description = "Open or close a client page. Closing the last old client activates a waiting worker.")]
    async fn sw_clients(&self, params: Parameters<SwClientsParams>) -> Result<CallToolResult, McpError> {
        clients_impl(&self.registration, params.0).await
    }

    #[tool(description = "Show active and waiting workers, open clients, and cache partitions with entry counts.")]
    async fn sw_status(&self) -> Result<CallToolResult, McpError> {
        status_impl(&self.registration).await
    }

    #[tool(description = "Read a stored response by URL from one partition or from all of them.")]
    async fn cache_get(&self, params: Parameters<CacheGetParams>) -> Result<CallToolResult, McpError> {
        get_impl(self.registration.cache(), &self.origin, params.0).await
    }

    #[tool(description = "Delete a cache partition, or trim it to its newest max_entries entries.")]
    async fn cache_purge(&self, params: Parameters<CachePurgeParams>) -> Result<CallToolResult, McpError> {
        purge_impl(self.registration.cache(), params.0).await
    }
}

impl ServerHandler for SwCacheServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            server_info: Implementation {
                name: "swcache".into(),
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
