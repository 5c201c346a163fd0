//! cache_get tool implementation.
//!
//! Looks up a stored response by request identity.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::fetch::resolve;
use swcache_core::{CacheDb, Error, Request};
use url::Url;

use crate::tools::{ResponseView, json_result};

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// Partition to search. Searches every partition in creation order when omitted.
    #[serde(default)]
    pub cache: Option<String>,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// Partition the entry was found in.
    pub cache: String,
    /// RFC 3339 time of the write.
    pub stored_at: String,
    pub response: ResponseView,
}

/// Implementation of the cache_get tool.
pub async fn get_impl(cache: &CacheDb, origin: &Url, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    let request = Request::get(url);

    let found = match &params.cache {
        Some(name) => cache.match_in(name, &request).await?,
        None => cache.match_any(&request).await?,
    };
    let stored = found.ok_or_else(|| Error::CacheMiss(request.url.to_string()))?;

    let output = CacheGetOutput {
        cache: stored.cache_name,
        stored_at: stored.stored_at,
        response: ResponseView::from(&stored.response),
    };
    json_result(&output)
}
