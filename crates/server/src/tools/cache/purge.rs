//! cache_purge tool implementation.
//!
//! Deletes a whole partition, or trims it to its newest entries.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{CacheDb, Error};

use crate::tools::json_result;

/// Parameters for the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeParams {
    /// Partition to purge.
    pub cache: String,

    /// Keep only the newest N entries instead of deleting the partition.
    #[serde(default)]
    pub max_entries: Option<usize>,
}

/// Output from the cache_purge tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CachePurgeOutput {
    /// Whether the partition itself was deleted.
    pub cache_deleted: bool,
    /// Number of entries trimmed.
    pub entries_deleted: u64,
}

/// Implementation of the cache_purge tool.
pub async fn purge_impl(cache: &CacheDb, params: CachePurgeParams) -> Result<CallToolResult, McpError> {
    if params.cache.trim().is_empty() {
        return Err(Error::InvalidInput("cache cannot be empty".to_string()).into());
    }

    let output = match params.max_entries {
        Some(0) => return Err(Error::InvalidInput("max_entries must be at least 1".to_string()).into()),
        Some(max_entries) => {
            let entries_deleted = cache.trim_cache(&params.cache, max_entries).await?;
            CachePurgeOutput { cache_deleted: false, entries_deleted }
        }
        None => {
            let entries_deleted = cache.keys(&params.cache).await?.len() as u64;
            let cache_deleted = cache.delete_cache(&params.cache).await?;
            tracing::info!(cache = %params.cache, cache_deleted, entries_deleted, "purged cache");
            CachePurgeOutput { cache_deleted, entries_deleted }
        }
    };

    json_result(&output)
}
