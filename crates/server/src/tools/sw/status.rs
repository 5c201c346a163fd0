//! sw_status tool implementation.
//!
//! Reports the registration and every cache partition with its entry count.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Registration, RegistrationStatus};

use crate::tools::json_result;

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheSummary {
    pub name: String,
    pub entries: usize,
}

/// Output from the sw_status tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwStatusOutput {
    pub registration: RegistrationStatus,
    /// Partitions in creation order.
    pub caches: Vec<CacheSummary>,
}

/// Implementation of the sw_status tool.
pub async fn status_impl(registration: &Registration) -> Result<CallToolResult, McpError> {
    let cache = registration.cache();
    let mut caches = Vec::new();
    for name in cache.cache_names().await? {
        let entries = cache.keys(&name).await?.len();
        caches.push(CacheSummary { name, entries });
    }

    json_result(&SwStatusOutput { registration: registration.status().await, caches })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{config, parse_output, registration};

    #[tokio::test]
    async fn test_status_empty() {
        let (reg, _) = registration().await;
        let output: SwStatusOutput = parse_output(&status_impl(&reg).await.unwrap());
        assert!(output.registration.active.is_none());
        assert!(output.caches.is_empty());
    }

    #[tokio::test]
    async fn test_status_after_install() {
        let (reg, _) = registration().await;
        reg.register(&config("v1")).await.unwrap();

        let output: SwStatusOutput = parse_output(&status_impl(&reg).await.unwrap());
        assert_eq!(output.registration.active.unwrap().version, "v1");
        assert_eq!(output.caches.len(), 1);
        assert_eq!(output.caches[0].name, "slkids-precache-v1");
        assert_eq!(output.caches[0].entries, 2);
    }
}
