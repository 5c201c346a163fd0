//! sw_register tool implementation.
//!
//! Installs a worker for a cache version on top of the server configuration.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Registration, RegistrationStatus};
use swcache_core::{AppConfig, WorkerState};

use crate::tools::json_result;

/// Parameters for the sw_register tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct SwRegisterParams {
    /// Cache version to install. Defaults to the configured version.
    #[serde(default)]
    pub version: Option<String>,

    /// Replaces the configured precache manifest.
    #[serde(default)]
    pub precache_manifest: Option<Vec<String>>,

    /// Whether the new worker skips waiting for old clients.
    #[serde(default)]
    pub skip_waiting_on_install: Option<bool>,
}

/// Output from the sw_register tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwRegisterOutput {
    pub version: String,
    /// `active` when the worker took over, `installed` when it is waiting.
    pub state: WorkerState,
    pub status: RegistrationStatus,
}

/// Implementation of the sw_register tool.
pub async fn register_impl(
    registration: &Registration, base: &AppConfig, params: SwRegisterParams,
) -> Result<CallToolResult, McpError> {
    let mut config = base.clone();
    if let Some(version) = params.version {
        config.cache_version = version;
    }
    if let Some(manifest) = params.precache_manifest {
        config.precache_manifest = manifest;
    }
    if let Some(skip) = params.skip_waiting_on_install {
        config.skip_waiting_on_install = skip;
    }

    let state = registration.register(&config).await?;
    let output = SwRegisterOutput { version: config.cache_version, state, status: registration.status().await };
    json_result(&output)
}
