//! sw_clients tool implementation.
//!
//! Opens and closes simulated pages. Closing the last page controlled by the
//! old version lets a waiting worker activate.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Registration, RegistrationStatus};
use swcache_core::Error;

use crate::tools::json_result;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ClientAction {
    Open,
    Close,
}

/// Parameters for the sw_clients tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwClientsParams {
    pub action: ClientAction,

    /// Client to close. Required for `close`.
    #[serde(default)]
    pub id: Option<u64>,
}

/// Output from the sw_clients tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwClientsOutput {
    /// Id of the newly opened client.
    pub opened: Option<u64>,
    pub status: RegistrationStatus,
}

/// Implementation of the sw_clients tool.
pub async fn clients_impl(registration: &Registration, params: SwClientsParams) -> Result<CallToolResult, McpError> {
    let opened = match params.action {
        ClientAction::Open => Some(registration.open_client().await),
        ClientAction::Close => {
            let id = params
                .id
                .ok_or_else(|| Error::InvalidInput("id is required to close a client".into()))?;
            registration.close_client(id).await?;
            None
        }
    };

    json_result(&SwClientsOutput { opened, status: registration.status().await })
}
