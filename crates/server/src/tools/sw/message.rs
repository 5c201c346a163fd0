//! sw_message tool implementation.
//!
//! Posts a control message (`SKIP_WAITING`, `GET_VERSION`) to the worker.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use swcache_client::Registration;
use swcache_core::ControlReply;

use crate::tools::json_result;

/// Parameters for the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageParams {
    /// The posted value, e.g. `{"type": "GET_VERSION"}`. Unknown types are ignored.
    pub message: Value,
}

/// Output from the sw_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwMessageOutput {
    /// Reply posted back to the sender, if the message has one.
    pub reply: Option<ControlReply>,
}

/// Implementation of the sw_message tool.
pub async fn message_impl(registration: &Registration, params: SwMessageParams) -> Result<CallToolResult, McpError> {
    let reply = registration.post_message(&params.message).await?;
    json_result(&SwMessageOutput { reply })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::test_support::{config, parse_output, registration};
    use serde_json::json;

    #[tokio::test]
    async fn test_get_version_reply() {
        let (reg, _) = registration().await;
        reg.register(&config("v3")).await.unwrap();

        let result = message_impl(&reg, SwMessageParams { message: json!({"type": "GET_VERSION"}) })
            .await
            .unwrap();

        let output: SwMessageOutput = parse_output(&result);
        assert_eq!(output.reply, Some(ControlReply::Version { version: "v3".into() }));
    }

    #[tokio::test]
    async fn test_unknown_message_no_reply() {
        let (reg, _) = registration().await;
        let result = message_impl(&reg, SwMessageParams { message: json!({"type": "PING"}) })
            .await
            .unwrap();

        let output: SwMessageOutput = parse_output(&result);
        assert!(output.reply.is_none());
    }

    #[tokio::test]
    async fn test_skip_waiting_promotes() {
        let (reg, _) = registration().await;
        let patient = |v: &str| swcache_core::AppConfig { skip_waiting_on_install: false, ..config(v) };
        reg.register(&patient("v1")).await.unwrap();
        reg.open_client().await;
        reg.register(&patient("v2")).await.unwrap();

        message_impl(&reg, SwMessageParams { message: json!({"type": "SKIP_WAITING"}) })
            .await
            .unwrap();

        assert_eq!(reg.active_version().await.as_deref(), Some("v2"));
    }
}
