//! MCP tool implementations.
//!
//! This module contains all tools exposed by the swcache server: `sw_*`
//! tools drive the registration, `cache_*` tools inspect partitions.
#![allow(unused_imports)]

pub mod cache;
pub mod sw;

use rmcp::{
    ErrorData as McpError,
    model::{CallToolResult, Content},
};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_core::{Error, Response, ResponseKind};

/// A response as reported to tool callers.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ResponseView {
    pub url: String,
    pub status: u16,
    pub status_text: String,
    pub kind: ResponseKind,
    /// Lowercased header names with their values, in response order.
    pub headers: Vec<(String, String)>,
    /// Body decoded as UTF-8; invalid sequences are replaced.
    pub body: String,
    pub body_bytes: usize,
}

impl From<&Response> for ResponseView {
    fn from(response: &Response) -> Self {
        Self {
            url: response.url.to_string(),
            status: response.status,
            status_text: response.status_text.clone(),
            kind: response.kind,
            headers: response.headers.clone(),
            body: String::from_utf8_lossy(&response.body).into_owned(),
            body_bytes: response.body.len(),
        }
    }
}

/// Serialize a tool output as pretty JSON text content.
pub(crate) fn json_result<T: Serialize>(output: &T) -> Result<CallToolResult, McpError> {
    let json = serde_json::to_string_pretty(output)
        .map_err(|e| Error::InvalidInput(format!("Failed to serialize output: {e}")))?;
    Ok(CallToolResult::success(vec![Content::text(json)]))
}
