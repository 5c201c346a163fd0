//! sw_fetch tool implementation.
//!
//! Issues a request through the registration as a controlled page would.

use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use swcache_client::{Registration, ResponseSource, fetch::resolve};
use swcache_core::{Error, Request, RequestMode, RouteClass};
use url::Url;

use crate::tools::{ResponseView, json_result};

/// Parameters for the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchParams {
    /// Absolute URL, or a path resolved against the configured origin.
    pub url: String,

    /// HTTP method (default: GET).
    #[serde(default = "default_method")]
    pub method: String,

    /// Request mode: navigate, same-origin, cors or no-cors (default: same-origin).
    #[serde(default)]
    pub mode: RequestMode,

    /// Accept header. Navigations default to HTML.
    #[serde(default)]
    pub accept: Option<String>,
}

fn default_method() -> String {
    "GET".into()
}

/// Output from the sw_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct SwFetchOutput {
    pub route: RouteClass,
    pub source: ResponseSource,
    pub response: ResponseView,
}

fn build_request(origin: &Url, params: SwFetchParams) -> Result<Request, Error> {
    let url = resolve(origin, &params.url).map_err(|e| Error::InvalidUrl(format!("{}: {e}", params.url)))?;
    if params.method.trim().is_empty() {
        return Err(Error::InvalidInput("method cannot be empty".into()));
    }

    let base = match params.mode {
        RequestMode::Navigate => Request::navigate(url),
        mode => Request::get(url).with_mode(mode),
    };
    let request = base.with_method(params.method.trim());
    Ok(match params.accept {
        Some(accept) => request.with_accept(accept),
        None => request,
    })
}

/// Implementation of the sw_fetch tool.
pub async fn fetch_impl(
    registration: &Registration, origin: &Url, params: SwFetchParams,
) -> Result<CallToolResult, McpError> {
    let request = build_request(origin, params)?;
    let outcome = registration.fetch(&request).await?;

    let output = SwFetchOutput {
        route: outcome.class,
        source: outcome.source,
        response: ResponseView::from(&outcome.response),
    };
    json_result(&output)
}
