//! Fetch strategies and the runtime-cache write path.
//!
//! Every strategy answers one request. Cache reads that fail are treated as
//! misses and cache writes that fail are logged and dropped, so only an
//! exhausted fallback chain surfaces as an error.

use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::background::BackgroundTasks;
use super::context::WorkerContext;
use swcache_core::{Error, Request, Response, RouteClass, Strategy};

/// Where the returned response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    /// Not intercepted; straight from the network.
    Passthrough,
    Network,
    Cache,
    /// The cached offline page stood in for a failed navigation.
    OfflinePage,
    /// Synthesized empty response; every other layer failed.
    Placeholder,
}

/// A routed response.
#[derive(Debug, Clone)]
pub struct FetchOutcome {
    pub response: Response,
    pub source: ResponseSource,
    pub class: RouteClass,
}

pub(crate) async fn run(
    ctx: &Arc<WorkerContext>, tasks: &BackgroundTasks, class: RouteClass, strategy: Strategy, request: &Request,
) -> Result<FetchOutcome, Error> {
    let (response, source) = match strategy {
        Strategy::Passthrough => (ctx.network.fetch(request).await?, ResponseSource::Passthrough),
        Strategy::NetworkFirst => network_first(ctx, request).await?,
        Strategy::CacheFirstWithOfflinePage => cache_first_with_offline_page(ctx, tasks, request).await,
        Strategy::StaleWhileRevalidate => stale_while_revalidate(ctx, tasks, request).await,
    };
    Ok(FetchOutcome { response, source, class })
}

async fn network_first(ctx: &Arc<WorkerContext>, request: &Request) -> Result<(Response, ResponseSource), Error> {
    match ctx.network.fetch(request).await {
        Ok(response) => {
            store_runtime(ctx, request, &response).await;
            Ok((response, ResponseSource::Network))
        }
        Err(err) => match lookup(ctx, request).await {
            Some(cached) => {
                tracing::debug!(url = %request.url, error = %err, "network failed, serving cached copy");
                Ok((cached, ResponseSource::Cache))
            }
            None => Err(err),
        },
    }
}

async fn cache_first_with_offline_page(
    ctx: &Arc<WorkerContext>, tasks: &BackgroundTasks, request: &Request,
) -> (Response, ResponseSource) {
    if let Some(cached) = lookup(ctx, request).await {
        spawn_revalidate(ctx, tasks, request);
        return (cached, ResponseSource::Cache);
    }

    match ctx.network.fetch(request).await {
        Ok(response) => {
            store_runtime(ctx, request, &response).await;
            (response, ResponseSource::Network)
        }
        Err(err) => {
            let fallback = Request::get(ctx.offline_fallback.clone());
            match lookup(ctx, &fallback).await {
                Some(page) => {
                    tracing::debug!(url = %request.url, error = %err, "navigation offline, serving offline page");
                    (page, ResponseSource::OfflinePage)
                }
                None => {
                    tracing::warn!(url = %request.url, error = %err, "navigation offline and offline page not cached");
                    (
                        Response::placeholder(request.url.clone(), 503, "Service Unavailable"),
                        ResponseSource::Placeholder,
                    )
                }
            }
        }
    }
}

async fn stale_while_revalidate(
    ctx: &Arc<WorkerContext>, tasks: &BackgroundTasks, request: &Request,
) -> (Response, ResponseSource) {
    if let Some(cached) = lookup(ctx, request).await {
        spawn_revalidate(ctx, tasks, request);
        return (cached, ResponseSource::Cache);
    }

    match ctx.network.fetch(request).await {
        Ok(response) => {
            store_runtime(ctx, request, &response).await;
            (response, ResponseSource::Network)
        }
        Err(err) => {
            tracing::debug!(url = %request.url, error = %err, "asset unavailable, serving placeholder");
            (Response::placeholder(request.url.clone(), 404, "Not Found"), ResponseSource::Placeholder)
        }
    }
}

/// The freshest cached copy: runtime, then precache, then any other partition.
///
/// Read errors count as a miss.
async fn lookup(ctx: &WorkerContext, request: &Request) -> Option<Response> {
    for name in [&ctx.names.runtime, &ctx.names.precache] {
        match ctx.cache.match_in(name, request).await {
            Ok(Some(stored)) => {
                tracing::debug!(url = %request.url, cache = %name, "cache hit");
                return Some(stored.response);
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(url = %request.url, cache = %name, error = %e, "cache read failed"),
        }
    }

    match ctx.cache.match_any(request).await {
        Ok(Some(stored)) => {
            tracing::debug!(url = %request.url, cache = %stored.cache_name, "cache hit");
            Some(stored.response)
        }
        Ok(None) => {
            tracing::debug!(url = %request.url, "cache miss");
            None
        }
        Err(e) => {
            tracing::warn!(url = %request.url, error = %e, "cache read failed");
            None
        }
    }
}

/// Write an eligible response into the runtime partition.
pub(crate) async fn store_runtime(ctx: &WorkerContext, request: &Request, response: &Response) {
    if !response.is_cacheable() {
        tracing::debug!(
            url = %request.url,
            status = response.status,
            kind = ?response.kind,
            "response not eligible for caching"
        );
        return;
    }

    if ctx.is_retired() {
        tracing::debug!(url = %request.url, version = %ctx.version, "worker retired, skipping runtime write");
        return;
    }

    if let Err(e) = ctx.cache.put(&ctx.names.runtime, request, response).await {
        tracing::warn!(url = %request.url, error = %e, "failed to store in runtime cache");
        return;
    }

    if let Some(max) = ctx.max_runtime_entries {
        match ctx.cache.trim_cache(&ctx.names.runtime, max).await {
            Ok(0) => {}
            Ok(n) => tracing::debug!(trimmed = n, cache = %ctx.names.runtime, "runtime cache trimmed"),
            Err(e) => tracing::warn!(error = %e, "runtime cache trim failed"),
        }
    }
}

fn spawn_revalidate(ctx: &Arc<WorkerContext>, tasks: &BackgroundTasks, request: &Request) {
    let ctx = Arc::clone(ctx);
    let request = request.clone();
    tasks.spawn(async move {
        match ctx.network.fetch(&request).await {
            Ok(response) if response.ok() => {
                store_runtime(&ctx, &request, &response).await;
                tracing::debug!(url = %request.url, "background updated");
            }
            Ok(response) => {
                tracing::debug!(url = %request.url, status = response.status, "background refresh not ok, kept cache");
            }
            Err(e) => {
                tracing::debug!(url = %request.url, error = %e, "background refresh failed");
            }
        }
    });
}
