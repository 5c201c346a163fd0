//! One worker version: install, activate and fetch handling.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::try_join_all;

use super::background::BackgroundTasks;
use super::context::WorkerContext;
use super::strategy::{self, FetchOutcome};
use swcache_core::{CacheNames, Error, Request, WorkerState};

pub struct Worker {
    ctx: Arc<WorkerContext>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
    tasks: BackgroundTasks,
}

impl Worker {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx: Arc::new(ctx),
            state: Mutex::new(WorkerState::Installing),
            skip_waiting: AtomicBool::new(false),
            tasks: BackgroundTasks::new(),
        }
    }

    pub fn version(&self) -> &str {
        &self.ctx.version
    }

    pub fn names(&self) -> &CacheNames {
        &self.ctx.names
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn advance(&self, next: WorkerState) -> Result<(), Error> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let from = *state;
        state.advance(next)?;
        tracing::info!(version = %self.ctx.version, %from, to = %next, "worker state changed");
        Ok(())
    }

    /// Ask to activate without waiting for old clients to close.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn wants_skip_waiting(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Retire the worker. A no-op if it is already redundant.
    pub fn mark_redundant(&self) {
        self.ctx.retire();
        if self.state() != WorkerState::Redundant
            && let Err(e) = self.advance(WorkerState::Redundant)
        {
            tracing::warn!(version = %self.ctx.version, error = %e, "could not retire worker");
        }
    }

    /// Wait for tracked background refreshes to finish.
    pub async fn settle(&self) {
        self.tasks.settle().await;
    }

    /// Populate the precache partition from the manifest.
    ///
    /// All manifest URLs are fetched before anything is written, and the
    /// write is a single transaction, so a failure leaves no partial
    /// precache behind. On failure the worker becomes redundant.
    ///
    /// # Errors
    ///
    /// Returns `Error::InstallFailed` naming the first URL that failed.
    pub async fn install(&self) -> Result<(), Error> {
        if self.state() != WorkerState::Installing {
            return Err(Error::InvalidState(format!("install called while {}", self.state())));
        }

        if self.ctx.skip_waiting_on_install {
            self.skip_waiting();
        }

        match self.precache().await {
            Ok(count) => {
                tracing::info!(version = %self.ctx.version, cache = %self.ctx.names.precache, count, "precached assets");
                self.advance(WorkerState::Installed)
            }
            Err(e) => {
                tracing::error!(version = %self.ctx.version, error = %e, "precache failed");
                self.mark_redundant();
                Err(e)
            }
        }
    }

    async fn precache(&self) -> Result<usize, Error> {
        let fetches = self.ctx.manifest.iter().map(|url| async move {
            let request = Request::get(url.clone());
            let response = self
                .ctx
                .network
                .fetch(&request)
                .await
                .map_err(|e| Error::InstallFailed(format!("{url}: {e}")))?;
            if !response.is_cacheable() {
                return Err(Error::InstallFailed(format!("{url}: status {}", response.status)));
            }
            Ok((request, response))
        });

        let entries = try_join_all(fetches).await?;
        self.ctx
            .cache
            .put_all(&self.ctx.names.precache, &entries)
            .await
            .map_err(|e| Error::InstallFailed(format!("writing {}: {e}", self.ctx.names.precache)))?;

        Ok(entries.len())
    }

    /// Delete every partition this version does not own, then become active.
    ///
    /// Cleanup failures are logged; activation itself does not fail on them.
    /// Returns the names of deleted partitions.
    pub async fn activate(&self) -> Result<Vec<String>, Error> {
        self.advance(WorkerState::Activating)?;

        let mut deleted = Vec::new();
        match self.ctx.cache.cache_names().await {
            Ok(names) => {
                for name in names.into_iter().filter(|n| !self.ctx.names.is_current(n)) {
                    match self.ctx.cache.delete_cache(&name).await {
                        Ok(_) => {
                            tracing::info!(cache = %name, "deleted old cache");
                            deleted.push(name);
                        }
                        Err(e) => tracing::warn!(cache = %name, error = %e, "failed to delete old cache"),
                    }
                }
            }
            Err(e) => tracing::warn!(error = %e, "could not enumerate caches during activation"),
        }

        self.advance(WorkerState::Active)?;
        Ok(deleted)
    }

    /// Route one request through the policy table.
    ///
    /// # Errors
    ///
    /// `Error::InvalidState` unless active; otherwise only errors left after
    /// the route's fallback chain is exhausted.
    pub async fn handle_fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        if self.state() != WorkerState::Active {
            return Err(Error::InvalidState(format!("fetch handled while {}", self.state())));
        }

        let (class, strategy) = self.ctx.routes.route(request);
        tracing::debug!(method = %request.method, url = %request.url, ?class, ?strategy, "routing request");
        strategy::run(&self.ctx, &self.tasks, class, strategy, request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryNetwork;
    use crate::worker::ResponseSource;
    use std::time::Duration;
    use swcache_core::{AppConfig, CacheDb, RequestMode, Response, ResponseKind, RouteClass};
    use url::Url;

    const ORIGIN: &str = "https://kids.example.org";

    fn url(path: &str) -> Url {
        Url::parse(ORIGIN).unwrap().join(path).unwrap()
    }

    fn config(version: &str, manifest: &[&str]) -> AppConfig {
        AppConfig {
            origin: ORIGIN.into(),
            cache_version: version.into(),
            precache_manifest: manifest.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        }
    }

    async fn active_worker(net: &Arc<MemoryNetwork>, cfg: &AppConfig) -> (Worker, CacheDb) {
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(WorkerContext::from_config(cfg, cache.clone(), net.clone()).unwrap());
        worker.install().await.unwrap();
        worker.activate().await.unwrap();
        (worker, cache)
    }

    #[tokio::test]
    async fn test_install_precaches_byte_for_byte() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/"), 200, "<html>shell</html>");
        net.serve(&url("/a.json"), 200, vec![0x7b, 0x7d, 0x00, 0xff]);
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(WorkerContext::from_config(&config("v1", &["/", "/a.json"]), cache.clone(), net).unwrap());

        worker.install().await.unwrap();

        assert_eq!(worker.state(), WorkerState::Installed);
        assert!(worker.wants_skip_waiting());
        let hit = cache.match_in("slkids-precache-v1", &Request::get(url("/a.json"))).await.unwrap().unwrap();
        assert_eq!(hit.response.body.as_ref(), &[0x7b, 0x7d, 0x00, 0xff]);
        let root = cache.match_in("slkids-precache-v1", &Request::get(url("/"))).await.unwrap().unwrap();
        assert_eq!(root.response.body, "<html>shell</html>");
    }

    #[tokio::test]
    async fn test_install_fails_atomically_on_bad_status() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/"), 200, "shell");
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker =
            Worker::new(WorkerContext::from_config(&config("v1", &["/", "/missing.json"]), cache.clone(), net).unwrap());

        let err = worker.install().await.unwrap_err();

        assert!(matches!(err, Error::InstallFailed(ref m) if m.contains("missing.json")));
        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(!cache.has_cache("slkids-precache-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_install_fails_when_offline() {
        let net = Arc::new(MemoryNetwork::new());
        net.set_online(false);
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(WorkerContext::from_config(&config("v1", &["/"]), cache.clone(), net).unwrap());

        assert!(matches!(worker.install().await, Err(Error::InstallFailed(_))));
        assert!(cache.cache_names().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_install_without_skip_waiting_policy() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/"), 200, "shell");
        let cfg = AppConfig { skip_waiting_on_install: false, ..config("v1", &["/"]) };
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(WorkerContext::from_config(&cfg, cache, net).unwrap());

        worker.install().await.unwrap();
        assert!(!worker.wants_skip_waiting());
    }

    #[tokio::test]
    async fn test_activate_deletes_other_versions() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/"), 200, "shell");
        let cache = CacheDb::open_in_memory().await.unwrap();
        let old = Response::new(url("/"), 200, "old");
        cache.put("slkids-precache-v1", &Request::get(url("/")), &old).await.unwrap();
        cache.put("slkids-runtime-v1", &Request::get(url("/")), &old).await.unwrap();

        let worker = Worker::new(WorkerContext::from_config(&config("v2", &["/"]), cache.clone(), net).unwrap());
        worker.install().await.unwrap();
        let deleted = worker.activate().await.unwrap();

        assert_eq!(deleted, vec!["slkids-precache-v1", "slkids-runtime-v1"]);
        assert_eq!(cache.cache_names().await.unwrap(), vec!["slkids-precache-v2"]);
        assert_eq!(worker.state(), WorkerState::Active);
    }

    #[tokio::test]
    async fn test_mark_redundant_twice_is_noop() {
        let net = Arc::new(MemoryNetwork::new());
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(WorkerContext::from_config(&config("v1", &[]), cache, net).unwrap());

        worker.mark_redundant();
        worker.mark_redundant();

        assert_eq!(worker.state(), WorkerState::Redundant);
        assert!(worker.ctx.is_retired());
    }

    #[tokio::test]
    async fn test_activate_requires_installed() {
        let net = Arc::new(MemoryNetwork::new());
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(WorkerContext::from_config(&config("v1", &[]), cache, net).unwrap());
        assert!(matches!(worker.activate().await, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_fetch_before_active_rejected() {
        let net = Arc::new(MemoryNetwork::new());
        let cache = CacheDb::open_in_memory().await.unwrap();
        let worker = Worker::new(WorkerContext::from_config(&config("v1", &[]), cache, net).unwrap());
        let result = worker.handle_fetch(&Request::get(url("/a.js"))).await;
        assert!(matches!(result, Err(Error::InvalidState(_))));
    }

    #[tokio::test]
    async fn test_data_network_first_then_offline_cache() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/"), 200, "shell");
        let (worker, cache) = active_worker(&net, &config("v1", &["/"])).await;
        net.serve(&url("/a.json"), 200, r#"{"x":1}"#);
        let req = Request::get(url("/a.json"));

        let online = worker.handle_fetch(&req).await.unwrap();
        assert_eq!(online.class, RouteClass::Data);
        assert_eq!(online.source, ResponseSource::Network);
        assert_eq!(online.response.body, r#"{"x":1}"#);
        let stored = cache.match_in("slkids-runtime-v1", &req).await.unwrap().unwrap();
        assert_eq!(stored.response.body, r#"{"x":1}"#);

        net.set_online(false);
        let offline = worker.handle_fetch(&req).await.unwrap();
        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.response.body, r#"{"x":1}"#);
    }

    #[tokio::test]
    async fn test_data_prefers_fresh_network_copy() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/a.json"), 200, r#"{"x":1}"#);
        let (worker, cache) = active_worker(&net, &config("v1", &["/a.json"])).await;
        net.serve(&url("/a.json"), 200, r#"{"x":2}"#);
        let req = Request::get(url("/a.json"));

        let outcome = worker.handle_fetch(&req).await.unwrap();

        assert_eq!(outcome.response.body, r#"{"x":2}"#);
        let runtime = cache.match_in("slkids-runtime-v1", &req).await.unwrap().unwrap();
        assert_eq!(runtime.response.body, r#"{"x":2}"#);

        net.set_online(false);
        let offline = worker.handle_fetch(&req).await.unwrap();
        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.response.body, r#"{"x":2}"#);
    }

    #[tokio::test]
    async fn test_data_offline_without_copy_fails() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, _) = active_worker(&net, &config("v1", &[])).await;
        net.set_online(false);

        let result = worker.handle_fetch(&Request::get(url("/never.json"))).await;
        assert!(matches!(result, Err(Error::Network(_))));
    }

    #[tokio::test]
    async fn test_data_error_status_returned_not_stored() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, cache) = active_worker(&net, &config("v1", &[])).await;
        net.serve(&url("/broken.json"), 500, "oops");
        let req = Request::get(url("/broken.json"));

        let outcome = worker.handle_fetch(&req).await.unwrap();

        assert_eq!(outcome.response.status, 500);
        assert!(cache.match_any(&req).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_navigation_cached_returns_without_waiting_then_revalidates() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/lessons.html"), 200, "old lessons");
        let (worker, cache) = active_worker(&net, &config("v1", &["/lessons.html"])).await;
        net.serve(&url("/lessons.html"), 200, "new lessons");
        net.hold();
        let req = Request::navigate(url("/lessons.html"));

        let outcome = tokio::time::timeout(Duration::from_secs(1), worker.handle_fetch(&req))
            .await
            .expect("cached navigation must not wait on the network")
            .unwrap();
        assert_eq!(outcome.source, ResponseSource::Cache);
        assert_eq!(outcome.response.body, "old lessons");

        net.release();
        worker.settle().await;
        let runtime = cache.match_in("slkids-runtime-v1", &req).await.unwrap().unwrap();
        assert_eq!(runtime.response.body, "new lessons");

        let next = worker.handle_fetch(&req).await.unwrap();
        assert_eq!(next.source, ResponseSource::Cache);
        assert_eq!(next.response.body, "new lessons");
    }

    #[tokio::test]
    async fn test_refreshed_root_shell_serves_offline_fallback() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/"), 200, "old shell");
        let (worker, _) = active_worker(&net, &config("v1", &["/"])).await;
        net.serve(&url("/"), 200, "new shell");

        worker.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
        worker.settle().await;
        net.set_online(false);

        let again = worker.handle_fetch(&Request::navigate(url("/"))).await.unwrap();
        assert_eq!(again.response.body, "new shell");
        let fallback = worker.handle_fetch(&Request::navigate(url("/missing-page"))).await.unwrap();
        assert_eq!(fallback.source, ResponseSource::OfflinePage);
        assert_eq!(fallback.response.body, "new shell");
    }

    #[tokio::test]
    async fn test_navigation_uncached_offline_serves_root_shell() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/"), 200, "<html>root shell</html>");
        let (worker, _) = active_worker(&net, &config("v1", &["/"])).await;
        net.set_online(false);

        let outcome = worker.handle_fetch(&Request::navigate(url("/missing-page"))).await.unwrap();

        assert_eq!(outcome.class, RouteClass::Navigation);
        assert_eq!(outcome.source, ResponseSource::OfflinePage);
        assert_eq!(outcome.response.body, "<html>root shell</html>");
    }

    #[tokio::test]
    async fn test_navigation_offline_without_shell_is_placeholder() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, _) = active_worker(&net, &config("v1", &[])).await;
        net.set_online(false);

        let outcome = worker.handle_fetch(&Request::navigate(url("/quizzes.html"))).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Placeholder);
        assert_eq!(outcome.response.status, 503);
    }

    #[tokio::test]
    async fn test_navigation_uncached_online_is_stored() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, cache) = active_worker(&net, &config("v1", &[])).await;
        net.serve(&url("/about.html"), 200, "about");
        let req = Request::navigate(url("/about.html"));

        let outcome = worker.handle_fetch(&req).await.unwrap();

        assert_eq!(outcome.source, ResponseSource::Network);
        assert!(cache.match_in("slkids-runtime-v1", &req).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_asset_stale_while_revalidate() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/games/mouse.js"), 200, "v1 code");
        let (worker, cache) = active_worker(&net, &config("v1", &["/games/mouse.js"])).await;
        net.serve(&url("/games/mouse.js"), 200, "v2 code");
        let req = Request::get(url("/games/mouse.js"));

        let first = worker.handle_fetch(&req).await.unwrap();
        assert_eq!(first.class, RouteClass::Asset);
        assert_eq!(first.source, ResponseSource::Cache);
        assert_eq!(first.response.body, "v1 code");

        worker.settle().await;
        let runtime = cache.match_in("slkids-runtime-v1", &req).await.unwrap().unwrap();
        assert_eq!(runtime.response.body, "v2 code");
        let second = worker.handle_fetch(&req).await.unwrap();
        assert_eq!(second.response.body, "v2 code");
    }

    #[tokio::test]
    async fn test_asset_background_error_keeps_cache() {
        let net = Arc::new(MemoryNetwork::new());
        net.serve(&url("/styles.css"), 200, "body{}");
        let (worker, cache) = active_worker(&net, &config("v1", &["/styles.css"])).await;
        net.serve(&url("/styles.css"), 500, "error page");
        let req = Request::get(url("/styles.css"));

        worker.handle_fetch(&req).await.unwrap();
        worker.settle().await;

        assert!(cache.match_in("slkids-runtime-v1", &req).await.unwrap().is_none());
        let hit = cache.match_any(&req).await.unwrap().unwrap();
        assert_eq!(hit.response.body, "body{}");
    }

    #[tokio::test]
    async fn test_asset_offline_miss_is_404_placeholder() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, _) = active_worker(&net, &config("v1", &[])).await;
        net.set_online(false);

        let outcome = worker.handle_fetch(&Request::get(url("/icons/new.png"))).await.unwrap();
        assert_eq!(outcome.source, ResponseSource::Placeholder);
        assert_eq!(outcome.response.status, 404);
        assert!(outcome.response.body.is_empty());
    }

    #[tokio::test]
    async fn test_bypass_never_cached() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, cache) = active_worker(&net, &config("v1", &[])).await;
        let analytics = Url::parse("https://www.google-analytics.com/collect").unwrap();
        net.serve(&analytics, 200, "ok");
        let post = Request::get(url("/scores.json")).with_method("POST");
        net.serve(&url("/scores.json"), 200, "saved");

        let a = worker.handle_fetch(&Request::get(analytics)).await.unwrap();
        let p = worker.handle_fetch(&post).await.unwrap();

        assert_eq!(a.source, ResponseSource::Passthrough);
        assert_eq!(p.source, ResponseSource::Passthrough);
        assert!(cache.cache_names().await.unwrap().iter().all(|n| n != "slkids-runtime-v1"));
    }

    #[tokio::test]
    async fn test_cross_origin_network_first_with_fallback() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, _) = active_worker(&net, &config("v1", &[])).await;
        let font = Url::parse("https://fonts.example.net/kids.css").unwrap();
        net.serve_response(Response::new(font.clone(), 200, "@font-face{}").with_kind(ResponseKind::Cors));
        let req = Request::get(font).with_mode(RequestMode::Cors);

        let online = worker.handle_fetch(&req).await.unwrap();
        assert_eq!(online.class, RouteClass::CrossOrigin);
        assert_eq!(online.source, ResponseSource::Network);

        net.set_online(false);
        let offline = worker.handle_fetch(&req).await.unwrap();
        assert_eq!(offline.source, ResponseSource::Cache);
        assert_eq!(offline.response.body, "@font-face{}");
    }

    #[tokio::test]
    async fn test_opaque_response_not_stored() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, cache) = active_worker(&net, &config("v1", &[])).await;
        let img = Url::parse("https://images.example.net/cat.png").unwrap();
        net.serve_response(Response::new(img.clone(), 200, "png").with_kind(ResponseKind::Opaque));
        let req = Request::get(img).with_mode(RequestMode::NoCors);

        worker.handle_fetch(&req).await.unwrap();

        assert!(cache.match_any(&req).await.unwrap().is_none());
        net.set_online(false);
        assert!(worker.handle_fetch(&req).await.is_err());
    }

    #[tokio::test]
    async fn test_repeated_store_is_idempotent() {
        let net = Arc::new(MemoryNetwork::new());
        let (worker, cache) = active_worker(&net, &config("v1", &[])).await;
        net.serve(&url("/a.json"), 200, r#"{"x":1}"#);
        let req = Request::get(url("/a.json"));

        worker.handle_fetch(&req).await.unwrap();
        worker.handle_fetch(&req).await.unwrap();

        assert_eq!(cache.keys("slkids-runtime-v1").await.unwrap(), vec![url("/a.json").to_string()]);
    }

    #[tokio::test]
    async fn test_runtime_trimmed_to_limit() {
        let net = Arc::new(MemoryNetwork::new());
        let cfg = AppConfig { max_runtime_entries: Some(2), ..config("v1", &[]) };
        let (worker, cache) = active_worker(&net, &cfg).await;
        for path in ["/1.json", "/2.json", "/3.json"] {
            net.serve(&url(path), 200, path);
            worker.handle_fetch(&Request::get(url(path))).await.unwrap();
        }

        let keys = cache.keys("slkids-runtime-v1").await.unwrap();
        assert_eq!(keys, vec![url("/2.json").to_string(), url("/3.json").to_string()]);
    }
}
