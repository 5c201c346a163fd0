//! Per-version worker context.
//!
//! Everything a worker's event handlers need, built once from configuration
//! and shared by reference instead of living in globals.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use url::Url;

use crate::fetch::{Network, resolve};
use swcache_core::{AppConfig, CacheDb, CacheNames, Error, RouteTable};

pub struct WorkerContext {
    pub version: String,
    pub names: CacheNames,
    pub routes: RouteTable,
    /// Absolute precache URLs, duplicates removed, manifest order kept.
    pub manifest: Vec<Url>,
    pub offline_fallback: Url,
    pub skip_waiting_on_install: bool,
    pub max_runtime_entries: Option<usize>,
    pub cache: CacheDb,
    pub network: Arc<dyn Network>,
    /// Set once a newer version takes over; runtime writes stop from then on.
    retired: AtomicBool,
}

impl WorkerContext {
    /// # Errors
    ///
    /// Returns `Error::InvalidInput` for invalid configuration and
    /// `Error::InvalidUrl` for manifest entries that do not resolve.
    pub fn from_config(config: &AppConfig, cache: CacheDb, network: Arc<dyn Network>) -> Result<Self, Error> {
        config.validate().map_err(|e| Error::InvalidInput(e.to_string()))?;
        let routes = RouteTable::from_config(config).map_err(|e| Error::InvalidInput(e.to_string()))?;
        let origin = routes.origin().clone();

        let mut manifest: Vec<Url> = Vec::with_capacity(config.precache_manifest.len());
        for path in &config.precache_manifest {
            let url = resolve(&origin, path).map_err(|e| Error::InvalidUrl(format!("{path}: {e}")))?;
            if manifest.contains(&url) {
                tracing::debug!(%url, "duplicate precache entry dropped");
                continue;
            }
            manifest.push(url);
        }

        let offline_fallback = resolve(&origin, &config.offline_fallback)
            .map_err(|e| Error::InvalidUrl(format!("{}: {e}", config.offline_fallback)))?;

        Ok(Self {
            version: config.cache_version.clone(),
            names: config.cache_names(),
            routes,
            manifest,
            offline_fallback,
            skip_waiting_on_install: config.skip_waiting_on_install,
            max_runtime_entries: config.max_runtime_entries,
            cache,
            network,
            retired: AtomicBool::new(false),
        })
    }

    pub fn retire(&self) {
        self.retired.store(true, Ordering::SeqCst);
    }

    pub fn is_retired(&self) -> bool {
        self.retired.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::MemoryNetwork;

    #[tokio::test]
    async fn test_from_config_resolves_manifest() {
        let config = AppConfig {
            origin: "https://kids.example.org".into(),
            cache_version: "v7".into(),
            precache_manifest: vec!["/".into(), "/games/mouse.html".into(), "/games/mouse.html".into()],
            ..Default::default()
        };
        let cache = CacheDb::open_in_memory().await.unwrap();
        let ctx = WorkerContext::from_config(&config, cache, Arc::new(MemoryNetwork::new())).unwrap();

        assert_eq!(ctx.version, "v7");
        assert_eq!(ctx.names.precache, "slkids-precache-v7");
        let manifest: Vec<&str> = ctx.manifest.iter().map(Url::as_str).collect();
        assert_eq!(manifest, vec!["https://kids.example.org/", "https://kids.example.org/games/mouse.html"]);
        assert_eq!(ctx.offline_fallback.as_str(), "https://kids.example.org/");
    }

    #[tokio::test]
    async fn test_from_config_rejects_invalid() {
        let config = AppConfig { cache_version: String::new(), ..Default::default() };
        let cache = CacheDb::open_in_memory().await.unwrap();
        let result = WorkerContext::from_config(&config, cache, Arc::new(MemoryNetwork::new()));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }
}
