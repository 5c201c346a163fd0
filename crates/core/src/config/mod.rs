//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (SWCACHE_*)
//! 2. TOML config file (if SWCACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::cache::CacheNames;

mod validation;

pub use validation::ConfigError;

/// Worker configuration: what to precache, how to route, where to store.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (SWCACHE_*)
/// 2. TOML config file (if SWCACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix of every partition name.
    #[serde(default = "default_app_name")]
    pub app_name: String,

    /// Version token embedded in partition names. Bump on every deploy.
    ///
    /// Set via SWCACHE_CACHE_VERSION environment variable.
    #[serde(default = "default_cache_version")]
    pub cache_version: String,

    /// Origin of the site the worker serves; manifest paths resolve against it.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Paths fetched and stored at install time. All must succeed.
    #[serde(default = "default_precache_manifest")]
    pub precache_manifest: Vec<String>,

    /// Hosts whose requests are never intercepted or cached.
    #[serde(default = "default_bypass_hosts")]
    pub bypass_hosts: Vec<String>,

    /// Regexes over the URL path selecting network-first data endpoints.
    #[serde(default = "default_data_patterns")]
    pub data_patterns: Vec<String>,

    /// Page served for failed navigations with no cached copy.
    #[serde(default = "default_offline_fallback")]
    pub offline_fallback: String,

    /// Path to SQLite cache database.
    ///
    /// Set via SWCACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for network requests.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Network request timeout in milliseconds.
    ///
    /// Set via SWCACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum response body size in bytes.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Activate a freshly installed worker without waiting for old clients to close.
    #[serde(default = "default_true")]
    pub skip_waiting_on_install: bool,

    /// Upper bound on runtime partition entries; oldest writes are trimmed first.
    #[serde(default)]
    pub max_runtime_entries: Option<usize>,
}

fn default_app_name() -> String {
    "slkids".into()
}

fn default_cache_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "http://localhost:8080".into()
}

fn default_precache_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/service-worker.js",
        "/styles.css",
        "/data/classes.json",
        "/games/keyboard.html",
        "/games/keyboard.json",
        "/games/keyboard.js",
        "/games/mouse.html",
        "/games/mouse.json",
        "/games/mouse.js",
        "/lessons.html",
        "/quizzes.html",
        "/worksheets.html",
        "/about.html",
        "/contact.html",
        "/icons/icon-192.png",
        "/icons/icon-512.png",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_bypass_hosts() -> Vec<String> {
    vec!["www.google-analytics.com".into(), "analytics.example.com".into()]
}

fn default_data_patterns() -> Vec<String> {
    vec![r"\.json$".into()]
}

fn default_offline_fallback() -> String {
    "/".into()
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./swcache.sqlite")
}

fn default_user_agent() -> String {
    "swcache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: default_app_name(),
            cache_version: default_cache_version(),
            origin: default_origin(),
            precache_manifest: default_precache_manifest(),
            bypass_hosts: default_bypass_hosts(),
            data_patterns: default_data_patterns(),
            offline_fallback: default_offline_fallback(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            skip_waiting_on_install: true,
            max_runtime_entries: None,
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Partition names for the configured version.
    pub fn cache_names(&self) -> CacheNames {
        CacheNames::new(&self.app_name, &self.cache_version)
    }

    /// Parsed site origin.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if `origin` is not an absolute http(s) URL.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        let url = Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })?;
        match url.scheme() {
            "http" | "https" => Ok(url),
            other => Err(ConfigError::Invalid { field: "origin".into(), reason: format!("unsupported scheme {other}") }),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `SWCACHE_`
    /// 2. TOML file from `SWCACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("SWCACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("SWCACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
