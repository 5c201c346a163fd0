//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::AppConfig;
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

fn invalid(field: &str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid { field: field.into(), reason: reason.into() }
}

/// Partition names embed these tokens, so they must be non-empty single words.
fn check_token(field: &str, value: &str) -> Result<(), ConfigError> {
    if value.is_empty() {
        return Err(invalid(field, "must not be empty"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(invalid(field, "must not contain whitespace"));
    }
    Ok(())
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `app_name` or `cache_version` is empty or contains whitespace
    /// - `origin` is not an absolute http(s) URL
    /// - a manifest entry or `offline_fallback` is not an absolute path
    /// - a data pattern is not a valid regex
    /// - `max_bytes` is 0 or exceeds 50MB
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `user_agent` is empty
    /// - `max_runtime_entries` is 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_token("app_name", &self.app_name)?;
        check_token("cache_version", &self.cache_version)?;
        self.origin_url()?;

        if let Some(bad) = self.precache_manifest.iter().find(|p| !p.starts_with('/')) {
            return Err(invalid("precache_manifest", format!("entry {bad:?} must start with '/'")));
        }
        if !self.offline_fallback.starts_with('/') {
            return Err(invalid("offline_fallback", "must start with '/'"));
        }

        for pattern in &self.data_patterns {
            regex::Regex::new(pattern).map_err(|e| invalid("data_patterns", format!("{pattern:?}: {e}")))?;
        }

        if self.max_bytes == 0 {
            return Err(invalid("max_bytes", "must be greater than 0"));
        }
        if self.max_bytes > 50 * 1024 * 1024 {
            return Err(invalid("max_bytes", "must not exceed 50MB"));
        }

        if self.timeout_ms < 100 {
            return Err(invalid("timeout_ms", "must be at least 100ms"));
        }
        if self.timeout_ms > 300_000 {
            return Err(invalid("timeout_ms", "must not exceed 5 minutes (300000ms)"));
        }

        if self.user_agent.is_empty() {
            return Err(invalid("user_agent", "must not be empty"));
        }

        if self.max_runtime_entries == Some(0) {
            return Err(invalid("max_runtime_entries", "must be at least 1 when set"));
        }

        let mut seen = std::collections::HashSet::new();
        let duplicates: Vec<&str> =
            self.precache_manifest.iter().filter(|p| !seen.insert(p.as_str())).map(String::as_str).collect();
        if !duplicates.is_empty() {
            tracing::warn!(?duplicates, "precache_manifest lists the same path more than once");
        }

        if !self.precache_manifest.iter().any(|p| p == &self.offline_fallback) {
            tracing::warn!(
                offline_fallback = %self.offline_fallback,
                "offline_fallback is not precached; offline navigations may get a placeholder"
            );
        }

        Ok(())
    }
}
