//! Versioned partition naming.

use serde::{Deserialize, Serialize};

/// The two partition names owned by one worker version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheNames {
    pub precache: String,
    pub runtime: String,
}

impl CacheNames {
    /// `<app>-precache-<version>` and `<app>-runtime-<version>`.
    pub fn new(app: &str, version: &str) -> Self {
        Self { precache: format!("{app}-precache-{version}"), runtime: format!("{app}-runtime-{version}") }
    }

    /// Whether `name` belongs to this version. Anything else is garbage on activation.
    pub fn is_current(&self, name: &str) -> bool {
        name == self.precache || name == self.runtime
    }
}
