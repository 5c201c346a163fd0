//! Control messages posted to the worker by the hosting page.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Commands the worker understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlMessage {
    /// Activate the waiting worker now instead of after old clients close.
    SkipWaiting,
    /// Ask for the active cache version.
    GetVersion,
}

/// Replies posted back to the sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ControlReply {
    Version { version: String },
}

impl ControlMessage {
    /// Parse an arbitrary posted value.
    ///
    /// Anything without a recognised `type` yields `None`; such messages are ignored.
    pub fn parse(value: &serde_json::Value) -> Option<Self> {
        serde_json::from_value(value.clone()).ok()
    }
}
