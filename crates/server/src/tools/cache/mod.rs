//! Cache-related MCP tools.
//!
//! This module provides tools for reading and pruning cache partitions
//! directly, bypassing the route policy.

pub mod get;
pub mod purge;

pub use get::{CacheGetParams, get_impl};
pub use purge::{CachePurgeParams, purge_impl};
