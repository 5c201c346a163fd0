//! Core types and shared functionality for swcache.
//!
//! This crate provides:
//! - Versioned cache partitions with a SQLite backend
//! - Request/response types shared by the network and cache layers
//! - The route policy table, worker lifecycle states and control messages
//! - Unified error types
//! - Layered configuration

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod message;
pub mod routes;

pub use cache::{CacheDb, CacheNames, StoredResponse};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{Request, RequestMode, Response, ResponseKind};
pub use lifecycle::WorkerState;
pub use message::{ControlMessage, ControlReply};
pub use routes::{RouteClass, RouteTable, Strategy};
