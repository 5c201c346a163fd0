//! SQLite-backed cache partitions.
//!
//! A partition is a named key-value store mapping a request identity
//! (method + URL) to a stored response. Partition names embed the cache
//! version, so a new version simply stops referencing the old names and
//! activation deletes them.
//!
//! - Request-identity keys using SHA-256 hashing
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Atomic multi-entry writes for precaching
//! - LRU trimming per partition

pub mod connection;
pub mod hash;
pub mod migrations;
pub mod names;
pub mod partitions;

pub use crate::Error;

pub use connection::CacheDb;
pub use names::CacheNames;
pub use partitions::StoredResponse;
