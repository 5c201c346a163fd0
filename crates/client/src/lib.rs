//! Client code for swcache.
//!
//! This crate provides the network layer, the per-version worker with its
//! fetch strategies, and the registration that drives the worker lifecycle.

pub mod fetch;
pub mod worker;

pub use fetch::{FetchClient, FetchConfig, MemoryNetwork, Network};
pub use worker::{FetchOutcome, Registration, RegistrationStatus, ResponseSource, Worker, WorkerContext};
