//! Versioned workers and the registration that switches between them.
//!
//! A [`Registration`] installs a [`Worker`] per cache version, holds it as
//! waiting while old clients are open, and activates it by deleting every
//! partition the new version does not own. Active workers answer requests
//! through the route policy table.

pub mod background;
pub mod context;
pub mod instance;
pub mod registration;
pub mod strategy;

pub use background::BackgroundTasks;
pub use context::WorkerContext;
pub use instance::Worker;
pub use registration::{ClientInfo, Registration, RegistrationStatus, WorkerInfo};
pub use strategy::{FetchOutcome, ResponseSource};
