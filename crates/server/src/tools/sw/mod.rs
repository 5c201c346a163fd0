//! Registration tools: install versions, issue requests, post messages and
//! open or close clients.

pub mod clients;
pub mod fetch;
pub mod message;
pub mod register;
pub mod status;

pub use clients::{ClientAction, SwClientsParams, clients_impl};
pub use fetch::{SwFetchParams, fetch_impl};
pub use message::{SwMessageParams, message_impl};
pub use register::{SwRegisterParams, register_impl};
pub use status::status_impl;
