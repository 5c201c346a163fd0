//! The registration: which worker is active, which one waits, and which
//! clients each controls.
//!
//! All slot changes go through one write lock. Fetches take the read lock
//! only long enough to pick the active worker.

use std::collections::BTreeMap;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::RwLock;

use super::context::WorkerContext;
use super::instance::Worker;
use super::strategy::{FetchOutcome, ResponseSource};
use crate::fetch::Network;
use swcache_core::{
    AppConfig, CacheDb, CacheNames, ControlMessage, ControlReply, Error, Request, RouteClass, WorkerState,
};

#[derive(Default)]
struct Slots {
    active: Option<Arc<Worker>>,
    waiting: Option<Arc<Worker>>,
    /// Client id to the version controlling it, if any.
    clients: BTreeMap<u64, Option<String>>,
    next_client: u64,
}

impl Slots {
    fn active_controls_a_client(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|w| self.clients.values().any(|c| c.as_deref() == Some(w.version())))
    }
}

/// Snapshot of one worker.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct WorkerInfo {
    pub version: String,
    pub state: WorkerState,
    pub caches: CacheNames,
    pub skip_waiting: bool,
}

impl WorkerInfo {
    fn of(worker: &Worker) -> Self {
        Self {
            version: worker.version().to_string(),
            state: worker.state(),
            caches: worker.names().clone(),
            skip_waiting: worker.wants_skip_waiting(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClientInfo {
    pub id: u64,
    /// Version of the worker controlling this client.
    pub controller: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct RegistrationStatus {
    pub active: Option<WorkerInfo>,
    pub waiting: Option<WorkerInfo>,
    pub clients: Vec<ClientInfo>,
}

pub struct Registration {
    cache: CacheDb,
    network: Arc<dyn Network>,
    inner: RwLock<Slots>,
}

impl Registration {
    pub fn new(cache: CacheDb, network: Arc<dyn Network>) -> Self {
        Self { cache, network, inner: RwLock::new(Slots::default()) }
    }

    pub fn cache(&self) -> &CacheDb {
        &self.cache
    }

    /// Install a worker for `config.cache_version` and activate it when the
    /// lifecycle allows.
    ///
    /// Registering the version that is already active or waiting does nothing.
    /// A failed install leaves the current active worker and its caches alone.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` for bad configuration, `Error::InstallFailed`
    /// when the precache could not be completed.
    pub async fn register(&self, config: &AppConfig) -> Result<WorkerState, Error> {
        {
            let slots = self.inner.read().await;
            for worker in [&slots.active, &slots.waiting].into_iter().flatten() {
                if worker.version() == config.cache_version {
                    tracing::info!(version = %config.cache_version, "version already registered");
                    return Ok(worker.state());
                }
            }
        }

        let ctx = WorkerContext::from_config(config, self.cache.clone(), Arc::clone(&self.network))?;
        let worker = Arc::new(Worker::new(ctx));
        worker.install().await?;

        let mut slots = self.inner.write().await;
        if let Some(previous) = slots.waiting.replace(Arc::clone(&worker)) {
            tracing::info!(version = %previous.version(), "replaced waiting worker");
            previous.mark_redundant();
        }
        self.try_activate(&mut slots).await?;
        Ok(worker.state())
    }

    /// Promote the waiting worker if nothing holds it back.
    async fn try_activate(&self, slots: &mut Slots) -> Result<(), Error> {
        let Some(waiting) = slots.waiting.clone() else {
            return Ok(());
        };

        if !waiting.wants_skip_waiting() && slots.active_controls_a_client() {
            tracing::info!(version = %waiting.version(), "worker waiting for clients to close");
            return Ok(());
        }

        slots.waiting = None;
        if let Some(old) = slots.active.take() {
            // Stop its runtime writes, then drain refreshes already past that check.
            old.mark_redundant();
            old.settle().await;
        }

        waiting.activate().await?;
        for controller in slots.clients.values_mut() {
            *controller = Some(waiting.version().to_string());
        }
        tracing::info!(version = %waiting.version(), clients = slots.clients.len(), "worker activated and claimed clients");
        slots.active = Some(waiting);
        Ok(())
    }

    /// Open a page under the registration's scope.
    pub async fn open_client(&self) -> u64 {
        let mut slots = self.inner.write().await;
        let id = slots.next_client;
        slots.next_client += 1;
        let controller = slots.active.as_ref().map(|w| w.version().to_string());
        slots.clients.insert(id, controller);
        id
    }

    /// Close a page. Closing the last client of the old version lets a
    /// waiting worker activate.
    ///
    /// # Errors
    ///
    /// `Error::InvalidInput` for an unknown client id.
    pub async fn close_client(&self, id: u64) -> Result<(), Error> {
        let mut slots = self.inner.write().await;
        if slots.clients.remove(&id).is_none() {
            return Err(Error::InvalidInput(format!("unknown client {id}")));
        }
        self.try_activate(&mut slots).await
    }

    /// Deliver a control message; returns the reply, if the message has one.
    ///
    /// Unrecognised messages are ignored.
    pub async fn post_message(&self, message: &Value) -> Result<Option<ControlReply>, Error> {
        match ControlMessage::parse(message) {
            Some(ControlMessage::SkipWaiting) => {
                let mut slots = self.inner.write().await;
                match &slots.waiting {
                    Some(waiting) => waiting.skip_waiting(),
                    None => tracing::debug!("skip waiting with no waiting worker"),
                }
                self.try_activate(&mut slots).await?;
                Ok(None)
            }
            Some(ControlMessage::GetVersion) => {
                Ok(self.active_or_waiting_version().await.map(|version| ControlReply::Version { version }))
            }
            None => {
                tracing::debug!(%message, "ignoring unrecognised message");
                Ok(None)
            }
        }
    }

    async fn active_or_waiting_version(&self) -> Option<String> {
        let slots = self.inner.read().await;
        slots
            .active
            .as_ref()
            .or(slots.waiting.as_ref())
            .map(|w| w.version().to_string())
    }

    pub async fn active_version(&self) -> Option<String> {
        self.inner.read().await.active.as_ref().map(|w| w.version().to_string())
    }

    /// Answer a request through the active worker.
    ///
    /// Without an active worker the request goes straight to the network. The
    /// registration lock is only held to pick the worker, so a slow request
    /// never delays messages or a cutover. A request that loses the race with
    /// a cutover is retried on the new worker.
    pub async fn fetch(&self, request: &Request) -> Result<FetchOutcome, Error> {
        loop {
            let active = self.inner.read().await.active.clone();
            let Some(worker) = active else {
                let response = self.network.fetch(request).await?;
                return Ok(FetchOutcome { response, source: ResponseSource::Passthrough, class: RouteClass::Bypass });
            };

            match worker.handle_fetch(request).await {
                Err(Error::InvalidState(_)) if worker.state() == WorkerState::Redundant => {
                    tracing::debug!(url = %request.url, version = %worker.version(), "worker retired mid-request, retrying");
                }
                result => return result,
            }
        }
    }

    pub async fn status(&self) -> RegistrationStatus {
        let slots = self.inner.read().await;
        RegistrationStatus {
            active: slots.active.as_deref().map(WorkerInfo::of),
            waiting: slots.waiting.as_deref().map(WorkerInfo::of),
            clients: slots
                .clients
                .iter()
                .map(|(id, controller)| ClientInfo { id: *id, controller: controller.clone() })
                .collect(),
        }
    }

    /// Wait for background refreshes of the current workers.
    pub async fn settle(&self) {
        let slots = self.inner.read().await;
        for worker in [&slots.active, &slots.waiting].into_iter().flatten() {
            worker.settle().await;
        }
    }
}
