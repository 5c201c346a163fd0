//! In-memory network for tests and offline replays.
//!
//! Serves canned responses by URL, can be switched offline, and can hold
//! every request until released to observe what does or does not wait on
//! the network.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::watch;
use url::Url;

use super::Network;
use swcache_core::{Error, Request, Response};

pub struct MemoryNetwork {
    responses: Mutex<HashMap<String, Response>>,
    log: Mutex<Vec<String>>,
    online: AtomicBool,
    gate: watch::Sender<bool>,
}

impl Default for MemoryNetwork {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryNetwork {
    pub fn new() -> Self {
        let (gate, _) = watch::channel(true);
        Self {
            responses: Mutex::new(HashMap::new()),
            log: Mutex::new(Vec::new()),
            online: AtomicBool::new(true),
            gate,
        }
    }

    /// Answer `url` with `status` and `body` from now on.
    pub fn serve(&self, url: &Url, status: u16, body: impl Into<Bytes>) {
        self.serve_response(Response::new(url.clone(), status, body));
    }

    /// Answer requests for `response.url` with a copy of `response`.
    pub fn serve_response(&self, response: Response) {
        self.responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(response.url.to_string(), response);
    }

    /// Offline requests fail with `Error::Network`.
    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    /// Make every request wait until `release` is called.
    pub fn hold(&self) {
        self.gate.send_replace(false);
    }

    pub fn release(&self) {
        self.gate.send_replace(true);
    }

    /// URLs requested so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn request_count(&self, url: &Url) -> usize {
        self.requests().iter().filter(|u| *u == url.as_str()).count()
    }
}

#[async_trait]
impl Network for MemoryNetwork {
    async fn fetch(&self, request: &Request) -> Result<Response, Error> {
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.url.to_string());

        let mut gate = self.gate.subscribe();
        if gate.wait_for(|open| *open).await.is_err() {
            return Err(Error::Network("network dropped".into()));
        }

        if !self.online.load(Ordering::SeqCst) {
            return Err(Error::Network(format!("{}: offline", request.url)));
        }

        let found = self
            .responses
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(request.url.as_str())
            .cloned();

        Ok(found.unwrap_or_else(|| Response::placeholder(request.url.clone(), 404, "Not Found")))
    }
}
