//! Test doubles

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tiercache_proxy::{FetchRequest, FetchResponse, Fetcher, ProxyError};
use tokio::sync::Semaphore;

/// Fetcher answering from a fixed route table
///
/// Unrouted URLs answer 404. While offline every fetch fails with a
/// connection error. While held, fetches block until released.
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, FetchResponse>>,
    offline: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn route(&self, url: &str, status: u16, body: &str) {
        self.routes.lock().insert(
            url.to_string(),
            FetchResponse::new(status, body.to_string()).with_header("content-type", "text/plain"),
        );
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn hold(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().len()
    }

    pub fn calls_to(&self, url: &str) -> usize {
        self.calls.lock().iter().filter(|u| *u == url).count()
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, ProxyError> {
        let url = request.url.to_string();
        self.calls.lock().push(url.clone());

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }

        if self.offline.load(Ordering::SeqCst) {
            return Err(ProxyError::Connection(format!("offline: {}", url)));
        }

        Ok(self
            .routes
            .lock()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::new(404, "not found")))
    }
}
