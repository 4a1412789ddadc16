//! Scripted network for tests.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use edge_cache_core::{CacheRequest, Response};

use crate::fetch::{FetchError, Fetcher};

/// Serves canned responses per URL and counts network calls.
#[derive(Default)]
pub struct ScriptedFetcher {
    routes: Mutex<HashMap<String, Result<Response, FetchError>>>,
    calls: AtomicUsize,
    delay: Duration,
}

impl ScriptedFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Hold every response for `delay` before settling.
    pub fn with_delay(delay: Duration) -> Self {
        Self { delay, ..Self::default() }
    }

    pub fn respond(&self, url: &str, status: u16, headers: &[(&str, &str)], body: &'static [u8]) {
        let headers: BTreeMap<String, String> = headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        let response = Response::new(url, status, headers, Bytes::from_static(body));
        self.routes.lock().unwrap().insert(url.to_string(), Ok(response));
    }

    pub fn fail(&self, url: &str) {
        self.routes
            .lock()
            .unwrap()
            .insert(url.to_string(), Err(FetchError::Network("connection refused".into())));
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<Response, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let routes = self.routes.lock().unwrap();
        routes
            .get(request.url.as_str())
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Network(format!("no route to {}", request.url))))
    }
}
