//! Request coalescing.
//!
//! The ledger maps a URL to the shared future of its in-flight fetch. The
//! first caller for a URL becomes the leader and registers the fetch; callers
//! arriving while it is pending await the same shared future. The fetch
//! removes its own ledger entry as it settles, success or failure, so a later
//! request always goes back to the network.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use edge_cache_core::{CacheRequest, Response};
use futures::FutureExt;
use futures::future::{BoxFuture, Shared};

use super::{FetchError, Fetcher};

type SharedFetch = Shared<BoxFuture<'static, Result<Response, FetchError>>>;

/// Wraps a [`Fetcher`] so concurrent fetches of one URL share a single
/// network request.
#[derive(Clone)]
pub struct DedupFetcher {
    inner: Arc<dyn Fetcher>,
    in_flight: Arc<DashMap<String, SharedFetch>>,
}

impl DedupFetcher {
    pub fn new(inner: Arc<dyn Fetcher>) -> Self {
        Self { inner, in_flight: Arc::new(DashMap::new()) }
    }

    /// Fetch `request`, joining an identical in-flight fetch if there is one.
    pub async fn fetch(&self, request: &CacheRequest) -> Result<Response, FetchError> {
        self.fetch_led(request).await.0
    }

    /// Like [`fetch`](Self::fetch), also reporting whether this caller issued
    /// the network request. Exactly one caller per settled fetch is the leader.
    pub async fn fetch_led(&self, request: &CacheRequest) -> (Result<Response, FetchError>, bool) {
        let key = request.url.to_string();

        let (shared, leader) = match self.in_flight.entry(key.clone()) {
            Entry::Occupied(pending) => {
                tracing::debug!(url = %key, "joining in-flight fetch");
                (pending.get().clone(), false)
            }
            Entry::Vacant(slot) => {
                let inner = Arc::clone(&self.inner);
                let ledger = Arc::clone(&self.in_flight);
                let request = request.clone();

                let fetch = async move {
                    let result = inner.fetch(&request).await;
                    ledger.remove(&key);
                    result
                }
                .boxed()
                .shared();

                slot.insert(fetch.clone());
                (fetch, true)
            }
        };

        (shared.await, leader)
    }

    /// Number of URLs with a fetch currently in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }
}

impl std::fmt::Debug for DedupFetcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupFetcher").field("in_flight", &self.in_flight.len()).finish()
    }
}
