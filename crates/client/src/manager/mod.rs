//! The cache manager: one explicit object per process that the hosting
//! runtime feeds with lifecycle, message and fetch events.
//!
//! - `handle_fetch` routes each request through the classifier and serves it
//!   with the matching strategy (see [`strategy`]).
//! - `handle_install` / `handle_activate` / `handle_message` drive the
//!   version lifecycle (see [`lifecycle`]).
//! - `sweep` keeps buckets under their size ceiling (see [`governor`]).
//!
//! The manager holds no global state beyond its own fields: the bucket store,
//! the in-flight ledger inside its fetcher, and the lifecycle state.

pub mod governor;
pub mod lifecycle;
pub mod strategy;

use std::sync::Arc;

use edge_cache_core::{
    AppConfig, BucketNamer, BucketUsage, Broadcast, CacheEntry, CacheRequest, CacheStore, Category, Classifier, Error,
    Response, Route, TtlTable,
};
use tokio::sync::{Mutex, broadcast};
use url::Url;

pub use governor::{GovernorConfig, SweepReport};
pub use lifecycle::{ActivateReport, InstallReport, LifecycleState, MessageOutcome};

use crate::fetch::{DedupFetcher, Fetcher};

/// Capacity of the outbound broadcast channel.
const BROADCAST_CAPACITY: usize = 16;

/// Outcome of intercepting a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Interception {
    /// Not intercepted; the caller issues the request itself.
    Bypass,
    /// Served by the cache manager.
    Respond(Response),
}

impl Interception {
    pub fn response(&self) -> Option<&Response> {
        match self {
            Interception::Bypass => None,
            Interception::Respond(response) => Some(response),
        }
    }
}

/// Edge cache manager.
pub struct CacheManager {
    store: CacheStore,
    fetcher: DedupFetcher,
    classifier: Classifier,
    namer: BucketNamer,
    ttl: TtlTable,
    site_root: Url,
    origin: Url,
    precache: Vec<Url>,
    governor: GovernorConfig,
    state: Mutex<LifecycleState>,
    broadcasts: broadcast::Sender<Broadcast>,
}

impl CacheManager {
    /// Build a manager for the version described by `config`.
    pub fn new(config: &AppConfig, store: CacheStore, fetcher: Arc<dyn Fetcher>) -> Result<Self, Error> {
        let invalid = |e: edge_cache_core::ConfigError| Error::InvalidInput(e.to_string());
        let origin = config.origin_url().map_err(invalid)?;
        let site_root = config.site_root().map_err(invalid)?;
        let precache = config.precache_targets().map_err(invalid)?;
        let (broadcasts, _) = broadcast::channel(BROADCAST_CAPACITY);

        Ok(Self {
            store,
            fetcher: DedupFetcher::new(fetcher),
            classifier: Classifier::new(origin.clone(), config.scope.clone(), config.cdn_hosts.clone()),
            namer: BucketNamer::new(config.cache_prefix.clone(), config.version.clone()),
            ttl: config.ttl_table(),
            site_root,
            origin,
            precache,
            governor: GovernorConfig::from(config),
            state: Mutex::new(LifecycleState::Parsed),
            broadcasts,
        })
    }

    /// Intercept one request.
    ///
    /// Never fails: network and store failures degrade to cached copies or to
    /// synthetic 404/503 responses.
    pub async fn handle_fetch(&self, request: &CacheRequest) -> Interception {
        let route = self.classifier.classify(request);
        tracing::debug!(url = %request.url, route = route.label(), "intercepted request");

        let response = match route {
            Route::Bypass => return Interception::Bypass,
            Route::Html => self.network_first_html(request).await,
            Route::CacheFirst(category) => self.cache_first(request, category).await,
            Route::Api => self.network_first_api(request).await,
            Route::Fallback => self.network_first_any(request).await,
        };

        Interception::Respond(response)
    }

    /// How `request` would be served.
    pub fn classify(&self, request: &CacheRequest) -> Route {
        self.classifier.classify(request)
    }

    /// Receiver for `SW_UPDATED` broadcasts.
    pub fn subscribe(&self) -> broadcast::Receiver<Broadcast> {
        self.broadcasts.subscribe()
    }

    /// Site origin that relative request URLs resolve against.
    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub fn version(&self) -> &str {
        self.namer.version()
    }

    /// Live bucket name for `category`.
    pub fn bucket_name(&self, category: Category) -> String {
        self.namer.name(category)
    }

    pub fn ttl_table(&self) -> &TtlTable {
        &self.ttl
    }

    /// Stored entry for `url` in the live bucket of `category`.
    pub async fn entry(&self, category: Category, url: &str) -> Result<Option<CacheEntry>, Error> {
        self.store.match_entry(&self.namer.name(category), url).await
    }

    /// Usage of every bucket in the store, including stale ones not yet collected.
    pub async fn usage(&self) -> Result<Vec<BucketUsage>, Error> {
        let mut usage = Vec::new();
        for name in self.store.bucket_names().await? {
            usage.push(self.store.bucket_usage(&name).await?);
        }
        Ok(usage)
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }
}
