//! Network side of the edge cache.
//!
//! ### Fetcher
//! - [`Fetcher`] is the seam between the cache strategies and the network.
//! - [`HttpFetcher`] is the reqwest implementation: rustls, compression,
//!   limited redirects, a request timeout and a per-response byte cap.
//! - Non-2xx statuses are returned as responses, not errors. Only transport
//!   failures (connect, timeout, oversized body) are `FetchError`s.
//!
//! ### Coalescing
//! - [`DedupFetcher`] collapses concurrent fetches of one URL into a single
//!   network request.

pub mod dedup;
pub mod url;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use edge_cache_core::{AppConfig, CacheRequest, Error, Response};
use reqwest::{Client, Method};

pub use dedup::DedupFetcher;
pub use self::url::{UrlError, resolve};

/// Transport failure. Cloneable so coalesced callers can share one outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    /// Request timeout.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// Network error.
    #[error("network error: {0}")]
    Network(String),

    /// Response body over the configured cap.
    #[error("response too large: {size} bytes exceeds {limit}")]
    TooLarge { size: u64, limit: usize },

    /// Method the HTTP client cannot express.
    #[error("invalid method: {0}")]
    InvalidMethod(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() { FetchError::Timeout(err.to_string()) } else { FetchError::Network(err.to_string()) }
    }
}

/// Issues a network request for an intercepted request.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, request: &CacheRequest) -> Result<Response, FetchError>;
}

/// Configuration for the HTTP fetcher.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "edge-cache/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 10MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "edge-cache/0.1".to_string(),
            max_bytes: 10 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            ..Default::default()
        }
    }
}

/// reqwest-backed [`Fetcher`].
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    http: Client,
    config: FetchConfig,
}

impl HttpFetcher {
    /// Create a new fetcher with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::Client(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &CacheRequest) -> Result<Response, FetchError> {
        let start = Instant::now();
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| FetchError::InvalidMethod(request.method.clone()))?;

        let response = self.http.request(method, request.url.clone()).send().await?;

        let status = response.status();
        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(FetchError::TooLarge { size: len, limit: self.config.max_bytes });
        }

        let headers: BTreeMap<String, String> = response
            .headers()
            .iter()
            .filter_map(|(name, value)| value.to_str().ok().map(|v| (name.as_str().to_string(), v.to_string())))
            .collect();

        let bytes = response.bytes().await?;
        if bytes.len() > self.config.max_bytes {
            return Err(FetchError::TooLarge { size: bytes.len() as u64, limit: self.config.max_bytes });
        }

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            request.url,
            status.as_u16(),
            start.elapsed().as_millis(),
            bytes.len()
        );

        Ok(Response::new(request.url.as_str(), status.as_u16(), headers, bytes))
    }
}
