//! Request and response types passed between the interceptor, the network
//! and the bucket store.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRequest {
    pub method: String,
    pub url: Url,
}

impl CacheRequest {
    /// A GET request for `url`.
    pub fn get(url: Url) -> Self {
        Self { method: "GET".into(), url }
    }

    pub fn new(method: impl Into<String>, url: Url) -> Self {
        Self { method: method.into(), url }
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }
}

/// A response snapshot. Header names are stored lower-cased.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    #[serde(skip)]
    pub body: Bytes,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, headers: BTreeMap<String, String>, body: Bytes) -> Self {
        let headers = headers.into_iter().map(|(k, v)| (k.to_ascii_lowercase(), v)).collect();
        Self { url: url.into(), status, headers, body }
    }

    /// Placeholder served when a cache-first resource cannot be fetched.
    pub fn not_found(url: impl Into<String>) -> Self {
        Self::synthetic(url, 404, "Not Found")
    }

    /// Placeholder served when a network-first resource has no cached fallback.
    pub fn service_unavailable(url: impl Into<String>) -> Self {
        Self::synthetic(url, 503, "Service Unavailable")
    }

    fn synthetic(url: impl Into<String>, status: u16, text: &'static str) -> Self {
        let mut headers = BTreeMap::new();
        headers.insert("content-type".to_string(), "text/plain; charset=utf-8".to_string());
        headers.insert("content-length".to_string(), text.len().to_string());
        Self { url: url.into(), status, headers, body: Bytes::from_static(text.as_bytes()) }
    }

    /// 2xx status.
    pub fn is_ok(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    /// Declared `content-length`, if present and numeric.
    pub fn content_length(&self) -> Option<u64> {
        self.header("content-length").and_then(|v| v.trim().parse().ok())
    }

    /// The `date` header parsed as an HTTP-date.
    pub fn date(&self) -> Option<DateTime<Utc>> {
        self.header("date")
            .and_then(|v| DateTime::parse_from_rfc2822(v.trim()).ok())
            .map(|d| d.with_timezone(&Utc))
    }
}
