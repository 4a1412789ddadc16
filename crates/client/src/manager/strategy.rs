//! Fetch strategies.
//!
//! | route | order | persisted to | on network failure |
//! |---|---|---|---|
//! | cache-first | bucket, then network | its bucket (2xx only) | 404 |
//! | html | network | never | exact copy, then site root, then 503 |
//! | api | network | api bucket (2xx only) | api copy of any age, then 503 |
//! | fallback | network | never | any cached copy, then 503 |
//!
//! Coalesced callers share one network response; only the caller that issued
//! the request writes it to the bucket.

use chrono::Utc;
use edge_cache_core::policy::is_fresh;
use edge_cache_core::{CacheEntry, CacheRequest, Category, Response};

use super::CacheManager;

impl CacheManager {
    pub(crate) async fn cache_first(&self, request: &CacheRequest, category: Category) -> Response {
        let bucket = self.namer.name(category);
        let url = request.url.as_str();

        match self.store.match_entry(&bucket, url).await {
            Ok(Some(entry)) => match self.ttl.enforced_max_age(category) {
                Some(ttl) if !is_fresh(entry.stored_at, ttl, Utc::now()) => {
                    tracing::debug!(url, bucket = %bucket, stored_at = %entry.stored_at, "stale entry, refetching");
                    if let Err(e) = self.store.delete_entry(&bucket, url).await {
                        tracing::warn!(url, bucket = %bucket, error = %e, "failed to delete stale entry");
                    }
                }
                _ => {
                    tracing::debug!(url, bucket = %bucket, "cache hit");
                    return entry.to_response();
                }
            },
            Ok(None) => tracing::debug!(url, bucket = %bucket, "cache miss"),
            Err(e) => tracing::warn!(url, bucket = %bucket, error = %e, "cache read failed, treating as miss"),
        }

        match self.fetcher.fetch_led(request).await {
            (Ok(response), leader) => {
                if leader && response.is_ok() {
                    self.store_copy(&bucket, url, &response).await;
                }
                response
            }
            (Err(e), _) => {
                tracing::warn!(url, error = %e, "fetch failed, resource unavailable");
                Response::not_found(url)
            }
        }
    }

    pub(crate) async fn network_first_html(&self, request: &CacheRequest) -> Response {
        let url = request.url.as_str();

        let error = match self.fetcher.fetch(request).await {
            Ok(response) => return response,
            Err(e) => e,
        };
        tracing::warn!(url, error = %error, "navigation failed, serving offline copy");

        if let Some(entry) = self.lookup_any(url).await {
            return entry.to_response();
        }
        if let Some(entry) = self.lookup_any(self.site_root.as_str()).await {
            tracing::debug!(url, root = %self.site_root, "serving cached site root");
            return entry.to_response();
        }

        Response::service_unavailable(url)
    }

    /// API responses are served from cache at any age when the network fails;
    /// the api max age is advisory.
    pub(crate) async fn network_first_api(&self, request: &CacheRequest) -> Response {
        let bucket = self.namer.name(Category::Api);
        let url = request.url.as_str();

        let error = match self.fetcher.fetch_led(request).await {
            (Ok(response), leader) => {
                if leader && response.is_ok() {
                    self.store_copy(&bucket, url, &response).await;
                }
                return response;
            }
            (Err(e), _) => e,
        };
        tracing::warn!(url, error = %error, "api request failed, trying cached copy");

        match self.store.match_entry(&bucket, url).await {
            Ok(Some(entry)) => {
                if let Some(ttl) = self.ttl.max_age(Category::Api)
                    && !is_fresh(entry.stored_at, ttl, Utc::now())
                {
                    tracing::debug!(url, stored_at = %entry.stored_at, "serving api copy past its max age");
                }
                entry.to_response()
            }
            Ok(None) => Response::service_unavailable(url),
            Err(e) => {
                tracing::warn!(url, error = %e, "cache read failed");
                Response::service_unavailable(url)
            }
        }
    }

    pub(crate) async fn network_first_any(&self, request: &CacheRequest) -> Response {
        let url = request.url.as_str();

        match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(url, error = %e, "fetch failed, trying any cached copy");
                match self.lookup_any(url).await {
                    Some(entry) => entry.to_response(),
                    None => Response::service_unavailable(url),
                }
            }
        }
    }

    /// Write failures are logged; the caller still gets its response.
    async fn store_copy(&self, bucket: &str, url: &str, response: &Response) {
        match self.store.put(bucket, url, response).await {
            Ok(entry) => {
                tracing::debug!(url, bucket, size_bytes = entry.size_bytes, "stored response");
                if self.governor.sweep_after_write
                    && let Err(e) = self.sweep_bucket(bucket).await
                {
                    tracing::warn!(bucket, error = %e, "post-write sweep failed");
                }
            }
            Err(e) => tracing::warn!(url, bucket, error = %e, "failed to store response"),
        }
    }

    async fn lookup_any(&self, url: &str) -> Option<CacheEntry> {
        self.store.match_any(url).await.unwrap_or_else(|e| {
            tracing::warn!(url, error = %e, "cache read failed");
            None
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use bytes::Bytes;
    use chrono::Utc;
    use edge_cache_core::{CacheEntry, Category, Response};

    use super::super::Interception;
    use super::super::tests::{config, get, manager_with};
    use crate::testing::ScriptedFetcher;

    async fn cache_page(manager: &super::CacheManager, url: &str, body: &'static [u8]) {
        let response = Response::new(url, 200, Default::default(), Bytes::from_static(body));
        manager.store().put(&manager.bucket_name(Category::Precache), url, &response).await.unwrap();
    }

    fn served(result: Interception) -> Response {
        match result {
            Interception::Respond(response) => response,
            Interception::Bypass => panic!("request was not intercepted"),
        }
    }

    #[tokio::test]
    async fn test_cache_first_serves_second_request_from_cache() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/assets/app-8f3c1a.js");
        network.respond(request.url.as_str(), 200, &[("content-length", "9")], b"console()");

        let first = served(manager.handle_fetch(&request).await);
        let second = served(manager.handle_fetch(&request).await);

        assert_eq!(network.calls(), 1);
        assert_eq!(first.body, second.body);
        assert_eq!(second.status, 200);
    }

    #[tokio::test]
    async fn test_concurrent_misses_issue_one_network_call() {
        let network = Arc::new(ScriptedFetcher::with_delay(Duration::from_millis(100)));
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/screenshots/main.png");
        network.respond(request.url.as_str(), 200, &[("content-length", "3")], b"png");

        let results = futures::future::join_all((0..5).map(|_| manager.handle_fetch(&request))).await;

        assert_eq!(network.calls(), 1);
        for result in results {
            assert_eq!(served(result).body, Bytes::from_static(b"png"));
        }

        // A single write: the first row of a fresh store.
        let entry = manager.entry(Category::Images, request.url.as_str()).await.unwrap().unwrap();
        assert_eq!(entry.seq, 1);
    }

    async fn store_image_aged(manager: &super::CacheManager, url: &str, days: i64) {
        let response = Response::new(url, 200, Default::default(), Bytes::from_static(b"old"));
        let mut entry = CacheEntry::from_response(&manager.bucket_name(Category::Images), url, &response, Utc::now());
        entry.stored_at = Utc::now() - chrono::Duration::days(days);
        manager.store().put_entry(&entry).await.unwrap();
    }

    #[tokio::test]
    async fn test_image_past_ttl_is_refetched() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/logo.webp");
        store_image_aged(&manager, request.url.as_str(), 31).await;
        network.respond(request.url.as_str(), 200, &[], b"new");

        let response = served(manager.handle_fetch(&request).await);

        assert_eq!(network.calls(), 1);
        assert_eq!(response.body, Bytes::from_static(b"new"));
        let entry = manager.entry(Category::Images, request.url.as_str()).await.unwrap().unwrap();
        assert_eq!(entry.body, Bytes::from_static(b"new"));
    }

    #[tokio::test]
    async fn test_image_within_ttl_served_from_cache() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/logo.webp");
        store_image_aged(&manager, request.url.as_str(), 29).await;

        let response = served(manager.handle_fetch(&request).await);

        assert_eq!(network.calls(), 0);
        assert_eq!(response.body, Bytes::from_static(b"old"));
    }

    #[tokio::test]
    async fn test_fonts_never_expire() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/font.woff2");
        let url = request.url.as_str();
        let response = Response::new(url, 200, Default::default(), Bytes::from_static(b"woff"));
        let mut entry = CacheEntry::from_response(&manager.bucket_name(Category::Fonts), url, &response, Utc::now());
        entry.stored_at = Utc::now() - chrono::Duration::days(3650);
        manager.store().put_entry(&entry).await.unwrap();

        served(manager.handle_fetch(&request).await);
        assert_eq!(network.calls(), 0);
    }

    #[tokio::test]
    async fn test_cache_first_network_failure_is_not_found() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/font.woff2");
        network.fail(request.url.as_str());

        let response = served(manager.handle_fetch(&request).await);
        assert_eq!(response.status, 404);
    }

    #[tokio::test]
    async fn test_cache_first_error_status_not_stored() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/missing.png");
        network.respond(request.url.as_str(), 404, &[], b"nope");

        let response = served(manager.handle_fetch(&request).await);

        assert_eq!(response.status, 404);
        assert!(manager.entry(Category::Images, request.url.as_str()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_html_never_persisted() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/");
        network.respond(request.url.as_str(), 200, &[], b"<html>");

        served(manager.handle_fetch(&request).await);

        assert!(manager.usage().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_html_failure_serves_exact_copy() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/donate.html");
        let url = request.url.as_str();
        let root = get("/PHTV/").url.to_string();
        cache_page(&manager, url, b"donate").await;
        cache_page(&manager, &root, b"root").await;
        network.fail(url);

        let response = served(manager.handle_fetch(&request).await);
        assert_eq!(response.body, Bytes::from_static(b"donate"));
    }

    #[tokio::test]
    async fn test_html_failure_serves_site_root() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/faq.html");
        let root = get("/PHTV/").url.to_string();
        cache_page(&manager, &root, b"root").await;
        network.fail(request.url.as_str());

        let response = served(manager.handle_fetch(&request).await);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from_static(b"root"));
    }

    #[tokio::test]
    async fn test_html_failure_without_cache_is_unavailable() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/faq.html");
        network.fail(request.url.as_str());

        let response = served(manager.handle_fetch(&request).await);
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_api_success_persisted_and_served_stale_on_failure() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("https://api.github.com/repos/PhamHungTien/PHTV/releases");
        let url = request.url.as_str();
        network.respond(url, 200, &[("date", "Tue, 15 Nov 1994 08:12:31 GMT")], b"[]");

        served(manager.handle_fetch(&request).await);
        assert!(manager.entry(Category::Api, url).await.unwrap().is_some());

        network.fail(url);
        let response = served(manager.handle_fetch(&request).await);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from_static(b"[]"));
    }

    #[tokio::test]
    async fn test_api_failure_without_cache_is_unavailable() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("https://api.github.com/repos/PhamHungTien/PHTV/releases");
        network.fail(request.url.as_str());

        let response = served(manager.handle_fetch(&request).await);
        assert_eq!(response.status, 503);
    }

    #[tokio::test]
    async fn test_fallback_route_uses_any_cached_copy() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network.clone()).await;
        let request = get("/PHTV/manifest.json");
        let url = request.url.as_str();

        network.respond(url, 200, &[], b"{}");
        served(manager.handle_fetch(&request).await);
        assert!(manager.usage().await.unwrap().is_empty());

        cache_page(&manager, url, b"{\"cached\":1}").await;
        network.fail(url);

        let response = served(manager.handle_fetch(&request).await);
        assert_eq!(response.body, Bytes::from_static(b"{\"cached\":1}"));
    }

    #[tokio::test]
    async fn test_store_failure_still_serves_response() {
        let path = std::env::temp_dir().join(format!("edge-cache-store-failure-{}.sqlite", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let network = Arc::new(ScriptedFetcher::new());
        let store = edge_cache_core::CacheStore::open(&path).await.unwrap();
        let manager = super::CacheManager::new(&config(), store, network.clone()).unwrap();

        let other = tokio_rusqlite::Connection::open(&path).await.unwrap();
        other.call(|conn| conn.execute_batch("DROP TABLE entries;")).await.unwrap();

        let logo = get("/PHTV/logo.webp");
        network.respond(logo.url.as_str(), 200, &[("content-length", "4")], b"webp");
        let response = served(manager.handle_fetch(&logo).await);
        assert_eq!(response.status, 200);
        assert_eq!(response.body, Bytes::from_static(b"webp"));
        assert_eq!(network.calls(), 1);

        let page = get("/PHTV/");
        network.fail(page.url.as_str());
        let response = served(manager.handle_fetch(&page).await);
        assert_eq!(response.status, 503);

        drop(other);
        drop(manager);
        let _ = std::fs::remove_file(&path);
    }
}
