//! Request classification.
//!
//! Rules are tested in a fixed order and the first match wins:
//!
//! 1. Non-GET requests are not intercepted.
//! 2. Same-origin HTML navigations (`*.html`, `/`, the site scope root).
//! 3. Hashed static assets (`*.js`/`*.css` with a `-` in the path).
//! 4. Images, by extension.
//! 5. Fonts, by extension.
//! 6. Cross-origin requests and same-origin `/api` paths.
//! 7. Everything else.

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use url::Url;

use super::Category;
use crate::http::CacheRequest;

static HASHED_ASSET: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\.(js|css)$").expect("valid regex"));

static IMAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\.(png|jpe?g|gif|webp|svg|ico|avif|bmp)$").expect("valid regex"));

static FONT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\.(woff2?|ttf|otf|eot)$").expect("valid regex"));

/// How an intercepted request is served.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "strategy", content = "bucket")]
pub enum Route {
    /// Not intercepted; the request goes out untouched.
    Bypass,
    /// Network-first, never persisted, offline fallback to the site root.
    Html,
    /// Cache-first in the given bucket.
    CacheFirst(Category),
    /// Network-first, persisted into the api bucket, stale fallback on failure.
    Api,
    /// Network-first, unpersisted, fallback to any cached copy.
    Fallback,
}

impl Route {
    /// Bucket a successful response is written to, if any.
    pub fn bucket(&self) -> Option<Category> {
        match self {
            Route::CacheFirst(category) => Some(*category),
            Route::Api => Some(Category::Api),
            Route::Bypass | Route::Html | Route::Fallback => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Route::Bypass => "bypass",
            Route::Html => "html",
            Route::CacheFirst(_) => "cache_first",
            Route::Api => "api",
            Route::Fallback => "fallback",
        }
    }
}

/// Assigns each request to exactly one [`Route`].
#[derive(Debug, Clone)]
pub struct Classifier {
    origin: Url,
    scope: String,
    cdn_hosts: Vec<String>,
}

impl Classifier {
    pub fn new(origin: Url, scope: impl Into<String>, cdn_hosts: Vec<String>) -> Self {
        let cdn_hosts = cdn_hosts.into_iter().map(|h| h.to_ascii_lowercase()).collect();
        Self { origin, scope: scope.into(), cdn_hosts }
    }

    pub fn classify(&self, request: &CacheRequest) -> Route {
        if !request.is_get() {
            return Route::Bypass;
        }

        let url = &request.url;
        let path = url.path();
        let same_origin = url.origin() == self.origin.origin();

        if same_origin && self.is_navigation(path) {
            return Route::Html;
        }

        if HASHED_ASSET.is_match(path) && path.contains('-') {
            return Route::CacheFirst(Category::Runtime);
        }

        if IMAGE.is_match(path) {
            return Route::CacheFirst(Category::Images);
        }

        if FONT.is_match(path) {
            return Route::CacheFirst(Category::Fonts);
        }

        if !same_origin {
            if url.host_str().is_some_and(|h| self.cdn_hosts.iter().any(|c| c == h)) {
                return Route::CacheFirst(Category::Cdn);
            }
            return Route::Api;
        }

        if path.contains("/api") {
            return Route::Api;
        }

        Route::Fallback
    }

    fn is_navigation(&self, path: &str) -> bool {
        if path.to_ascii_lowercase().ends_with(".html") || path == "/" {
            return true;
        }
        path == self.scope || path == self.scope.trim_end_matches('/')
    }
}
