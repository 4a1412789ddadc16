//! Application configuration with layered loading.
//!
//! This module provides configuration management using figment for layered
//! configuration loading from multiple sources:
//!
//! 1. Environment variables (EDGE_CACHE_*)
//! 2. TOML config file (if EDGE_CACHE_CONFIG_FILE set)
//! 3. Built-in defaults

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::policy::TtlTable;

mod validation;

pub use validation::ConfigError;

/// Longest max age either TTL may be configured with: ten years.
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Application configuration with layered loading.
///
/// Loading precedence (highest wins):
/// 1. Environment variables (EDGE_CACHE_*)
/// 2. TOML config file (if EDGE_CACHE_CONFIG_FILE set)
/// 3. Built-in defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Prefix shared by every bucket this cache owns.
    ///
    /// Set via EDGE_CACHE_CACHE_PREFIX environment variable.
    #[serde(default = "default_cache_prefix")]
    pub cache_prefix: String,

    /// Deployed version tag. Buckets from other versions are deleted on activate.
    ///
    /// Set via EDGE_CACHE_VERSION environment variable.
    #[serde(default = "default_version")]
    pub version: String,

    /// Site origin; requests to any other origin count as cross-origin.
    ///
    /// Set via EDGE_CACHE_ORIGIN environment variable.
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Path of the site root under the origin.
    ///
    /// Set via EDGE_CACHE_SCOPE environment variable.
    #[serde(default = "default_scope")]
    pub scope: String,

    /// URLs warmed into the precache bucket on install, relative to the origin.
    #[serde(default = "default_precache_urls")]
    pub precache_urls: Vec<String>,

    /// Path to SQLite cache database.
    ///
    /// Set via EDGE_CACHE_DB_PATH environment variable.
    #[serde(default = "default_db_path")]
    pub db_path: PathBuf,

    /// User-Agent string for HTTP requests.
    ///
    /// Set via EDGE_CACHE_USER_AGENT environment variable.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// HTTP request timeout in milliseconds.
    ///
    /// Set via EDGE_CACHE_TIMEOUT_MS environment variable.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Maximum bytes accepted per network response.
    ///
    /// Set via EDGE_CACHE_MAX_BYTES environment variable.
    #[serde(default = "default_max_bytes")]
    pub max_bytes: usize,

    /// Size ceiling for a single bucket, summed over stored content-length.
    ///
    /// Set via EDGE_CACHE_MAX_BUCKET_BYTES environment variable.
    #[serde(default = "default_max_bucket_bytes")]
    pub max_bucket_bytes: u64,

    /// Share of a bucket's entries evicted when it exceeds its ceiling.
    #[serde(default = "default_eviction_fraction")]
    pub eviction_fraction: f64,

    /// Image entries older than this are refetched.
    #[serde(default = "default_image_ttl_days")]
    pub image_ttl_days: u32,

    /// Advisory max age for API responses; not enforced on fallback.
    #[serde(default = "default_api_ttl_secs")]
    pub api_ttl_secs: u64,

    /// Run the size governor on a bucket after each successful store.
    ///
    /// Set via EDGE_CACHE_SWEEP_AFTER_WRITE environment variable.
    #[serde(default = "default_true")]
    pub sweep_after_write: bool,

    /// Cross-origin hosts served cache-first from the cdn bucket.
    #[serde(default)]
    pub cdn_hosts: Vec<String>,
}

fn default_cache_prefix() -> String {
    "phtv".into()
}

fn default_version() -> String {
    "v1".into()
}

fn default_origin() -> String {
    "https://phamhungtien.github.io".into()
}

fn default_scope() -> String {
    "/PHTV/".into()
}

fn default_precache_urls() -> Vec<String> {
    vec![default_scope()]
}

fn default_db_path() -> PathBuf {
    PathBuf::from("./edge-cache.sqlite")
}

fn default_user_agent() -> String {
    "edge-cache/0.1".into()
}

fn default_timeout_ms() -> u64 {
    20_000
}

fn default_max_bytes() -> usize {
    10_485_760 // 10MB
}

fn default_max_bucket_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_eviction_fraction() -> f64 {
    0.2
}

fn default_image_ttl_days() -> u32 {
    30
}

fn default_api_ttl_secs() -> u64 {
    3600
}

fn default_true() -> bool {
    true
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            cache_prefix: default_cache_prefix(),
            version: default_version(),
            origin: default_origin(),
            scope: default_scope(),
            precache_urls: default_precache_urls(),
            db_path: default_db_path(),
            user_agent: default_user_agent(),
            timeout_ms: default_timeout_ms(),
            max_bytes: default_max_bytes(),
            max_bucket_bytes: default_max_bucket_bytes(),
            eviction_fraction: default_eviction_fraction(),
            image_ttl_days: default_image_ttl_days(),
            api_ttl_secs: default_api_ttl_secs(),
            sweep_after_write: true,
            cdn_hosts: Vec::new(),
        }
    }
}

impl AppConfig {
    /// Timeout as Duration for use with reqwest/tokio.
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Parsed site origin.
    pub fn origin_url(&self) -> Result<Url, ConfigError> {
        Url::parse(&self.origin)
            .map_err(|e| ConfigError::Invalid { field: "origin".into(), reason: e.to_string() })
    }

    /// Absolute URL of the site root, used as the offline landing page.
    pub fn site_root(&self) -> Result<Url, ConfigError> {
        self.origin_url()?
            .join(&self.scope)
            .map_err(|e| ConfigError::Invalid { field: "scope".into(), reason: e.to_string() })
    }

    /// Absolute precache URLs, resolved against the origin.
    pub fn precache_targets(&self) -> Result<Vec<Url>, ConfigError> {
        let origin = self.origin_url()?;
        self.precache_urls
            .iter()
            .map(|u| {
                origin
                    .join(u)
                    .map_err(|e| ConfigError::Invalid { field: "precache_urls".into(), reason: format!("{u}: {e}") })
            })
            .collect()
    }

    /// Per-category max ages derived from this configuration.
    ///
    /// Both are capped at [`MAX_TTL_SECS`]; `validate()` rejects anything longer.
    pub fn ttl_table(&self) -> TtlTable {
        let ceiling = chrono::Duration::seconds(MAX_TTL_SECS);
        let api_secs = i64::try_from(self.api_ttl_secs).map_or(MAX_TTL_SECS, |secs| secs.min(MAX_TTL_SECS));
        TtlTable {
            images: chrono::Duration::days(i64::from(self.image_ttl_days)).min(ceiling),
            api: chrono::Duration::seconds(api_secs),
        }
    }

    /// Load configuration from all sources with layered precedence.
    ///
    /// Priority (highest wins):
    /// 1. Environment variables prefixed with `EDGE_CACHE_`
    /// 2. TOML file from `EDGE_CACHE_CONFIG_FILE` (if set)
    /// 3. Built-in defaults via `Default::default()`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - Configuration file cannot be read
    /// - Environment variables cannot be parsed
    /// - Validation fails after loading
    pub fn load() -> Result<Self, ConfigError> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        if let Ok(config_path) = std::env::var("EDGE_CACHE_CONFIG_FILE") {
            figment = figment.merge(Toml::file(&config_path));
        }

        figment = figment.merge(
            Env::prefixed("EDGE_CACHE_")
                .ignore(&["CONFIG_FILE"])
                .map(|key| key.as_str().to_lowercase().into())
                .split("__"),
        );

        let config: Self = figment.extract().map_err(|e| ConfigError::LoadFailed(e.to_string()))?;

        config.validate()?;

        Ok(config)
    }
}
