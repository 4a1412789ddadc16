//! Configuration validation rules.
//!
//! This module provides validation logic for `AppConfig` values
//! after they have been loaded from environment, files, or defaults.

use crate::config::{AppConfig, MAX_TTL_SECS};
use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load configuration: {0}")]
    LoadFailed(String),

    #[error("invalid configuration: {field} - {reason}")]
    Invalid { field: String, reason: String },
}

impl AppConfig {
    /// Validate configuration values after loading.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if:
    /// - `cache_prefix`, `version` or `user_agent` is empty
    /// - `version` contains `-` (it would break bucket name parsing)
    /// - `origin` is not an absolute http(s) URL
    /// - `timeout_ms` is less than 100ms or exceeds 5 minutes
    /// - `max_bytes` or `max_bucket_bytes` is 0
    /// - `eviction_fraction` is outside (0, 1]
    /// - `image_ttl_days` or `api_ttl_secs` exceeds ten years
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.cache_prefix.is_empty() {
            return Err(ConfigError::Invalid { field: "cache_prefix".into(), reason: "must not be empty".into() });
        }

        if self.version.is_empty() {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not be empty".into() });
        }
        if self.version.contains('-') {
            return Err(ConfigError::Invalid { field: "version".into(), reason: "must not contain '-'".into() });
        }

        let origin = self.origin_url()?;
        if origin.scheme() != "http" && origin.scheme() != "https" {
            return Err(ConfigError::Invalid { field: "origin".into(), reason: "must be an http(s) URL".into() });
        }
        if !self.scope.starts_with('/') {
            return Err(ConfigError::Invalid { field: "scope".into(), reason: "must start with '/'".into() });
        }

        if self.timeout_ms < 100 {
            return Err(ConfigError::Invalid { field: "timeout_ms".into(), reason: "must be at least 100ms".into() });
        }
        if self.timeout_ms > 300_000 {
            return Err(ConfigError::Invalid {
                field: "timeout_ms".into(),
                reason: "must not exceed 5 minutes (300000ms)".into(),
            });
        }

        if self.max_bytes == 0 {
            return Err(ConfigError::Invalid { field: "max_bytes".into(), reason: "must be greater than 0".into() });
        }
        if self.max_bucket_bytes == 0 {
            return Err(ConfigError::Invalid {
                field: "max_bucket_bytes".into(),
                reason: "must be greater than 0".into(),
            });
        }

        if !(self.eviction_fraction > 0.0 && self.eviction_fraction <= 1.0) {
            return Err(ConfigError::Invalid {
                field: "eviction_fraction".into(),
                reason: "must be in (0, 1]".into(),
            });
        }

        if i64::from(self.image_ttl_days) * 86_400 > MAX_TTL_SECS {
            return Err(ConfigError::Invalid {
                field: "image_ttl_days".into(),
                reason: format!("must not exceed {} days", MAX_TTL_SECS / 86_400),
            });
        }
        if self.api_ttl_secs > MAX_TTL_SECS.unsigned_abs() {
            return Err(ConfigError::Invalid {
                field: "api_ttl_secs".into(),
                reason: format!("must not exceed {MAX_TTL_SECS}s"),
            });
        }

        if self.user_agent.is_empty() {
            return Err(ConfigError::Invalid { field: "user_agent".into(), reason: "must not be empty".into() });
        }

        if self.max_bytes as u64 > self.max_bucket_bytes {
            tracing::warn!(
                max_bytes = self.max_bytes,
                max_bucket_bytes = self.max_bucket_bytes,
                "a single response may exceed the bucket ceiling and be evicted on the next sweep"
            );
        }

        Ok(())
    }
}
