//! Bucket size governor.
//!
//! A sweep sums the recorded `content-length` of every entry in a bucket. If
//! the total is over the ceiling, the oldest `ceil(fraction * entries)` entries
//! are evicted by insertion sequence. Entries stored without a usable size
//! header count as zero bytes.

use edge_cache_core::{AppConfig, Category, Error};
use serde::Serialize;

use super::CacheManager;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GovernorConfig {
    pub max_bucket_bytes: u64,
    pub eviction_fraction: f64,
    pub sweep_after_write: bool,
}

impl Default for GovernorConfig {
    fn default() -> Self {
        Self { max_bucket_bytes: 50 * 1024 * 1024, eviction_fraction: 0.2, sweep_after_write: true }
    }
}

impl From<&AppConfig> for GovernorConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            max_bucket_bytes: config.max_bucket_bytes,
            eviction_fraction: config.eviction_fraction,
            sweep_after_write: config.sweep_after_write,
        }
    }
}

impl GovernorConfig {
    /// Entries to evict from a bucket holding `entries` entries.
    pub fn eviction_count(&self, entries: u64) -> u64 {
        let raw = (entries as f64 * self.eviction_fraction - 1e-9).ceil();
        (raw.max(0.0) as u64).min(entries)
    }
}

/// Result of sweeping one bucket. Counts are taken before eviction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub bucket: String,
    pub entries: u64,
    pub total_bytes: u64,
    pub evicted: u64,
}

impl CacheManager {
    /// Sweep the live bucket of `category`.
    pub async fn sweep(&self, category: Category) -> Result<SweepReport, Error> {
        self.sweep_bucket(&self.namer.name(category)).await
    }

    /// Sweep every live bucket that exists in the store.
    pub async fn sweep_all(&self) -> Result<Vec<SweepReport>, Error> {
        let mut reports = Vec::new();
        for name in self.namer.live_names() {
            if self.store.has_bucket(&name).await? {
                reports.push(self.sweep_bucket(&name).await?);
            }
        }
        Ok(reports)
    }

    pub(crate) async fn sweep_bucket(&self, bucket: &str) -> Result<SweepReport, Error> {
        let usage = self.store.bucket_usage(bucket).await?;

        let evicted = if usage.total_bytes > self.governor.max_bucket_bytes {
            let count = self.governor.eviction_count(usage.entries);
            let evicted = self.store.evict_oldest(bucket, count).await?;
            tracing::info!(
                bucket,
                total_bytes = usage.total_bytes,
                max_bytes = self.governor.max_bucket_bytes,
                evicted,
                "bucket over ceiling, evicted oldest entries"
            );
            evicted
        } else {
            0
        };

        Ok(SweepReport { bucket: usage.name, entries: usage.entries, total_bytes: usage.total_bytes, evicted })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use bytes::Bytes;
    use edge_cache_core::{AppConfig, Category, Response};

    use super::super::tests::{config, manager_with};
    use super::*;
    use crate::testing::ScriptedFetcher;

    const TEN_MB: &str = "10485760";

    async fn fill(manager: &CacheManager, category: Category, count: usize, size: &str) {
        let bucket = manager.bucket_name(category);
        for i in 0..count {
            let url = format!("https://phamhungtien.github.io/PHTV/shot-{i}.png");
            let headers = [("content-length".to_string(), size.to_string())].into_iter().collect();
            let response = Response::new(&url, 200, headers, Bytes::from_static(b"x"));
            manager.store().put(&bucket, &url, &response).await.unwrap();
        }
    }

    #[test]
    fn test_eviction_count_rounds_up() {
        let governor = GovernorConfig::default();
        assert_eq!(governor.eviction_count(0), 0);
        assert_eq!(governor.eviction_count(1), 1);
        assert_eq!(governor.eviction_count(5), 1);
        assert_eq!(governor.eviction_count(6), 2);
        assert_eq!(governor.eviction_count(7), 2);
        assert_eq!(governor.eviction_count(10), 2);
        assert_eq!(governor.eviction_count(11), 3);

        let all = GovernorConfig { eviction_fraction: 1.0, ..Default::default() };
        assert_eq!(all.eviction_count(4), 4);
    }

    #[tokio::test]
    async fn test_sweep_over_ceiling_evicts_oldest_fifth() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network).await;
        fill(&manager, Category::Images, 7, TEN_MB).await;

        let report = manager.sweep(Category::Images).await.unwrap();

        assert_eq!(report.entries, 7);
        assert_eq!(report.total_bytes, 7 * 10_485_760);
        assert_eq!(report.evicted, 2);

        let remaining = manager.store().entry_urls(&manager.bucket_name(Category::Images)).await.unwrap();
        assert_eq!(remaining.len(), 5);
        assert!(remaining[0].ends_with("shot-2.png"));
    }

    #[tokio::test]
    async fn test_sweep_under_ceiling_keeps_everything() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network).await;
        fill(&manager, Category::Images, 5, TEN_MB).await;

        let report = manager.sweep(Category::Images).await.unwrap();

        assert_eq!(report.total_bytes, 50 * 1024 * 1024);
        assert_eq!(report.evicted, 0);
    }

    #[tokio::test]
    async fn test_entries_without_size_count_zero() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network).await;
        fill(&manager, Category::Fonts, 20, "unknown").await;

        let report = manager.sweep(Category::Fonts).await.unwrap();
        assert_eq!(report.total_bytes, 0);
        assert_eq!(report.evicted, 0);
    }

    #[tokio::test]
    async fn test_post_write_sweep() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(AppConfig { max_bucket_bytes: 10, ..config() }, network.clone()).await;

        for i in 0..3 {
            let request = super::super::tests::get(&format!("/PHTV/shot-{i}.png"));
            network.respond(request.url.as_str(), 200, &[("content-length", "6")], b"pixels");
            manager.handle_fetch(&request).await;
        }

        // Second write pushes the bucket to 12 bytes and evicts the first entry;
        // the third does the same to the second.
        let remaining = manager.store().entry_urls(&manager.bucket_name(Category::Images)).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert!(remaining[0].ends_with("shot-2.png"));
    }

    #[tokio::test]
    async fn test_sweep_all_only_existing_live_buckets() {
        let network = Arc::new(ScriptedFetcher::new());
        let manager = manager_with(config(), network).await;
        fill(&manager, Category::Images, 1, "10").await;
        manager.store().open_bucket("phtv-images-v4").await.unwrap();

        let reports = manager.sweep_all().await.unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].bucket, "phtv-images-v5");
    }
}
