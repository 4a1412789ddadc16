//! cache_stats tool implementation.

use edge_cache_client::{CacheManager, LifecycleState};
use edge_cache_core::{BucketUsage, Category};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use serde::Serialize;

use crate::tools::json_result;

/// Output from the cache_stats tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStatsOutput {
    pub version: String,
    pub state: LifecycleState,
    /// Every bucket in the store, including stale ones awaiting activation.
    pub buckets: Vec<BucketUsage>,
    pub total_entries: u64,
    pub total_bytes: u64,
    /// Max age in seconds of the categories that have one.
    pub max_age_secs: Vec<CategoryMaxAge>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CategoryMaxAge {
    pub category: Category,
    pub seconds: i64,
    /// False for the api max age, which cached fallbacks ignore.
    pub enforced: bool,
}

pub async fn stats_output(manager: &CacheManager) -> Result<CacheStatsOutput, McpError> {
    let buckets = manager.usage().await?;
    let total_entries = buckets.iter().map(|b| b.entries).sum();
    let total_bytes = buckets.iter().map(|b| b.total_bytes).sum();
    let ttl = manager.ttl_table();
    let max_age_secs = Category::ALL
        .into_iter()
        .filter_map(|category| {
            ttl.max_age(category).map(|age| CategoryMaxAge {
                category,
                seconds: age.num_seconds(),
                enforced: ttl.enforced_max_age(category).is_some(),
            })
        })
        .collect();

    Ok(CacheStatsOutput {
        version: manager.version().to_string(),
        state: manager.state().await,
        buckets,
        total_entries,
        total_bytes,
        max_age_secs,
    })
}

/// Implementation of the cache_stats tool.
pub async fn stats_impl(manager: &CacheManager) -> Result<CallToolResult, McpError> {
    json_result(&stats_output(manager).await?)
}
