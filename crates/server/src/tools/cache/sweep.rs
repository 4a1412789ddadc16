//! cache_sweep tool implementation.
//!
//! Runs the size governor over one live bucket or all of them.

use edge_cache_client::{CacheManager, SweepReport};
use edge_cache_core::Category;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::tools::json_result;

/// Parameters for the cache_sweep tool.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct CacheSweepParams {
    /// Sweep only this category's bucket. All live buckets when omitted.
    #[serde(default)]
    pub category: Option<Category>,
}

/// Output from the cache_sweep tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheSweepOutput {
    pub reports: Vec<SweepReport>,
    /// Entries evicted across all swept buckets.
    pub evicted: u64,
}

pub async fn sweep_output(manager: &CacheManager, params: CacheSweepParams) -> Result<CacheSweepOutput, McpError> {
    let reports = match params.category {
        Some(category) => vec![manager.sweep(category).await?],
        None => manager.sweep_all().await?,
    };
    let evicted = reports.iter().map(|r| r.evicted).sum();

    Ok(CacheSweepOutput { reports, evicted })
}

/// Implementation of the cache_sweep tool.
pub async fn sweep_impl(manager: &CacheManager, params: CacheSweepParams) -> Result<CallToolResult, McpError> {
    json_result(&sweep_output(manager, params).await?)
}
