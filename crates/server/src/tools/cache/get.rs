//! cache_get tool implementation.
//!
//! Retrieves the stored entry for a URL from a live bucket.

use edge_cache_client::{CacheManager, resolve};
use edge_cache_core::{CacheEntry, Category, Error};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::error::ToolError;
use crate::tools::json_result;

/// Parameters for the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetParams {
    /// Bucket category: precache, runtime, images, fonts, api or cdn.
    pub category: Category,

    /// Absolute URL, or a path resolved against the site origin.
    pub url: String,
}

/// Output from the cache_get tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheGetOutput {
    /// The stored entry, without its body.
    pub entry: CacheEntry,
}

pub async fn get_output(manager: &CacheManager, params: CacheGetParams) -> Result<CacheGetOutput, McpError> {
    let url = resolve(&params.url, manager.origin()).map_err(ToolError::from)?;
    let entry = manager
        .entry(params.category, url.as_str())
        .await?
        .ok_or_else(|| Error::CacheMiss(url.to_string()))?;

    Ok(CacheGetOutput { entry })
}

/// Implementation of the cache_get tool.
pub async fn get_impl(manager: &CacheManager, params: CacheGetParams) -> Result<CallToolResult, McpError> {
    json_result(&get_output(manager, params).await?)
}
