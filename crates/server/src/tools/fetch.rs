//! cache_fetch tool implementation.
//!
//! Runs a request through the interceptor as a controlled page would.

use std::collections::BTreeMap;

use edge_cache_client::{CacheManager, Interception, resolve};
use edge_cache_core::{CacheRequest, Route};
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Input parameters for the cache_fetch tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheFetchParams {
    /// Absolute URL, or a path resolved against the site origin.
    pub url: String,

    /// HTTP method (default: GET). Anything else bypasses the cache.
    #[serde(default = "default_method")]
    pub method: String,
}

fn default_method() -> String {
    "GET".into()
}

/// Output structure for the cache_fetch tool.
#[derive(Debug, Clone, Serialize)]
pub struct CacheFetchOutput {
    /// The resolved request URL.
    pub url: String,
    /// How the request was classified.
    pub route: Route,
    /// Live bucket a successful response is written to, if any.
    pub bucket: Option<String>,
    /// False when the request was passed through untouched.
    pub intercepted: bool,
    pub status: Option<u16>,
    pub headers: BTreeMap<String, String>,
    /// Body as text, when it is valid UTF-8.
    pub body: Option<String>,
    pub body_length: usize,
}

pub async fn fetch_output(manager: &CacheManager, params: CacheFetchParams) -> Result<CacheFetchOutput, McpError> {
    let url = resolve(&params.url, manager.origin()).map_err(ToolError::from)?;
    let request = CacheRequest::new(params.method, url);
    let route = manager.classify(&request);
    let bucket = route.bucket().map(|category| manager.bucket_name(category));

    let output = match manager.handle_fetch(&request).await {
        Interception::Bypass => CacheFetchOutput {
            url: request.url.to_string(),
            route,
            bucket,
            intercepted: false,
            status: None,
            headers: BTreeMap::new(),
            body: None,
            body_length: 0,
        },
        Interception::Respond(response) => CacheFetchOutput {
            url: request.url.to_string(),
            route,
            bucket,
            intercepted: true,
            status: Some(response.status),
            body: std::str::from_utf8(&response.body).ok().map(str::to_string),
            body_length: response.body.len(),
            headers: response.headers,
        },
    };

    Ok(output)
}

/// Implementation of the cache_fetch tool.
pub async fn fetch_impl(manager: &CacheManager, params: CacheFetchParams) -> Result<CallToolResult, McpError> {
    json_result(&fetch_output(manager, params).await?)
}
