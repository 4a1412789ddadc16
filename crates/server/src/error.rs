//! Tool-level errors for the edge-cache server.
//!
//! Failures from the core crate already convert into `McpError`; these cover
//! what the tool layer itself rejects.

use edge_cache_client::UrlError;
use rmcp::model::{ErrorCode, ErrorData as McpError};

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    /// Invalid input parameters (e.g., an unknown message shape).
    #[error("INVALID_INPUT: {0}")]
    InvalidInput(String),

    /// The URL could not be resolved against the site origin.
    #[error("INVALID_URL: {0}")]
    InvalidUrl(#[from] UrlError),

    /// Output could not be serialized.
    #[error("SERIALIZE_FAILED: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl From<ToolError> for McpError {
    fn from(err: ToolError) -> Self {
        let (code, message) = match &err {
            ToolError::InvalidInput(msg) => (-32602, msg.clone()),
            ToolError::InvalidUrl(e) => (-32003, e.to_string()),
            ToolError::Serialize(e) => (-32603, e.to_string()),
        };

        McpError { code: ErrorCode(code), message: message.into(), data: None }
    }
}
