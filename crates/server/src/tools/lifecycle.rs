//! cache_install, cache_activate and cache_message tool implementations.

use edge_cache_client::{ActivateReport, CacheManager, InstallReport, MessageOutcome};
use edge_cache_core::ClientMessage;
use rmcp::{ErrorData as McpError, model::CallToolResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::json_result;
use crate::error::ToolError;

/// Parameters for the cache_message tool.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CacheMessageParams {
    /// Client message, e.g. `{"type": "SKIP_WAITING"}`.
    pub message: serde_json::Value,
}

pub async fn install_output(manager: &CacheManager) -> Result<InstallReport, McpError> {
    Ok(manager.handle_install().await?)
}

pub async fn activate_output(manager: &CacheManager) -> Result<ActivateReport, McpError> {
    Ok(manager.handle_activate().await?)
}

pub async fn message_output(manager: &CacheManager, params: CacheMessageParams) -> Result<MessageOutcome, McpError> {
    let message: ClientMessage = serde_json::from_value(params.message)
        .map_err(|e| ToolError::InvalidInput(format!("malformed client message: {e}")))?;
    Ok(manager.handle_message(message).await?)
}

/// Implementation of the cache_install tool.
pub async fn install_impl(manager: &CacheManager) -> Result<CallToolResult, McpError> {
    json_result(&install_output(manager).await?)
}

/// Implementation of the cache_activate tool.
pub async fn activate_impl(manager: &CacheManager) -> Result<CallToolResult, McpError> {
    json_result(&activate_output(manager).await?)
}

/// Implementation of the cache_message tool.
pub async fn message_impl(manager: &CacheManager, params: CacheMessageParams) -> Result<CallToolResult, McpError> {
    json_result(&message_output(manager, params).await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::testing::{CannedFetcher, ROOT, manager};
    use rmcp::model::ErrorCode;
    use serde_json::json;

    #[tokio::test]
    async fn test_install_then_activate() {
        let manager = manager(CannedFetcher::default().with(ROOT, "<html>")).await;
        manager.store().open_bucket("phtv-runtime-v4").await.unwrap();

        let installed = install_output(&manager).await.unwrap();
        assert_eq!(installed.warmed, vec![ROOT.to_string()]);

        let activated = activate_output(&manager).await.unwrap();
        assert_eq!(activated.deleted, vec!["phtv-runtime-v4".to_string()]);
    }

    #[tokio::test]
    async fn test_activate_before_install_is_lifecycle_error() {
        let manager = manager(CannedFetcher::default()).await;
        let err = activate_output(&manager).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32004));
    }

    #[tokio::test]
    async fn test_skip_waiting_message() {
        let manager = manager(CannedFetcher::default()).await;
        install_output(&manager).await.unwrap();

        let params = CacheMessageParams { message: json!({"type": "SKIP_WAITING"}) };
        let outcome = message_output(&manager, params).await.unwrap();
        assert!(matches!(outcome, MessageOutcome::Activated(_)));
    }

    #[tokio::test]
    async fn test_unknown_message_ignored() {
        let manager = manager(CannedFetcher::default()).await;
        let params = CacheMessageParams { message: json!({"type": "PING"}) };
        assert_eq!(message_output(&manager, params).await.unwrap(), MessageOutcome::Ignored);
    }

    #[tokio::test]
    async fn test_message_without_type_rejected() {
        let manager = manager(CannedFetcher::default()).await;
        let params = CacheMessageParams { message: json!("SKIP_WAITING") };
        let err = message_output(&manager, params).await.unwrap_err();
        assert_eq!(err.code, ErrorCode(-32602));
    }

    #[tokio::test]
    async fn test_impls_render_json() {
        let manager = manager(CannedFetcher::default()).await;
        assert!(install_impl(&manager).await.is_ok());
        assert!(activate_impl(&manager).await.is_ok());
        let params = CacheMessageParams { message: json!({"type": "SKIP_WAITING"}) };
        assert!(message_impl(&manager, params).await.is_ok());
    }
}
