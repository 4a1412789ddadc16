//! Messages exchanged with controlled clients.

use serde::{Deserialize, Serialize};

/// Inbound client message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientMessage {
    /// Take over immediately instead of waiting for old clients to close.
    SkipWaiting,
    #[serde(other)]
    Unknown,
}

/// Broadcast to every controlled client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Broadcast {
    SwUpdated { version: String, message: String },
}

impl Broadcast {
    pub fn updated(version: &str) -> Self {
        Broadcast::SwUpdated {
            version: version.to_string(),
            message: format!("Updated to {version}. Reload to use the new version."),
        }
    }
}
