//! Version lifecycle.
//!
//! ```text
//! Parsed -> Installing -> Installed (waiting) -> Activating -> Activated
//! ```
//!
//! Install warms the precache bucket. Activate deletes every bucket carrying
//! the prefix but another version tag, then claims clients with a
//! `SW_UPDATED` broadcast. Stale buckets are only ever retired here.

use edge_cache_core::{Broadcast, CacheRequest, Category, ClientMessage, Error};
use serde::Serialize;

use super::CacheManager;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleState {
    Parsed,
    Installing,
    /// Installed and waiting to take over.
    Installed,
    Activating,
    Activated,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct InstallReport {
    pub version: String,
    pub bucket: String,
    pub warmed: Vec<String>,
    pub failed: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActivateReport {
    pub version: String,
    pub deleted: Vec<String>,
    /// Clients that received the update broadcast.
    pub notified: usize,
    /// The version was already active; nothing was done.
    pub already_active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome")]
pub enum MessageOutcome {
    Activated(ActivateReport),
    AlreadyActive,
    /// Nothing is waiting: install has not completed.
    NotWaiting,
    Ignored,
}

impl CacheManager {
    pub async fn state(&self) -> LifecycleState {
        *self.state.lock().await
    }

    /// Open the precache bucket and warm it with the precache URLs.
    ///
    /// Warm failures are logged and reported; they do not fail the install.
    pub async fn handle_install(&self) -> Result<InstallReport, Error> {
        let mut state = self.state.lock().await;
        let previous = *state;
        if previous != LifecycleState::Activated {
            *state = LifecycleState::Installing;
        }

        let bucket = self.namer.name(Category::Precache);
        tracing::info!(version = self.version(), bucket = %bucket, "installing");

        if let Err(e) = self.store.open_bucket(&bucket).await {
            *state = previous;
            return Err(e);
        }

        let mut warmed = Vec::new();
        let mut failed = Vec::new();
        for url in &self.precache {
            match self.warm(&bucket, url).await {
                Ok(()) => warmed.push(url.to_string()),
                Err(reason) => {
                    tracing::warn!(url = %url, reason = %reason, "failed to precache");
                    failed.push(url.to_string());
                }
            }
        }

        if previous != LifecycleState::Activated {
            *state = LifecycleState::Installed;
        }
        tracing::info!(warmed = warmed.len(), failed = failed.len(), "install complete");

        Ok(InstallReport { version: self.version().to_string(), bucket, warmed, failed })
    }

    async fn warm(&self, bucket: &str, url: &url::Url) -> Result<(), String> {
        let response = self
            .fetcher
            .fetch(&CacheRequest::get(url.clone()))
            .await
            .map_err(|e| e.to_string())?;
        if !response.is_ok() {
            return Err(format!("status {}", response.status));
        }
        self.store
            .put(bucket, url.as_str(), &response)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string())
    }

    /// Retire buckets from other versions and claim clients.
    ///
    /// Running it again for an active version is a no-op.
    pub async fn handle_activate(&self) -> Result<ActivateReport, Error> {
        let mut state = self.state.lock().await;
        match *state {
            LifecycleState::Parsed | LifecycleState::Installing => {
                return Err(Error::Lifecycle(format!("cannot activate {}: install has not completed", self.version())));
            }
            LifecycleState::Activated => {
                tracing::debug!(version = self.version(), "already active");
                return Ok(ActivateReport {
                    version: self.version().to_string(),
                    deleted: Vec::new(),
                    notified: 0,
                    already_active: true,
                });
            }
            LifecycleState::Installed | LifecycleState::Activating => {}
        }

        *state = LifecycleState::Activating;
        let deleted = match self.delete_stale_buckets().await {
            Ok(deleted) => deleted,
            Err(e) => {
                *state = LifecycleState::Installed;
                return Err(e);
            }
        };
        *state = LifecycleState::Activated;

        let notified = self.broadcasts.send(Broadcast::updated(self.version())).unwrap_or(0);
        tracing::info!(version = self.version(), deleted = deleted.len(), notified, "activated");

        Ok(ActivateReport { version: self.version().to_string(), deleted, notified, already_active: false })
    }

    async fn delete_stale_buckets(&self) -> Result<Vec<String>, Error> {
        let mut deleted = Vec::new();
        for name in self.store.bucket_names().await? {
            if self.namer.is_stale(&name) {
                self.store.delete_bucket(&name).await?;
                tracing::info!(bucket = %name, "deleted stale bucket");
                deleted.push(name);
            }
        }
        Ok(deleted)
    }

    /// Handle a message posted by a client.
    pub async fn handle_message(&self, message: ClientMessage) -> Result<MessageOutcome, Error> {
        match message {
            ClientMessage::SkipWaiting => match self.state().await {
                LifecycleState::Installed => {
                    // Another activation may complete between the state read and this call.
                    let report = self.handle_activate().await?;
                    if report.already_active {
                        Ok(MessageOutcome::AlreadyActive)
                    } else {
                        Ok(MessageOutcome::Activated(report))
                    }
                }
                LifecycleState::Activating | LifecycleState::Activated => Ok(MessageOutcome::AlreadyActive),
                LifecycleState::Parsed | LifecycleState::Installing => Ok(MessageOutcome::NotWaiting),
            },
            ClientMessage::Unknown => {
                tracing::debug!("ignoring unknown client message");
                Ok(MessageOutcome::Ignored)
            }
        }
    }
}
