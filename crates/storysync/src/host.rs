//! Host platform adapters for running the engine as a standalone process.
//!
//! A headless host has no windows and no system notification tray, so
//! notifications are written to the log and window requests are logged and
//! dropped. The push service hands out the subscription configured in
//! `config.json` and remembers whether it is active across runs.

use std::path::PathBuf;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use storysync_core::models::{NotificationPayload, PushSubscriptionRecord};
use storysync_core::{Clients, Notifier, PlatformError, PushService, WindowClient};

/// Push state file name in the data directory
pub const PUSH_STATE_FILE: &str = "push.json";

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn show(&self, notification: &NotificationPayload) -> Result<(), PlatformError> {
        info!(
            title = %notification.title,
            body = %notification.body,
            target = notification.target.as_deref().unwrap_or(""),
            tag = notification.tag.as_deref().unwrap_or(""),
            "Notification"
        );
        Ok(())
    }

    async fn close(&self, notification: &NotificationPayload) -> Result<(), PlatformError> {
        debug!(title = %notification.title, "Notification closed");
        Ok(())
    }
}

pub struct HeadlessClients;

#[async_trait]
impl Clients for HeadlessClients {
    async fn match_all(&self, _include_uncontrolled: bool) -> Result<Vec<WindowClient>, PlatformError> {
        Ok(Vec::new())
    }

    async fn focus(&self, id: &str) -> Result<(), PlatformError> {
        Err(PlatformError::new(format!("no window {}", id)))
    }

    async fn open_window(&self, url: &str) -> Result<Option<WindowClient>, PlatformError> {
        info!(url, "Window requested");
        Ok(None)
    }

    async fn claim(&self) -> Result<(), PlatformError> {
        Ok(())
    }

    async fn skip_waiting(&self) -> Result<(), PlatformError> {
        debug!("Skip waiting requested");
        Ok(())
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct PushState {
    active: bool,
}

pub struct ConfiguredPushService {
    configured: Option<PushSubscriptionRecord>,
    state_path: PathBuf,
}

impl ConfiguredPushService {
    pub fn new(configured: Option<PushSubscriptionRecord>, state_path: PathBuf) -> Self {
        Self {
            configured,
            state_path,
        }
    }

    fn load(&self) -> Result<PushState, PlatformError> {
        if !self.state_path.exists() {
            return Ok(PushState::default());
        }
        let contents = std::fs::read_to_string(&self.state_path)
            .map_err(|e| PlatformError::new(format!("Failed to read push state: {}", e)))?;
        serde_json::from_str(&contents)
            .map_err(|e| PlatformError::new(format!("Failed to parse push state: {}", e)))
    }

    fn save(&self, state: &PushState) -> Result<(), PlatformError> {
        if let Some(parent) = self.state_path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| PlatformError::new(format!("Failed to create data directory: {}", e)))?;
        }
        let contents = serde_json::to_string_pretty(state)
            .map_err(|e| PlatformError::new(e.to_string()))?;
        std::fs::write(&self.state_path, contents)
            .map_err(|e| PlatformError::new(format!("Failed to write push state: {}", e)))
    }
}

#[async_trait]
impl PushService for ConfiguredPushService {
    async fn get_subscription(&self) -> Result<Option<PushSubscriptionRecord>, PlatformError> {
        if self.load()?.active {
            Ok(self.configured.clone())
        } else {
            Ok(None)
        }
    }

    async fn subscribe(
        &self,
        application_server_key: &[u8],
    ) -> Result<PushSubscriptionRecord, PlatformError> {
        let record = self
            .configured
            .clone()
            .ok_or_else(|| PlatformError::new("No push subscription configured for this host"))?;
        self.save(&PushState { active: true })?;
        debug!(key_bytes = application_server_key.len(), endpoint = %record.endpoint, "Push subscription activated");
        Ok(record)
    }

    async fn unsubscribe(&self) -> Result<bool, PlatformError> {
        let was_active = self.load()?.active;
        self.save(&PushState { active: false })?;
        Ok(was_active && self.configured.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use storysync_core::models::SubscriptionKeys;
    use tempfile::TempDir;

    fn record() -> PushSubscriptionRecord {
        PushSubscriptionRecord {
            endpoint: "https://push.example.test/send/abc".to_string(),
            keys: SubscriptionKeys {
                p256dh: "p256".to_string(),
                auth: "auth".to_string(),
            },
        }
    }

    #[tokio::test]
    async fn test_configured_push_lifecycle_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state").join(PUSH_STATE_FILE);
        let service = ConfiguredPushService::new(Some(record()), path.clone());

        assert!(service.get_subscription().await.unwrap().is_none());
        assert_eq!(service.subscribe(&[4, 1, 2]).await.unwrap(), record());

        let reopened = ConfiguredPushService::new(Some(record()), path);
        assert_eq!(reopened.get_subscription().await.unwrap(), Some(record()));
        assert!(reopened.unsubscribe().await.unwrap());
        assert!(reopened.get_subscription().await.unwrap().is_none());
        assert!(!reopened.unsubscribe().await.unwrap());
    }

    #[tokio::test]
    async fn test_unconfigured_push_rejects_subscribe() {
        let dir = TempDir::new().unwrap();
        let service = ConfiguredPushService::new(None, dir.path().join(PUSH_STATE_FILE));
        let err = service.subscribe(&[4]).await.unwrap_err();
        assert!(err.0.contains("No push subscription configured"));
    }

    #[tokio::test]
    async fn test_headless_clients_have_no_windows() {
        let clients = HeadlessClients;
        assert!(clients.match_all(true).await.unwrap().is_empty());
        assert!(clients.open_window("/#/").await.unwrap().is_none());
        assert!(clients.focus("w1").await.is_err());
        assert!(clients.skip_waiting().await.is_ok());
    }
}
