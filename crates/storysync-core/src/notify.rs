//! Notification display and click handling.
//!
//! Inbound push payloads are decoded as JSON when possible and otherwise
//! shown as plain text. Clicking a notification focuses an open window at
//! its target, or opens one.

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::error::PlatformError;
use crate::models::{NotificationAction, NotificationPayload};

pub const DEFAULT_TITLE: &str = "Story App";
pub const DEFAULT_BODY: &str = "New stories are available.";
pub const DEFAULT_ICON: &str = "/icons/android-chrome-192x192.png";
pub const DEFAULT_TARGET: &str = "/#/";

/// Used when a clicked notification carries no target.
const FALLBACK_CLICK_TARGET: &str = "/";

const SUCCESS_TITLE: &str = "Story created";
const SUCCESS_TAG: &str = "story-success";

/// Shows notifications on behalf of the engine.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn show(&self, notification: &NotificationPayload) -> Result<(), PlatformError>;
    async fn close(&self, notification: &NotificationPayload) -> Result<(), PlatformError>;
}

/// An open window of the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowClient {
    pub id: String,
    pub url: String,
    /// Whether this engine instance currently controls the window.
    pub controlled: bool,
}

/// The host's view of open application windows.
#[async_trait]
pub trait Clients: Send + Sync {
    async fn match_all(&self, include_uncontrolled: bool) -> Result<Vec<WindowClient>, PlatformError>;
    async fn focus(&self, id: &str) -> Result<(), PlatformError>;
    async fn open_window(&self, url: &str) -> Result<Option<WindowClient>, PlatformError>;
    /// Take control of every open window without waiting for a reload.
    async fn claim(&self) -> Result<(), PlatformError>;
    /// Make a freshly installed engine eligible to activate without waiting
    /// for windows controlled by the previous one to close.
    async fn skip_waiting(&self) -> Result<(), PlatformError>;
}

/// What a notification click ended up doing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    Focused(String),
    Opened(String),
}

#[derive(Debug, Default)]
struct PushMessage {
    title: Option<String>,
    body: Option<String>,
    icon: Option<String>,
    badge: Option<String>,
    url: Option<String>,
    actions: Option<Vec<NotificationAction>>,
}

impl PushMessage {
    /// Read each field on its own. A field of the wrong type counts as absent.
    fn from_value(value: &Value) -> Self {
        Self {
            title: string_field(value, "title"),
            body: string_field(value, "body"),
            icon: string_field(value, "icon"),
            badge: string_field(value, "badge"),
            url: string_field(value, "url"),
            actions: value.get("actions").and_then(Value::as_array).map(|actions| {
                actions
                    .iter()
                    .filter_map(|a| {
                        Some(NotificationAction {
                            action: string_field(a, "action")?,
                            title: string_field(a, "title")?,
                        })
                    })
                    .collect()
            }),
        }
    }

    fn text(bytes: &[u8]) -> Self {
        Self {
            body: Some(String::from_utf8_lossy(bytes).into_owned()),
            ..Self::default()
        }
    }
}

fn string_field(value: &Value, name: &str) -> Option<String> {
    value.get(name).and_then(Value::as_str).map(str::to_string)
}

fn present(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Turn a raw push payload into a displayable notification.
pub fn decode_push_payload(data: Option<&[u8]>) -> NotificationPayload {
    let message = match data {
        None => PushMessage::default(),
        Some(bytes) => match serde_json::from_slice::<Value>(bytes) {
            Ok(value) => PushMessage::from_value(&value),
            Err(e) => {
                debug!(error = %e, "Push payload is not JSON, using it as text");
                PushMessage::text(bytes)
            }
        },
    };

    NotificationPayload {
        title: present(message.title).unwrap_or_else(|| DEFAULT_TITLE.to_string()),
        body: present(message.body).unwrap_or_else(|| DEFAULT_BODY.to_string()),
        icon: present(message.icon).unwrap_or_else(|| DEFAULT_ICON.to_string()),
        badge: present(message.badge).unwrap_or_else(|| DEFAULT_ICON.to_string()),
        target: Some(present(message.url).unwrap_or_else(|| DEFAULT_TARGET.to_string())),
        actions: message.actions.unwrap_or_else(default_actions),
        tag: None,
    }
}

fn default_actions() -> Vec<NotificationAction> {
    vec![NotificationAction {
        action: "open".to_string(),
        title: "Open".to_string(),
    }]
}

/// Fixed notification confirming a story submission.
pub fn story_success(description: &str) -> NotificationPayload {
    NotificationPayload {
        title: SUCCESS_TITLE.to_string(),
        body: format!("You created a new story: {}", description),
        icon: DEFAULT_ICON.to_string(),
        badge: DEFAULT_ICON.to_string(),
        target: None,
        actions: Vec::new(),
        tag: Some(SUCCESS_TAG.to_string()),
    }
}

/// Dismiss the clicked notification and bring its target into view.
pub async fn handle_click(
    notifier: &dyn Notifier,
    clients: &dyn Clients,
    notification: &NotificationPayload,
) -> Result<ClickOutcome, PlatformError> {
    if let Err(e) = notifier.close(notification).await {
        warn!(error = %e, "Failed to dismiss notification");
    }

    let target = notification
        .target
        .as_deref()
        .filter(|t| !t.is_empty())
        .unwrap_or(FALLBACK_CLICK_TARGET);

    let windows = clients.match_all(true).await?;
    if let Some(window) = windows.iter().find(|w| w.url.contains(target)) {
        clients.focus(&window.id).await?;
        debug!(window = %window.id, target, "Focused existing window");
        return Ok(ClickOutcome::Focused(window.id.clone()));
    }

    clients.open_window(target).await?;
    info!(target, "Opened new window for notification");
    Ok(ClickOutcome::Opened(target.to_string()))
}
