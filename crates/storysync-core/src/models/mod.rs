//! Data models for the sync engine.
//!
//! - `HttpRequest`, `HttpResponse`: requests intercepted by the engine and the
//!   responses it captures into cache stores
//! - `NewStory`, `OutboxItem`, `PhotoBlob`: queued story submissions
//! - `PushSubscriptionRecord`: the installation's push subscription
//! - `NotificationPayload`: a notification ready for display
//! - `Command`, `EngineEvent`: the foreground message channel

pub mod http;
pub mod message;
pub mod notification;
pub mod outbox;
pub mod push;

pub use http::{HttpRequest, HttpResponse};
pub use message::{Command, EngineEvent, StorySuccess, SubscribeRequest, UnsubscribeRequest};
pub use notification::{NotificationAction, NotificationPayload};
pub use outbox::{Attachment, NewStory, OutboxItem, PhotoBlob};
pub use push::{PushSubscriptionRecord, SubscriptionKeys};
