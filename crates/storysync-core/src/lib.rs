//! Offline sync and cache-coordination engine for the Story App client.
//!
//! The engine runs in a background context independent of any visible page.
//! It owns:
//!
//! - `cache`: the shell/data cache stores and the per-origin resolution strategies
//! - `outbox`: the durable queue of stories that could not reach the network
//! - `sync`: replay of the outbox against the remote API
//! - `push`: the push subscription lifecycle
//! - `notify`: inbound push display and notification click handling
//! - `engine`: the command router that foreground contexts talk to
//! - `events`: engine → foreground event broadcast
//!
//! Platform capabilities (network, push service, client windows, notification
//! display) are reached through traits so a host can plug in its own.

pub mod api;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod models;
pub mod notify;
pub mod outbox;
pub mod push;
pub mod sync;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, ApiError, RemoteApi, StorySubmission};
pub use cache::{CacheStorage, ContentCache, InstallReport, Strategy};
pub use config::Config;
pub use engine::{Engine, Lifecycle, PendingWork, Platform};
pub use error::{
    CacheError, EngineError, PayloadDecodeError, PlatformError, StoreError, SubscriptionError,
};
pub use events::EventBus;
pub use notify::{ClickOutcome, Clients, Notifier, WindowClient};
pub use outbox::OutboxStore;
pub use push::{PushService, PushSubscriptionManager, SubscriptionState};
pub use sync::{DrainReport, SyncCoordinator, SYNC_TAG};
