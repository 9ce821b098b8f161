//! Push subscription lifecycle.
//!
//! States move `Unsubscribed → Subscribing → Subscribed` and
//! `Subscribed → Unsubscribing → Unsubscribed`. Outcomes are reported to
//! foreground contexts as [`crate::models::EngineEvent`]s.

pub mod key;
pub mod manager;
pub mod platform;

pub use key::decode_application_server_key;
pub use manager::{PushSubscriptionManager, SubscriptionState};
pub use platform::PushService;
