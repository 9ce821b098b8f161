use std::sync::{Mutex, MutexGuard};

use tracing::{error, info};

use crate::api::RemoteApi;
use crate::error::SubscriptionError;
use crate::events::EventBus;
use crate::models::{EngineEvent, PushSubscriptionRecord};

use super::{decode_application_server_key, PushService};

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubscriptionState {
    #[default]
    Unsubscribed,
    Subscribing,
    Subscribed(PushSubscriptionRecord),
    Unsubscribing,
}

/// Drives subscribe/unsubscribe against the platform push service and the
/// remote notification endpoint.
#[derive(Debug, Default)]
pub struct PushSubscriptionManager {
    state: Mutex<SubscriptionState>,
}

impl PushSubscriptionManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SubscriptionState {
        self.lock().clone()
    }

    fn set_state(&self, next: SubscriptionState) {
        *self.lock() = next;
    }

    fn lock(&self) -> MutexGuard<'_, SubscriptionState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Enter `Subscribing`. `Some` means already subscribed to that record.
    fn begin_subscribe(&self) -> Result<Option<PushSubscriptionRecord>, SubscriptionError> {
        let mut state = self.lock();
        match &*state {
            SubscriptionState::Subscribed(record) => Ok(Some(record.clone())),
            SubscriptionState::Subscribing | SubscriptionState::Unsubscribing => {
                Err(SubscriptionError::InProgress)
            }
            SubscriptionState::Unsubscribed => {
                *state = SubscriptionState::Subscribing;
                Ok(None)
            }
        }
    }

    /// Enter `Unsubscribing`, returning the state to restore on failure.
    fn begin_unsubscribe(&self) -> Result<SubscriptionState, SubscriptionError> {
        let mut state = self.lock();
        match &*state {
            SubscriptionState::Subscribing | SubscriptionState::Unsubscribing => {
                Err(SubscriptionError::InProgress)
            }
            _ => Ok(std::mem::replace(
                &mut *state,
                SubscriptionState::Unsubscribing,
            )),
        }
    }

    /// Subscribe this installation and register it with the notification
    /// endpoint. Already subscribed resolves to the existing record without
    /// touching the platform. The outcome is broadcast on `events`.
    pub async fn subscribe(
        &self,
        push: &dyn PushService,
        remote: &dyn RemoteApi,
        events: &EventBus,
        token: &str,
        vapid_key: &str,
    ) -> Result<PushSubscriptionRecord, SubscriptionError> {
        let result = match self.begin_subscribe() {
            Ok(Some(existing)) => Ok(existing),
            Ok(None) => {
                let result = Self::register(push, remote, token, vapid_key).await;
                self.set_state(match &result {
                    Ok(record) => SubscriptionState::Subscribed(record.clone()),
                    Err(_) => SubscriptionState::Unsubscribed,
                });
                result
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(record) => {
                info!(endpoint = %record.endpoint, "Push subscription active");
                events.publish(EngineEvent::PushSubscribeSuccess);
            }
            Err(e) => {
                error!(error = %e, "Push subscribe failed");
                events.publish(EngineEvent::PushSubscribeError {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn register(
        push: &dyn PushService,
        remote: &dyn RemoteApi,
        token: &str,
        vapid_key: &str,
    ) -> Result<PushSubscriptionRecord, SubscriptionError> {
        let key = decode_application_server_key(vapid_key)?;
        let record = match push.get_subscription().await? {
            Some(existing) => existing,
            None => push.subscribe(&key).await?,
        };
        remote.register_push(token, &record).await?;
        Ok(record)
    }

    /// Deregister and cancel the platform subscription. With no platform
    /// subscription this succeeds without any calls. On failure the previous
    /// state is kept. The outcome is broadcast on `events`.
    pub async fn unsubscribe(
        &self,
        push: &dyn PushService,
        remote: &dyn RemoteApi,
        events: &EventBus,
        token: &str,
    ) -> Result<(), SubscriptionError> {
        let result = match self.begin_unsubscribe() {
            Ok(previous) => {
                let result = Self::deregister(push, remote, token).await;
                self.set_state(match result {
                    Ok(()) => SubscriptionState::Unsubscribed,
                    Err(_) => previous,
                });
                result
            }
            Err(e) => Err(e),
        };

        match &result {
            Ok(()) => {
                info!("Push subscription cancelled");
                events.publish(EngineEvent::PushUnsubscribeSuccess);
            }
            Err(e) => {
                error!(error = %e, "Push unsubscribe failed");
                events.publish(EngineEvent::PushUnsubscribeError {
                    error: e.to_string(),
                });
            }
        }
        result
    }

    async fn deregister(
        push: &dyn PushService,
        remote: &dyn RemoteApi,
        token: &str,
    ) -> Result<(), SubscriptionError> {
        let Some(record) = push.get_subscription().await? else {
            return Ok(());
        };
        remote.deregister_push(token, &record.endpoint).await?;
        push.unsubscribe().await?;
        Ok(())
    }
}
