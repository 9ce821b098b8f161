//! Command router and lifecycle event handlers.
//!
//! `Engine` owns one explicit state record (cache, outbox, sync and push
//! state, platform handles) and exposes one async handler per event kind:
//! install, activate, fetch, message, push, notification click and sync.
//!
//! Message handlers are spawned so a handler that suspends on I/O does not
//! hold up the next message. Each returns a [`PendingWork`] handle that the
//! host awaits before it considers the message settled.

use std::sync::{Arc, Mutex};

use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::api::RemoteApi;
use crate::cache::{CacheStorage, ContentCache, InstallReport};
use crate::config::Config;
use crate::error::EngineError;
use crate::events::EventBus;
use crate::models::{Command, EngineEvent, HttpRequest, HttpResponse, NotificationPayload};
use crate::notify::{self, ClickOutcome, Clients, Notifier};
use crate::outbox::OutboxStore;
use crate::push::{PushService, PushSubscriptionManager, SubscriptionState};
use crate::sync::{DrainReport, SyncCoordinator, SYNC_TAG};

/// Host platform capabilities handed to the engine.
#[derive(Clone)]
pub struct Platform {
    pub push: Arc<dyn PushService>,
    pub clients: Arc<dyn Clients>,
    pub notifier: Arc<dyn Notifier>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lifecycle {
    Parsed,
    Installing,
    Installed,
    Activating,
    Activated,
}

/// Completion handle for a dispatched message.
pub struct PendingWork {
    kind: &'static str,
    handle: JoinHandle<Result<(), EngineError>>,
}

impl PendingWork {
    pub fn kind(&self) -> &'static str {
        self.kind
    }

    /// Wait for the handler to finish.
    pub async fn settle(self) -> Result<(), EngineError> {
        self.handle.await?
    }
}

struct EngineState {
    cache: ContentCache,
    outbox: OutboxStore,
    sync: SyncCoordinator,
    push: PushSubscriptionManager,
    remote: Arc<dyn RemoteApi>,
    platform: Platform,
    events: EventBus,
    lifecycle: Mutex<Lifecycle>,
}

/// The background sync engine. Clone is cheap; clones share state.
#[derive(Clone)]
pub struct Engine {
    state: Arc<EngineState>,
}

impl Engine {
    pub fn new(
        cache: ContentCache,
        outbox: OutboxStore,
        remote: Arc<dyn RemoteApi>,
        platform: Platform,
    ) -> Self {
        Self {
            state: Arc::new(EngineState {
                cache,
                outbox,
                sync: SyncCoordinator::new(),
                push: PushSubscriptionManager::new(),
                remote,
                platform,
                events: EventBus::new(),
                lifecycle: Mutex::new(Lifecycle::Parsed),
            }),
        }
    }

    pub fn from_config(
        config: &Config,
        storage: CacheStorage,
        outbox: OutboxStore,
        remote: Arc<dyn RemoteApi>,
        platform: Platform,
    ) -> Result<Self, EngineError> {
        let cache = ContentCache::new(
            storage,
            config.shell_cache.clone(),
            config.data_cache.clone(),
            &config.api_base_url,
            &config.app_base_url,
            config.shell_assets.clone(),
        )?;
        Ok(Self::new(cache, outbox, remote, platform))
    }

    /// Receive every event broadcast from now on.
    pub fn events(&self) -> broadcast::Receiver<EngineEvent> {
        self.state.events.subscribe()
    }

    pub fn lifecycle(&self) -> Lifecycle {
        *self
            .state
            .lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn set_lifecycle(&self, next: Lifecycle) {
        debug!(?next, "Lifecycle transition");
        *self
            .state
            .lifecycle
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = next;
    }

    pub fn outbox(&self) -> &OutboxStore {
        &self.state.outbox
    }

    pub fn cache(&self) -> &ContentCache {
        &self.state.cache
    }

    pub fn subscription_state(&self) -> SubscriptionState {
        self.state.push.state()
    }

    /// Prime the shell store, then ask the platform to let this engine
    /// activate without waiting for clients to reload. Individual assets
    /// never fail installation. On error the previous lifecycle is restored.
    pub async fn on_install(&self) -> Result<InstallReport, EngineError> {
        let previous = self.lifecycle();
        self.set_lifecycle(Lifecycle::Installing);
        match self.install().await {
            Ok(report) => {
                self.set_lifecycle(Lifecycle::Installed);
                info!(cached = report.cached.len(), "Installed");
                Ok(report)
            }
            Err(e) => {
                self.set_lifecycle(previous);
                Err(e)
            }
        }
    }

    async fn install(&self) -> Result<InstallReport, EngineError> {
        let report = self.state.cache.prime(self.state.remote.as_ref()).await?;
        self.state.platform.clients.skip_waiting().await?;
        Ok(report)
    }

    /// Retire stale cache stores and take control of open clients.
    /// Returns the names of the stores removed. On error the previous
    /// lifecycle is restored.
    pub async fn on_activate(&self) -> Result<Vec<String>, EngineError> {
        let previous = self.lifecycle();
        self.set_lifecycle(Lifecycle::Activating);
        match self.activate().await {
            Ok(removed) => {
                self.set_lifecycle(Lifecycle::Activated);
                info!(removed = removed.len(), "Activated");
                Ok(removed)
            }
            Err(e) => {
                self.set_lifecycle(previous);
                Err(e)
            }
        }
    }

    async fn activate(&self) -> Result<Vec<String>, EngineError> {
        let removed = self.state.cache.purge_stale()?;
        self.state.platform.clients.claim().await?;
        Ok(removed)
    }

    pub async fn on_fetch(&self, request: &HttpRequest) -> HttpResponse {
        self.state
            .cache
            .resolve(self.state.remote.as_ref(), request)
            .await
    }

    /// Dispatch a foreground command. Messages are dispatched in arrival
    /// order but their handlers may interleave.
    pub fn on_message(&self, command: Command) -> PendingWork {
        let kind = command.kind();
        let state = Arc::clone(&self.state);
        debug!(command = kind, "Message received");
        PendingWork {
            kind,
            handle: tokio::spawn(async move { state.dispatch(command).await }),
        }
    }

    /// Display an inbound push message.
    pub async fn on_push(&self, data: Option<&[u8]>) -> Result<NotificationPayload, EngineError> {
        let notification = notify::decode_push_payload(data);
        self.state.platform.notifier.show(&notification).await?;
        Ok(notification)
    }

    pub async fn on_notification_click(
        &self,
        notification: &NotificationPayload,
    ) -> Result<ClickOutcome, EngineError> {
        let platform = &self.state.platform;
        Ok(notify::handle_click(platform.notifier.as_ref(), platform.clients.as_ref(), notification).await?)
    }

    /// Platform reconnectivity signal. Only the story sync tag drains the
    /// outbox; other tags are ignored.
    pub async fn on_sync(&self, tag: &str) -> Result<Option<DrainReport>, EngineError> {
        if tag != SYNC_TAG {
            debug!(tag, "Ignoring unknown sync tag");
            return Ok(None);
        }
        Ok(Some(self.state.drain().await?))
    }
}

impl EngineState {
    async fn drain(&self) -> Result<DrainReport, EngineError> {
        Ok(self
            .sync
            .drain_outbox(&self.outbox, self.remote.as_ref())
            .await?)
    }

    async fn dispatch(&self, command: Command) -> Result<(), EngineError> {
        let kind = command.kind();
        let result = self.handle(command).await;
        if let Err(ref e) = result {
            error!(command = kind, error = %e, "Command failed");
        }
        result
    }

    async fn handle(&self, command: Command) -> Result<(), EngineError> {
        match command {
            Command::QueueOfflineStory(story) => {
                self.outbox.add(&story)?;
            }
            Command::SyncOutbox => {
                self.drain().await?;
            }
            Command::StorySuccess(success) => {
                let notification = notify::story_success(&success.description);
                self.platform.notifier.show(&notification).await?;
            }
            // Push outcomes reach the foreground as events, not as errors.
            Command::SubscribePush(request) => {
                if let Err(e) = self
                    .push
                    .subscribe(
                        self.platform.push.as_ref(),
                        self.remote.as_ref(),
                        &self.events,
                        &request.token,
                        &request.vapid_key,
                    )
                    .await
                {
                    debug!(error = %e, "Subscribe reported to foreground");
                }
            }
            Command::UnsubscribePush(request) => {
                if let Err(e) = self
                    .push
                    .unsubscribe(
                        self.platform.push.as_ref(),
                        self.remote.as_ref(),
                        &self.events,
                        &request.token,
                    )
                    .await
                {
                    debug!(error = %e, "Unsubscribe reported to foreground");
                }
            }
        }
        Ok(())
    }
}
