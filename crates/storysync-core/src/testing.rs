//! Simulated platform and remote API for tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::api::{ApiError, RemoteApi, StorySubmission};
use crate::error::PlatformError;
use crate::models::{HttpRequest, HttpResponse, NotificationPayload, PushSubscriptionRecord, SubscriptionKeys};
use crate::notify::{Clients, Notifier, WindowClient};
use crate::push::PushService;

pub fn record(endpoint: &str) -> PushSubscriptionRecord {
    PushSubscriptionRecord {
        endpoint: endpoint.to_string(),
        keys: SubscriptionKeys {
            p256dh: "BNcRdreALRFXTkOOUHK1EtK2wtaz5Ry4YfYCA_0QTpQtUbVlUls0VJXg7A8u-Ts1XbjhazAkj7I99e8QcYP7DkM".to_string(),
            auth: "tBHItJI5svbpez7KI4CCXg".to_string(),
        },
    }
}

/// Remote API answering from a URL → response table. Unknown URLs get 404.
pub struct MockRemote {
    online: AtomicBool,
    responses: Mutex<HashMap<String, HttpResponse>>,
    fetches: Mutex<Vec<String>>,
    submissions: Mutex<Vec<StorySubmission>>,
    rejected_stories: Mutex<HashMap<String, u16>>,
    register_status: Mutex<u16>,
    deregister_status: Mutex<u16>,
    registrations: Mutex<Vec<(String, PushSubscriptionRecord)>>,
    deregistrations: Mutex<Vec<(String, String)>>,
}

impl MockRemote {
    pub fn new() -> Self {
        Self {
            online: AtomicBool::new(true),
            responses: Mutex::new(HashMap::new()),
            fetches: Mutex::new(Vec::new()),
            submissions: Mutex::new(Vec::new()),
            rejected_stories: Mutex::new(HashMap::new()),
            register_status: Mutex::new(201),
            deregister_status: Mutex::new(200),
            registrations: Mutex::new(Vec::new()),
            deregistrations: Mutex::new(Vec::new()),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn set_response(&self, url: &str, response: HttpResponse) {
        self.responses.lock().unwrap().insert(url.to_string(), response);
    }

    pub fn fetched_urls(&self) -> Vec<String> {
        self.fetches.lock().unwrap().clone()
    }

    pub fn clear_fetches(&self) {
        self.fetches.lock().unwrap().clear();
    }

    pub fn submissions(&self) -> Vec<StorySubmission> {
        self.submissions.lock().unwrap().clone()
    }

    /// Answer submissions with this description with `status`.
    pub fn reject_story(&self, description: &str, status: u16) {
        self.rejected_stories
            .lock()
            .unwrap()
            .insert(description.to_string(), status);
    }

    pub fn set_register_status(&self, status: u16) {
        *self.register_status.lock().unwrap() = status;
    }

    pub fn set_deregister_status(&self, status: u16) {
        *self.deregister_status.lock().unwrap() = status;
    }

    pub fn registrations(&self) -> Vec<(String, PushSubscriptionRecord)> {
        self.registrations.lock().unwrap().clone()
    }

    pub fn deregistrations(&self) -> Vec<(String, String)> {
        self.deregistrations.lock().unwrap().clone()
    }

    fn check_online(&self) -> Result<(), ApiError> {
        if self.online.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ApiError::Unreachable("simulated offline".to_string()))
        }
    }

    fn check_status(status: u16) -> Result<(), ApiError> {
        if (200..300).contains(&status) {
            Ok(())
        } else {
            Err(ApiError::from_status(status, "simulated rejection"))
        }
    }
}

#[async_trait]
impl RemoteApi for MockRemote {
    async fn fetch(&self, request: &HttpRequest) -> Result<HttpResponse, ApiError> {
        self.check_online()?;
        self.fetches.lock().unwrap().push(request.url.clone());
        Ok(self
            .responses
            .lock()
            .unwrap()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(HttpResponse::not_found))
    }

    async fn submit_story(&self, story: &StorySubmission) -> Result<(), ApiError> {
        self.check_online()?;
        let rejected = story
            .description
            .as_ref()
            .and_then(|d| self.rejected_stories.lock().unwrap().get(d).copied());
        if let Some(status) = rejected {
            return Self::check_status(status);
        }
        self.submissions.lock().unwrap().push(story.clone());
        Ok(())
    }

    async fn register_push(
        &self,
        token: &str,
        subscription: &PushSubscriptionRecord,
    ) -> Result<(), ApiError> {
        self.check_online()?;
        Self::check_status(*self.register_status.lock().unwrap())?;
        self.registrations
            .lock()
            .unwrap()
            .push((token.to_string(), subscription.clone()));
        Ok(())
    }

    async fn deregister_push(&self, token: &str, endpoint: &str) -> Result<(), ApiError> {
        self.check_online()?;
        Self::check_status(*self.deregister_status.lock().unwrap())?;
        self.deregistrations
            .lock()
            .unwrap()
            .push((token.to_string(), endpoint.to_string()));
        Ok(())
    }
}

/// Platform push service holding at most one subscription.
#[derive(Default)]
pub struct MockPushService {
    current: Mutex<Option<PushSubscriptionRecord>>,
    subscribe_calls: AtomicUsize,
    unsubscribe_calls: AtomicUsize,
    last_key: Mutex<Option<Vec<u8>>>,
    reject_subscribe: Mutex<Option<String>>,
    reject_unsubscribe: Mutex<Option<String>>,
}

impl MockPushService {
    pub fn with_subscription(record: PushSubscriptionRecord) -> Self {
        let service = Self::default();
        *service.current.lock().unwrap() = Some(record);
        service
    }

    pub fn current(&self) -> Option<PushSubscriptionRecord> {
        self.current.lock().unwrap().clone()
    }

    pub fn subscribe_calls(&self) -> usize {
        self.subscribe_calls.load(Ordering::SeqCst)
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.unsubscribe_calls.load(Ordering::SeqCst)
    }

    pub fn last_key(&self) -> Option<Vec<u8>> {
        self.last_key.lock().unwrap().clone()
    }

    pub fn reject_subscribe(&self, reason: &str) {
        *self.reject_subscribe.lock().unwrap() = Some(reason.to_string());
    }

    pub fn reject_unsubscribe(&self, reason: &str) {
        *self.reject_unsubscribe.lock().unwrap() = Some(reason.to_string());
    }
}

#[async_trait]
impl PushService for MockPushService {
    async fn get_subscription(&self) -> Result<Option<PushSubscriptionRecord>, PlatformError> {
        Ok(self.current())
    }

    async fn subscribe(
        &self,
        application_server_key: &[u8],
    ) -> Result<PushSubscriptionRecord, PlatformError> {
        self.subscribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.reject_subscribe.lock().unwrap().clone() {
            return Err(PlatformError(reason));
        }
        *self.last_key.lock().unwrap() = Some(application_server_key.to_vec());
        let created = record(&format!(
            "https://push.example.test/send/{}",
            self.subscribe_calls()
        ));
        *self.current.lock().unwrap() = Some(created.clone());
        Ok(created)
    }

    async fn unsubscribe(&self) -> Result<bool, PlatformError> {
        self.unsubscribe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(reason) = self.reject_unsubscribe.lock().unwrap().clone() {
            return Err(PlatformError(reason));
        }
        Ok(self.current.lock().unwrap().take().is_some())
    }
}

#[derive(Default)]
pub struct RecordingClients {
    windows: Mutex<Vec<WindowClient>>,
    focused: Mutex<Vec<String>>,
    opened: Mutex<Vec<String>>,
    claims: AtomicUsize,
    skip_waits: AtomicUsize,
    fail_claim: AtomicBool,
}

impl RecordingClients {
    pub fn with_windows(windows: Vec<WindowClient>) -> Self {
        let clients = Self::default();
        *clients.windows.lock().unwrap() = windows;
        clients
    }

    pub fn focused(&self) -> Vec<String> {
        self.focused.lock().unwrap().clone()
    }

    pub fn opened(&self) -> Vec<String> {
        self.opened.lock().unwrap().clone()
    }

    pub fn claims(&self) -> usize {
        self.claims.load(Ordering::SeqCst)
    }

    pub fn skip_waits(&self) -> usize {
        self.skip_waits.load(Ordering::SeqCst)
    }

    pub fn reject_claim(&self, reject: bool) {
        self.fail_claim.store(reject, Ordering::SeqCst);
    }
}

#[async_trait]
impl Clients for RecordingClients {
    async fn match_all(&self, include_uncontrolled: bool) -> Result<Vec<WindowClient>, PlatformError> {
        Ok(self
            .windows
            .lock()
            .unwrap()
            .iter()
            .filter(|w| include_uncontrolled || w.controlled)
            .cloned()
            .collect())
    }

    async fn focus(&self, id: &str) -> Result<(), PlatformError> {
        self.focused.lock().unwrap().push(id.to_string());
        Ok(())
    }

    async fn open_window(&self, url: &str) -> Result<Option<WindowClient>, PlatformError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(None)
    }

    async fn claim(&self) -> Result<(), PlatformError> {
        if self.fail_claim.load(Ordering::SeqCst) {
            return Err(PlatformError::new("claim rejected"));
        }
        self.claims.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn skip_waiting(&self) -> Result<(), PlatformError> {
        self.skip_waits.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    shown: Mutex<Vec<NotificationPayload>>,
    closed: Mutex<Vec<NotificationPayload>>,
    fail_close: AtomicBool,
}

impl RecordingNotifier {
    pub fn reject_close(&self, reject: bool) {
        self.fail_close.store(reject, Ordering::SeqCst);
    }

    pub fn shown(&self) -> Vec<NotificationPayload> {
        self.shown.lock().unwrap().clone()
    }

    pub fn closed(&self) -> Vec<NotificationPayload> {
        self.closed.lock().unwrap().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn show(&self, notification: &NotificationPayload) -> Result<(), PlatformError> {
        self.shown.lock().unwrap().push(notification.clone());
        Ok(())
    }

    async fn close(&self, notification: &NotificationPayload) -> Result<(), PlatformError> {
        if self.fail_close.load(Ordering::SeqCst) {
            return Err(PlatformError::new("close rejected"));
        }
        self.closed.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
