use async_trait::async_trait;

use crate::error::PlatformError;
use crate::models::PushSubscriptionRecord;

/// The host platform's push service.
#[async_trait]
pub trait PushService: Send + Sync {
    /// The subscription currently held by this installation, if any.
    async fn get_subscription(&self) -> Result<Option<PushSubscriptionRecord>, PlatformError>;

    /// Create a user-visible subscription scoped to `application_server_key`.
    async fn subscribe(
        &self,
        application_server_key: &[u8],
    ) -> Result<PushSubscriptionRecord, PlatformError>;

    /// Cancel the current subscription. Returns whether one was cancelled.
    async fn unsubscribe(&self) -> Result<bool, PlatformError>;
}
