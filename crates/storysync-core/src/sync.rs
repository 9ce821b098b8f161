//! Outbox replay.
//!
//! A drain walks the outbox once, submitting each queued story to the remote
//! API and removing only the ones the remote accepted. A failure leaves the
//! item queued for the next drain; it never stops the pass.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, error, info, warn};

use crate::api::{RemoteApi, StorySubmission};
use crate::error::StoreError;
use crate::models::OutboxItem;
use crate::outbox::OutboxStore;

/// Tag carried by the platform reconnectivity signal that triggers a drain.
pub const SYNC_TAG: &str = "story-sync";

/// Summary of one drain pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub attempted: usize,
    pub submitted: usize,
    pub failed: usize,
    /// Another drain was already running, so this one did nothing.
    pub skipped: bool,
}

impl DrainReport {
    fn skipped() -> Self {
        Self {
            skipped: true,
            ..Self::default()
        }
    }
}

/// Releases the in-flight flag when a drain finishes, however it finishes.
struct InFlight<'a>(&'a AtomicBool);

impl<'a> InFlight<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[derive(Debug, Default)]
pub struct SyncCoordinator {
    in_flight: AtomicBool,
}

impl SyncCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_draining(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Replay every queued story once.
    ///
    /// Overlapping calls return immediately with a skipped report so a slow
    /// round trip cannot cause the same item to be submitted twice. Only a
    /// failure to read the outbox is an error.
    pub async fn drain_outbox(
        &self,
        outbox: &OutboxStore,
        remote: &dyn RemoteApi,
    ) -> Result<DrainReport, StoreError> {
        let Some(_in_flight) = InFlight::acquire(&self.in_flight) else {
            debug!("Drain already in flight, skipping");
            return Ok(DrainReport::skipped());
        };

        let items = outbox.list_all()?;
        let mut report = DrainReport::default();

        for item in items {
            report.attempted += 1;
            if let Err(reason) = Self::replay(remote, &item).await {
                warn!(id = item.id, reason = %reason, "Outbox item failed, will retry later");
                report.failed += 1;
                continue;
            }

            match outbox.remove(item.id) {
                Ok(()) => report.submitted += 1,
                Err(e) => {
                    // Accepted remotely but still queued: the next drain
                    // submits it again.
                    error!(id = item.id, error = %e, "Failed to remove submitted outbox item");
                    report.failed += 1;
                }
            }
        }

        if report.attempted > 0 {
            info!(
                attempted = report.attempted,
                submitted = report.submitted,
                failed = report.failed,
                "Outbox drained"
            );
        }
        Ok(report)
    }

    async fn replay(remote: &dyn RemoteApi, item: &OutboxItem) -> Result<(), String> {
        let submission = StorySubmission::from_story(&item.story).map_err(|e| e.to_string())?;
        remote
            .submit_story(&submission)
            .await
            .map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NewStory, PhotoBlob};
    use crate::testing::MockRemote;

    fn story(description: &str) -> NewStory {
        NewStory {
            description: description.to_string(),
            lat: Some(1.0),
            lon: Some(2.0),
            photo_blob: Some(PhotoBlob {
                data_url: "data:image/png;base64,AQID".to_string(),
                name: Some(format!("{description}.png")),
                content_type: Some("image/png".to_string()),
            }),
            token: None,
        }
    }

    #[tokio::test]
    async fn test_drain_submits_each_item_once_and_empties_outbox() {
        let outbox = OutboxStore::open_in_memory().unwrap();
        let remote = MockRemote::new();
        for name in ["a", "b", "c"] {
            outbox.add(&story(name)).unwrap();
        }

        let report = SyncCoordinator::new().drain_outbox(&outbox, &remote).await.unwrap();

        assert_eq!(report.attempted, 3);
        assert_eq!(report.submitted, 3);
        assert!(outbox.is_empty().unwrap());
        let submitted: Vec<_> = remote
            .submissions()
            .into_iter()
            .map(|s| s.description.unwrap())
            .collect();
        assert_eq!(submitted, vec!["a", "b", "c"]);
        assert_eq!(remote.submissions()[0].photo.as_ref().unwrap().bytes, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_drain_with_failing_remote_keeps_outbox_intact() {
        let outbox = OutboxStore::open_in_memory().unwrap();
        let remote = MockRemote::new();
        remote.set_online(false);
        outbox.add(&story("a")).unwrap();
        outbox.add(&story("b")).unwrap();
        let before = outbox.list_all().unwrap();

        let coordinator = SyncCoordinator::new();
        let report = coordinator.drain_outbox(&outbox, &remote).await.unwrap();
        assert_eq!(report.failed, 2);
        assert_eq!(outbox.list_all().unwrap(), before);

        coordinator.drain_outbox(&outbox, &remote).await.unwrap();
        assert_eq!(outbox.list_all().unwrap(), before);
    }

    #[tokio::test]
    async fn test_rejected_item_stays_and_others_continue() {
        let outbox = OutboxStore::open_in_memory().unwrap();
        let remote = MockRemote::new();
        remote.reject_story("bad", 400);
        outbox.add(&story("good-1")).unwrap();
        let bad = outbox.add(&story("bad")).unwrap();
        outbox.add(&story("good-2")).unwrap();

        let report = SyncCoordinator::new().drain_outbox(&outbox, &remote).await.unwrap();

        assert_eq!(report.submitted, 2);
        assert_eq!(report.failed, 1);
        let left = outbox.list_all().unwrap();
        assert_eq!(left.len(), 1);
        assert_eq!(left[0].id, bad);
    }

    #[tokio::test]
    async fn test_undecodable_photo_stays_queued() {
        let outbox = OutboxStore::open_in_memory().unwrap();
        let remote = MockRemote::new();
        let mut broken = story("broken");
        broken.photo_blob.as_mut().unwrap().data_url = "blob:http://app/123".to_string();
        outbox.add(&broken).unwrap();

        let report = SyncCoordinator::new().drain_outbox(&outbox, &remote).await.unwrap();
        assert_eq!(report.failed, 1);
        assert!(remote.submissions().is_empty());
        assert_eq!(outbox.len().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_overlapping_drain_is_skipped() {
        let outbox = OutboxStore::open_in_memory().unwrap();
        let remote = MockRemote::new();
        outbox.add(&story("a")).unwrap();

        let coordinator = SyncCoordinator::new();
        let held = InFlight::acquire(&coordinator.in_flight).unwrap();
        assert!(coordinator.is_draining());
        let report = coordinator.drain_outbox(&outbox, &remote).await.unwrap();
        assert!(report.skipped);
        assert_eq!(outbox.len().unwrap(), 1);

        drop(held);
        assert!(!coordinator.is_draining());
        let report = coordinator.drain_outbox(&outbox, &remote).await.unwrap();
        assert_eq!(report.submitted, 1);
    }

    #[tokio::test]
    async fn test_empty_outbox_drains_to_empty_report() {
        let outbox = OutboxStore::open_in_memory().unwrap();
        let remote = MockRemote::new();
        let report = SyncCoordinator::new().drain_outbox(&outbox, &remote).await.unwrap();
        assert_eq!(report, DrainReport::default());
    }
}
