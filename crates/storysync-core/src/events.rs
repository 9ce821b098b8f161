//! Engine → foreground event delivery.

use tokio::sync::broadcast;
use tracing::debug;

use crate::models::EngineEvent;

/// Events buffered per slow receiver before it starts missing them.
const EVENT_BUFFER_SIZE: usize = 32;

/// Broadcasts [`EngineEvent`]s to every subscribed foreground context.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Send to all current subscribers. Having none is not an error.
    pub fn publish(&self, event: EngineEvent) {
        if let Err(broadcast::error::SendError(event)) = self.tx.send(event) {
            debug!(?event, "No foreground context listening");
        }
    }
}
