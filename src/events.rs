// src/events.rs
use tokio::sync::broadcast;

/// Notifications shared between views of the app in the same process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncEvent {
    CharactersChanged,
    DeadlineChanged,
}

#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<SyncEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(32);
        Self { tx }
    }

    /// Publishing with no subscribers is not an error.
    pub fn publish(&self, event: SyncEvent) {
        let receivers = self.tx.send(event).unwrap_or(0);
        tracing::debug!("Published {:?} to {} subscribers", event, receivers);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SyncEvent> {
        self.tx.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
