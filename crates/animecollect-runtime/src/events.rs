//! Change notifications for the collection.
//!
//! Published after a write actually changed state. No-op outcomes
//! (already present, already watched, nothing to remove) publish nothing.

use serde::Serialize;
use tokio::sync::broadcast;

const DEFAULT_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CollectionEvent {
    /// A title was added to or removed from the collection, or its tags changed.
    CollectionChanged { anime_id: String },
    /// An episode was marked, unmarked or rated.
    WatchStateChanged { anime_id: String, episode: u32 },
    WatchlistChanged,
    /// Every table was emptied.
    Cleared,
}

/// Fan-out of [`CollectionEvent`]s to any number of subscribers.
///
/// Slow subscribers that fall more than the channel capacity behind observe
/// `RecvError::Lagged` and should re-read whatever they display.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<CollectionEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn publish(&self, event: CollectionEvent) {
        // Only fails when nobody is listening.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CollectionEvent> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
