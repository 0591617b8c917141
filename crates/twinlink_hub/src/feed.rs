//! Push distribution of accepted desired-property patches.

use parking_lot::RwLock;
use std::sync::mpsc::{self, Receiver, Sender};
use twinlink_protocol::DesiredUpdate;

/// Fans accepted desired-property updates out to subscribers.
///
/// The feed:
/// - Emits updates in acceptance order
/// - Supports multiple subscribers
/// - Drops subscribers whose receiver has gone away
/// - Never replays: a subscriber only sees updates emitted after it
///   subscribed
pub struct DesiredFeed {
    subscribers: RwLock<Vec<Sender<DesiredUpdate>>>,
}

impl DesiredFeed {
    /// Creates a new empty feed.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(Vec::new()),
        }
    }

    /// Subscribes to the feed.
    ///
    /// Returns a receiver that will see all updates emitted after this
    /// call, in emission order.
    pub fn subscribe(&self) -> Receiver<DesiredUpdate> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.write().push(tx);
        rx
    }

    /// Emits an update to all live subscribers.
    ///
    /// Disconnected subscribers are removed.
    pub fn emit(&self, update: DesiredUpdate) {
        let mut subscribers = self.subscribers.write();
        subscribers.retain(|tx| tx.send(update.clone()).is_ok());
    }

    /// Returns the number of live subscribers.
    ///
    /// Subscribers that dropped their receiver are only counted out
    /// after the next emission.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }
}

impl Default for DesiredFeed {
    fn default() -> Self {
        Self::new()
    }
}
