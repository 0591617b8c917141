//! Client-side cache of the last fetched twin.

use parking_lot::RwLock;
use twinlink_protocol::Twin;

/// Holds the most recent full twin returned by the hub.
///
/// Reads are always served from the hub; this cache only answers
/// "what did the hub say last time" without another round trip.
#[derive(Debug, Default)]
pub struct TwinStore {
    current: RwLock<Option<Twin>>,
}

impl TwinStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a freshly fetched twin, replacing any previous snapshot.
    pub fn record(&self, twin: &Twin) {
        *self.current.write() = Some(twin.clone());
    }

    /// Returns the last recorded twin, if any fetch has completed.
    pub fn last_known(&self) -> Option<Twin> {
        self.current.read().clone()
    }

    /// Clears the cached snapshot.
    pub fn clear(&self) {
        *self.current.write() = None;
    }
}
