//! Authoritative twin storage.

use crate::error::{HubError, HubResult};
use crate::feed::DesiredFeed;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use tracing::debug;
use twinlink_protocol::{DesiredUpdate, PropertyPatch, Twin};

/// One registered device: its twin and the feed its desired changes
/// fan out on.
struct TwinEntry {
    twin: Twin,
    feed: Arc<DesiredFeed>,
}

/// The authoritative twin document store.
///
/// The registry owns the source of truth for every device twin:
/// - the device side merges reported-property patches through
///   [`TwinRegistry::apply_reported`]
/// - the service side (administrative credential) merges
///   desired-property patches through [`TwinRegistry::update_desired`],
///   which also emits one [`DesiredUpdate`] per accepted patch
///
/// All merges validate property names against the reserved prefix and
/// bump the authoritative version of the touched section.
pub struct TwinRegistry {
    twins: RwLock<HashMap<String, TwinEntry>>,
}

impl TwinRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self {
            twins: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a device, creating an empty twin.
    ///
    /// Registering an already known device is a no-op.
    pub fn register(&self, device_id: &str) {
        let mut twins = self.twins.write();
        if !twins.contains_key(device_id) {
            debug!(device_id, "registering device");
            twins.insert(
                device_id.to_string(),
                TwinEntry {
                    twin: Twin::new(device_id),
                    feed: Arc::new(DesiredFeed::new()),
                },
            );
        }
    }

    /// Removes a device and its twin.
    pub fn remove(&self, device_id: &str) -> bool {
        self.twins.write().remove(device_id).is_some()
    }

    /// Returns a snapshot of a device's twin.
    pub fn twin(&self, device_id: &str) -> Option<Twin> {
        self.twins.read().get(device_id).map(|e| e.twin.clone())
    }

    /// Returns the number of registered devices.
    pub fn device_count(&self) -> usize {
        self.twins.read().len()
    }

    /// Merges a desired-property patch for a device (service-side writer).
    ///
    /// On success the patch is emitted to every live subscriber of that
    /// device's desired feed, carrying the post-merge version. Emission
    /// happens before the registry lock is released, so feed order is
    /// acceptance order.
    pub fn update_desired(&self, device_id: &str, patch: &PropertyPatch) -> HubResult<u64> {
        validate(patch)?;

        let mut twins = self.twins.write();
        let entry = twins
            .get_mut(device_id)
            .ok_or_else(|| HubError::UnknownDevice(device_id.to_string()))?;

        let version = entry.twin.properties.desired.merge(patch);
        debug!(device_id, version, "desired patch accepted");
        entry
            .feed
            .emit(DesiredUpdate::new(patch.clone(), version));
        Ok(version)
    }

    /// Merges a reported-property patch for a device (device-side writer).
    pub fn apply_reported(&self, device_id: &str, patch: &PropertyPatch) -> HubResult<u64> {
        validate(patch)?;

        let mut twins = self.twins.write();
        let entry = twins
            .get_mut(device_id)
            .ok_or_else(|| HubError::UnknownDevice(device_id.to_string()))?;

        let version = entry.twin.properties.reported.merge(patch);
        debug!(device_id, version, "reported patch accepted");
        Ok(version)
    }

    /// Merges a patch into a device's tags (service-side writer).
    pub fn update_tags(&self, device_id: &str, patch: &PropertyPatch) -> HubResult<()> {
        validate(patch)?;

        let mut twins = self.twins.write();
        let entry = twins
            .get_mut(device_id)
            .ok_or_else(|| HubError::UnknownDevice(device_id.to_string()))?;

        patch.apply_to(&mut entry.twin.tags);
        Ok(())
    }

    /// Subscribes to a device's desired-property updates.
    ///
    /// The receiver sees only updates accepted after this call.
    pub fn subscribe_desired(&self, device_id: &str) -> HubResult<Receiver<DesiredUpdate>> {
        let twins = self.twins.read();
        let entry = twins
            .get(device_id)
            .ok_or_else(|| HubError::UnknownDevice(device_id.to_string()))?;
        Ok(entry.feed.subscribe())
    }
}

impl Default for TwinRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn validate(patch: &PropertyPatch) -> HubResult<()> {
    patch.validate_names().map_err(|e| HubError::RejectedPatch {
        reason: e.to_string(),
    })
}
