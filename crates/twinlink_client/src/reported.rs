//! Reported-property publisher.
//!
//! Owns the device's local view of its reported section and keeps it
//! aligned with the hub: each patch is validated, merged locally, then
//! transmitted, and the local version adopts the hub's authoritative
//! post-merge version. A failed transmission rolls the local view back
//! so it never drifts ahead of what the hub accepted.

use crate::error::{TwinError, TwinResult};
use crate::transport::TwinTransport;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;
use twinlink_protocol::{PropertyPatch, PropertySet};

/// Publishes reported-property patches for one device.
pub struct ReportedPropertyPublisher<T: TwinTransport> {
    transport: Arc<T>,
    device_id: String,
    local: RwLock<PropertySet>,
}

impl<T: TwinTransport> ReportedPropertyPublisher<T> {
    /// Creates a publisher with an empty local reported view.
    pub fn new(transport: Arc<T>, device_id: impl Into<String>) -> Self {
        Self {
            transport,
            device_id: device_id.into(),
            local: RwLock::new(PropertySet::new()),
        }
    }

    /// Seeds the local view from a fetched twin's reported section.
    pub fn seed(&self, reported: PropertySet) {
        *self.local.write() = reported;
    }

    /// Applies a patch locally and transmits it to the hub.
    ///
    /// Property names are validated before anything leaves the device;
    /// a name starting with the reserved `$` prefix fails with
    /// [`TwinError::InvalidPropertyName`] and no transmission occurs.
    /// On success the local version becomes the hub's post-merge
    /// version and that version is returned. On any transmission
    /// failure the local view is restored to its pre-patch state.
    ///
    /// The local lock is held across the transmission, so concurrent
    /// updates from multiple threads never interleave their merges.
    pub fn update(&self, patch: &PropertyPatch) -> TwinResult<u64> {
        patch.validate_names().map_err(TwinError::from)?;

        let mut local = self.local.write();
        let snapshot = local.clone();
        local.merge(patch);

        match self.transport.send_reported(&self.device_id, patch) {
            Ok(version) => {
                local.version = version;
                debug!(device_id = %self.device_id, version, "reported patch acknowledged");
                Ok(version)
            }
            Err(e) => {
                *local = snapshot;
                Err(e)
            }
        }
    }

    /// Snapshot of the local reported view.
    pub fn reported(&self) -> PropertySet {
        self.local.read().clone()
    }

    /// Current local reported version.
    pub fn version(&self) -> u64 {
        self.local.read().version
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;
    use serde_json::json;

    fn publisher(mock: MockTransport) -> ReportedPropertyPublisher<MockTransport> {
        ReportedPropertyPublisher::new(Arc::new(mock), "dev-1")
    }

    #[test]
    fn update_merges_and_adopts_hub_version() {
        let mock = MockTransport::new();
        mock.set_patch_version(17);
        let publisher = publisher(mock);

        let patch = PropertyPatch::new().with("temperature", json!(21.5));
        let version = publisher.update(&patch).unwrap();

        assert_eq!(version, 17);
        assert_eq!(publisher.version(), 17);
        assert_eq!(
            publisher.reported().values.get("temperature"),
            Some(&json!(21.5))
        );
    }

    #[test]
    fn reserved_name_fails_before_transmission() {
        let mock = MockTransport::new();
        let publisher = publisher(mock);

        let patch = PropertyPatch::new().with("$version", json!(1));
        let err = publisher.update(&patch).unwrap_err();

        assert!(matches!(err, TwinError::InvalidPropertyName { name } if name == "$version"));
        assert!(publisher.transport.sent_patches().is_empty());
        assert!(publisher.reported().values.is_empty());
    }

    #[test]
    fn nested_reserved_name_fails_before_transmission() {
        let publisher = publisher(MockTransport::new());
        let patch = PropertyPatch::new().with("config", json!({ "$secret": true }));
        assert!(matches!(
            publisher.update(&patch),
            Err(TwinError::InvalidPropertyName { .. })
        ));
        assert!(publisher.transport.sent_patches().is_empty());
    }

    #[test]
    fn failed_transmission_rolls_back() {
        let mock = MockTransport::new();
        mock.set_patch_version(5);
        let publisher = publisher(mock);
        publisher
            .update(&PropertyPatch::new().with("mode", json!("idle")))
            .unwrap();

        publisher.transport.set_patch_rejection("patch too large");
        let err = publisher
            .update(&PropertyPatch::new().with("mode", json!("active")))
            .unwrap_err();

        assert!(matches!(err, TwinError::RejectedByService(_)));
        assert_eq!(publisher.reported().values.get("mode"), Some(&json!("idle")));
        assert_eq!(publisher.version(), 5);
    }

    #[test]
    fn null_value_deletes_locally_and_is_transmitted() {
        let mock = MockTransport::new();
        mock.set_patch_version(2);
        let publisher = publisher(mock);
        publisher
            .update(&PropertyPatch::new().with("obsolete", json!("x")))
            .unwrap();

        publisher.transport.set_patch_version(3);
        publisher
            .update(&PropertyPatch::new().with("obsolete", json!(null)))
            .unwrap();

        assert!(!publisher.reported().values.contains_key("obsolete"));
        assert_eq!(publisher.transport.sent_patches().len(), 2);
    }

    #[test]
    fn seed_replaces_local_view() {
        let publisher = publisher(MockTransport::new());
        let mut seeded = PropertySet::new();
        seeded.values.insert("boot".into(), json!("cold"));
        seeded.version = 9;
        publisher.seed(seeded);
        assert_eq!(publisher.version(), 9);
        assert_eq!(publisher.reported().values.get("boot"), Some(&json!("cold")));
    }
}
