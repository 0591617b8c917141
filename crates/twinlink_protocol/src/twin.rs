//! The twin document.

use crate::merge::PropertyPatch;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One section of a twin's properties with its service-owned version.
///
/// The version increments on every merge accepted by the authority; a
/// fresh section starts at version 1.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySet {
    /// Property values.
    pub values: Map<String, Value>,
    /// Monotonically increasing version, owned by the service.
    pub version: u64,
}

impl PropertySet {
    /// Creates an empty property set at version 1.
    pub fn new() -> Self {
        Self {
            values: Map::new(),
            version: 1,
        }
    }

    /// Merges a patch into this set and bumps the version.
    pub fn merge(&mut self, patch: &PropertyPatch) -> u64 {
        patch.apply_to(&mut self.values);
        self.version += 1;
        self.version
    }

    /// Returns the value for a property name, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.values.get(name)
    }

    /// Returns true if the set contains the property.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Returns the number of top-level properties.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the set has no properties.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for PropertySet {
    fn default() -> Self {
        Self::new()
    }
}

/// The desired and reported sections of a twin.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TwinProperties {
    /// Service-to-device intent.
    pub desired: PropertySet,
    /// Device-to-service status.
    pub reported: PropertySet,
}

/// The synchronized state document for one device identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Twin {
    /// Device identity this twin belongs to.
    pub device_id: String,
    /// Administrative tags, readable and writable only by the service side.
    pub tags: Map<String, Value>,
    /// Desired and reported property sections.
    pub properties: TwinProperties,
}

impl Twin {
    /// Creates an empty twin for a device.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            tags: Map::new(),
            properties: TwinProperties::default(),
        }
    }
}
