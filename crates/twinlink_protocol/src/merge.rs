//! Merge-patch semantics and property-name validation.
//!
//! Patches follow JSON merge-patch rules: assigning `null` to a key
//! removes it from the target, nested objects merge recursively, and
//! everything else replaces wholesale. Deleting a nested key leaves the
//! parent object in place, possibly empty.

use crate::error::{ProtocolError, ProtocolResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Property names starting with this prefix are reserved for hub metadata.
pub const RESERVED_PREFIX: char = '$';

/// A partial update to one section of a twin document.
///
/// A patch maps property names to JSON values; a `null` value signals
/// deletion of the corresponding key on merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PropertyPatch(Map<String, Value>);

impl PropertyPatch {
    /// Creates an empty patch.
    pub fn new() -> Self {
        Self(Map::new())
    }

    /// Sets a property in the patch, returning the patch for chaining.
    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    /// Sets a property in the patch.
    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.0.insert(name.into(), value);
    }

    /// Returns the value for a property name, if present.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    /// Returns true if the patch contains no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of top-level entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns the maximum nesting depth of the patch.
    ///
    /// An empty or flat patch has depth 1; each level of nested object
    /// adds one.
    pub fn depth(&self) -> usize {
        fn value_depth(value: &Value) -> usize {
            match value {
                Value::Object(map) => 1 + map.values().map(value_depth).max().unwrap_or(0),
                _ => 0,
            }
        }
        1 + self.0.values().map(value_depth).max().unwrap_or(0)
    }

    /// Validates every property name in the patch against the reserved
    /// prefix rule, including nested object keys.
    pub fn validate_names(&self) -> ProtocolResult<()> {
        validate_property_names(&self.0)
    }

    /// Applies this patch to a target map with merge-patch semantics.
    pub fn apply_to(&self, target: &mut Map<String, Value>) {
        merge_patch(target, &self.0);
    }

    /// Returns the underlying map.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the patch and returns the underlying map.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }
}

impl From<Map<String, Value>> for PropertyPatch {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl FromIterator<(String, Value)> for PropertyPatch {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Applies `patch` to `target` with merge-patch semantics.
///
/// - A `null` value removes the key from `target` (no null entry is
///   ever stored).
/// - An object value merges recursively; the key is created as an
///   object if absent, so `{A: {B: null}}` against an empty target
///   leaves `A` present as an empty object.
/// - Any other value replaces the existing entry.
pub fn merge_patch(target: &mut Map<String, Value>, patch: &Map<String, Value>) {
    for (name, value) in patch {
        match value {
            Value::Null => {
                target.remove(name);
            }
            Value::Object(nested) => {
                let entry = target
                    .entry(name.clone())
                    .or_insert_with(|| Value::Object(Map::new()));
                // A non-object existing value is replaced by the merged object.
                if !entry.is_object() {
                    *entry = Value::Object(Map::new());
                }
                if let Value::Object(inner) = entry {
                    merge_patch(inner, nested);
                }
            }
            other => {
                target.insert(name.clone(), other.clone());
            }
        }
    }
}

/// Validates all keys of a property map, recursing into nested objects.
///
/// Returns `ProtocolError::ReservedPropertyName` for the first key that
/// starts with [`RESERVED_PREFIX`].
pub fn validate_property_names(map: &Map<String, Value>) -> ProtocolResult<()> {
    for (name, value) in map {
        if name.starts_with(RESERVED_PREFIX) {
            return Err(ProtocolError::ReservedPropertyName { name: name.clone() });
        }
        if let Value::Object(nested) = value {
            validate_property_names(nested)?;
        }
    }
    Ok(())
}
