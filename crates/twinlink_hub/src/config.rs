//! Hub configuration.

use twinlink_protocol::PROTOCOL_VERSION;

/// Configuration for the twin hub.
#[derive(Debug, Clone)]
pub struct HubConfig {
    /// Maximum encoded size of an accepted patch, in bytes.
    pub max_patch_bytes: usize,
    /// Maximum nesting depth of an accepted patch.
    pub max_patch_depth: usize,
    /// Protocol version the hub speaks.
    pub protocol_version: u16,
}

impl HubConfig {
    /// Creates a configuration with default limits.
    pub fn new() -> Self {
        Self {
            max_patch_bytes: 32 * 1024,
            max_patch_depth: 10,
            protocol_version: PROTOCOL_VERSION,
        }
    }

    /// Sets the maximum patch size in bytes.
    pub fn with_max_patch_bytes(mut self, bytes: usize) -> Self {
        self.max_patch_bytes = bytes;
        self
    }

    /// Sets the maximum patch nesting depth.
    pub fn with_max_patch_depth(mut self, depth: usize) -> Self {
        self.max_patch_depth = depth;
        self
    }
}

impl Default for HubConfig {
    fn default() -> Self {
        Self::new()
    }
}
