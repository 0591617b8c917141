//! Configuration for a device session.

use crate::transport::TransportKind;
use std::time::Duration;
use twinlink_protocol::PROTOCOL_VERSION;

/// Configuration for a device session.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Device identity.
    pub device_id: String,
    /// Hub address.
    pub hub_url: String,
    /// Transport variant to connect with.
    pub transport: TransportKind,
    /// Protocol version to announce on connect.
    pub protocol_version: u16,
    /// Per-request timeout.
    pub request_timeout: Duration,
}

impl ClientConfig {
    /// Creates a configuration for a device.
    pub fn new(device_id: impl Into<String>, hub_url: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            hub_url: hub_url.into(),
            transport: TransportKind::Mqtt,
            protocol_version: PROTOCOL_VERSION,
            request_timeout: Duration::from_secs(30),
        }
    }

    /// Sets the transport variant.
    pub fn with_transport(mut self, kind: TransportKind) -> Self {
        self.transport = kind;
        self
    }

    /// Sets the per-request timeout.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}
