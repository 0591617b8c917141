//! Byte-level link abstraction under the transports.
//!
//! A [`DeviceLink`] carries opaque request/response bodies and an event
//! stream for one device connection. Implement it over a real socket
//! (MQTT broker session, AMQP connection, either tunneled through a
//! WebSocket) or in process via [`LoopbackLink`] for tests.

use crate::error::{TwinError, TwinResult};
use std::sync::mpsc::Receiver;
use twinlink_protocol::{Twin, TwinMessage};

/// Device-side connection abstraction.
///
/// The transports (`MqttTransport`, `AmqpTransport`) handle message
/// encoding and protocol semantics; the link only moves bytes.
pub trait DeviceLink: Send + Sync {
    /// Sends a request body to a path (topic or link address) and
    /// returns the response body.
    fn request(&self, path: &str, body: Vec<u8>) -> Result<Vec<u8>, String>;

    /// Opens the unsolicited event stream for a path.
    ///
    /// Each received item is one encoded event.
    fn open_events(&self, path: &str) -> Result<Receiver<Vec<u8>>, String>;

    /// Closes the event stream, if open.
    fn close_events(&self);

    /// Checks if the link is connected/healthy.
    fn is_healthy(&self) -> bool;
}

/// An in-process hub a loopback link can route to.
///
/// Implemented by test fixtures over `twinlink_hub::TwinHub`; keeps
/// this crate free of a dependency on the hub crate.
pub trait LoopbackHub {
    /// Handles one encoded request envelope.
    fn handle(&self, body: &[u8]) -> Result<Vec<u8>, String>;

    /// Opens the encoded desired-event stream for a device.
    fn open_event_stream(&self, device_id: &str) -> Result<Receiver<Vec<u8>>, String>;
}

/// A loopback link that routes requests directly to an in-process hub.
///
/// Useful for testing without network overhead.
pub struct LoopbackLink<H: LoopbackHub> {
    hub: H,
    device_id: String,
}

impl<H: LoopbackHub + Send + Sync> LoopbackLink<H> {
    /// Creates a loopback link for one device connection.
    pub fn new(hub: H, device_id: impl Into<String>) -> Self {
        Self {
            hub,
            device_id: device_id.into(),
        }
    }
}

impl<H: LoopbackHub + Send + Sync> DeviceLink for LoopbackLink<H> {
    fn request(&self, _path: &str, body: Vec<u8>) -> Result<Vec<u8>, String> {
        self.hub.handle(&body)
    }

    fn open_events(&self, _path: &str) -> Result<Receiver<Vec<u8>>, String> {
        self.hub.open_event_stream(&self.device_id)
    }

    fn close_events(&self) {}

    fn is_healthy(&self) -> bool {
        true
    }
}

/// Decodes a response body into a protocol message.
pub(crate) fn decode_message(bytes: &[u8]) -> TwinResult<TwinMessage> {
    TwinMessage::decode(bytes).map_err(|e| TwinError::Protocol(format!("bad response: {e}")))
}

/// Unwraps a connect response, mapping rejection to an error.
pub(crate) fn expect_connect(message: TwinMessage) -> TwinResult<()> {
    match message {
        TwinMessage::ConnectResponse(response) if response.success => Ok(()),
        TwinMessage::ConnectResponse(response) => Err(TwinError::RejectedByService(
            response.error.unwrap_or_else(|| "connect rejected".into()),
        )),
        other => Err(unexpected(&other)),
    }
}

/// Unwraps a get-twin response.
pub(crate) fn expect_twin(message: TwinMessage) -> TwinResult<Twin> {
    match message {
        TwinMessage::GetTwinResponse(response) if response.success => response
            .twin
            .map(|twin| *twin)
            .ok_or_else(|| TwinError::Protocol("twin missing from response".into())),
        TwinMessage::GetTwinResponse(response) => Err(TwinError::RejectedByService(
            response.error.unwrap_or_else(|| "fetch rejected".into()),
        )),
        other => Err(unexpected(&other)),
    }
}

/// Unwraps a reported-patch response into the authoritative version.
pub(crate) fn expect_patch_version(message: TwinMessage) -> TwinResult<u64> {
    match message {
        TwinMessage::ReportedPatchResponse(response) if response.success => Ok(response.version),
        TwinMessage::ReportedPatchResponse(response) => Err(TwinError::RejectedByService(
            response.error.unwrap_or_else(|| "patch rejected".into()),
        )),
        other => Err(unexpected(&other)),
    }
}

fn unexpected(message: &TwinMessage) -> TwinError {
    TwinError::Protocol(format!(
        "unexpected response message type {}",
        message.type_code()
    ))
}
