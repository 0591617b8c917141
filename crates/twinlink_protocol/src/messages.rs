//! Protocol messages exchanged between device clients and the hub.

use crate::error::ProtocolResult;
use crate::merge::PropertyPatch;
use crate::twin::Twin;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current protocol version.
pub const PROTOCOL_VERSION: u16 = 1;

/// A twinlink protocol message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TwinMessage {
    /// Session establishment request.
    ConnectRequest(ConnectRequest),
    /// Session establishment response.
    ConnectResponse(ConnectResponse),
    /// Full-twin fetch request.
    GetTwinRequest(GetTwinRequest),
    /// Full-twin fetch response.
    GetTwinResponse(GetTwinResponse),
    /// Reported-property merge request.
    ReportedPatchRequest(ReportedPatchRequest),
    /// Reported-property merge response.
    ReportedPatchResponse(ReportedPatchResponse),
    /// Unsolicited desired-property change event.
    DesiredUpdate(DesiredUpdate),
}

impl TwinMessage {
    /// Returns the message type code.
    pub fn type_code(&self) -> u8 {
        match self {
            TwinMessage::ConnectRequest(_) => 1,
            TwinMessage::ConnectResponse(_) => 2,
            TwinMessage::GetTwinRequest(_) => 3,
            TwinMessage::GetTwinResponse(_) => 4,
            TwinMessage::ReportedPatchRequest(_) => 5,
            TwinMessage::ReportedPatchResponse(_) => 6,
            TwinMessage::DesiredUpdate(_) => 7,
        }
    }

    /// Encodes the message to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes a message from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}

/// Session establishment request from a device client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectRequest {
    /// Device identity.
    pub device_id: String,
    /// Protocol version the client speaks.
    pub protocol_version: u16,
}

impl ConnectRequest {
    /// Creates a new connect request at the current protocol version.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
            protocol_version: PROTOCOL_VERSION,
        }
    }
}

/// Session establishment response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConnectResponse {
    /// Whether the session was established.
    pub success: bool,
    /// Hub-assigned session id on success.
    pub session_id: Option<Uuid>,
    /// Error message on failure.
    pub error: Option<String>,
}

impl ConnectResponse {
    /// Creates a successful response with a session id.
    pub fn success(session_id: Uuid) -> Self {
        Self {
            success: true,
            session_id: Some(session_id),
            error: None,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            session_id: None,
            error: Some(message.into()),
        }
    }
}

/// Full-twin fetch request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTwinRequest {
    /// Device identity to fetch.
    pub device_id: String,
}

impl GetTwinRequest {
    /// Creates a new fetch request.
    pub fn new(device_id: impl Into<String>) -> Self {
        Self {
            device_id: device_id.into(),
        }
    }
}

/// Full-twin fetch response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GetTwinResponse {
    /// Whether the fetch succeeded.
    pub success: bool,
    /// The twin document on success.
    pub twin: Option<Box<Twin>>,
    /// Error message on failure.
    pub error: Option<String>,
}

impl GetTwinResponse {
    /// Creates a successful response carrying the twin.
    pub fn success(twin: Twin) -> Self {
        Self {
            success: true,
            twin: Some(Box::new(twin)),
            error: None,
        }
    }

    /// Creates an error response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            twin: None,
            error: Some(message.into()),
        }
    }
}

/// Reported-property merge request from a device client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedPatchRequest {
    /// Device identity.
    pub device_id: String,
    /// Merge patch for the reported section.
    pub patch: PropertyPatch,
}

impl ReportedPatchRequest {
    /// Creates a new reported-patch request.
    pub fn new(device_id: impl Into<String>, patch: PropertyPatch) -> Self {
        Self {
            device_id: device_id.into(),
            patch,
        }
    }
}

/// Reported-property merge response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportedPatchResponse {
    /// Whether the merge was accepted.
    pub success: bool,
    /// Authoritative reported version after the merge.
    pub version: u64,
    /// Error message on rejection.
    pub error: Option<String>,
}

impl ReportedPatchResponse {
    /// Creates a successful response with the post-merge version.
    pub fn success(version: u64) -> Self {
        Self {
            success: true,
            version,
            error: None,
        }
    }

    /// Creates a rejection response.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            version: 0,
            error: Some(message.into()),
        }
    }
}

/// An accepted desired-property change, pushed to subscribed devices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DesiredUpdate {
    /// The merge patch that was accepted.
    pub patch: PropertyPatch,
    /// Authoritative desired version after the merge.
    pub version: u64,
}

impl DesiredUpdate {
    /// Creates a new desired-update event.
    pub fn new(patch: PropertyPatch, version: u64) -> Self {
        Self { patch, version }
    }

    /// Encodes the event to JSON bytes.
    pub fn encode(&self) -> ProtocolResult<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Decodes an event from JSON bytes.
    pub fn decode(bytes: &[u8]) -> ProtocolResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
