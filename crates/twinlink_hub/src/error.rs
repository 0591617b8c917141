//! Error types for the hub.

use thiserror::Error;

/// Result type for hub operations.
pub type HubResult<T> = Result<T, HubError>;

/// Errors that can occur in the hub.
#[derive(Error, Debug)]
pub enum HubError {
    /// Invalid request format or content.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The device is not registered.
    #[error("unknown device: {0}")]
    UnknownDevice(String),

    /// The patch was rejected by validation.
    #[error("rejected patch: {reason}")]
    RejectedPatch {
        /// Why the patch was rejected.
        reason: String,
    },

    /// Protocol version mismatch.
    #[error("protocol version mismatch: {0}")]
    ProtocolMismatch(String),

    /// Internal hub error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Returns true if this error is the caller's fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            HubError::InvalidRequest(_)
                | HubError::UnknownDevice(_)
                | HubError::RejectedPatch { .. }
                | HubError::ProtocolMismatch(_)
        )
    }
}
