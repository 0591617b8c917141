//! Error types for the client core.

use thiserror::Error;
use twinlink_protocol::ProtocolError;

/// Result type for client operations.
pub type TwinResult<T> = Result<T, TwinError>;

/// Errors that can occur in the twin client.
#[derive(Error, Debug)]
pub enum TwinError {
    /// A property name starts with the reserved prefix. Raised before
    /// any transmission; neither local nor remote state changed.
    #[error("invalid property name: {name:?}")]
    InvalidPropertyName {
        /// The offending property name.
        name: String,
    },

    /// Network or transport failure. The core never retries; the
    /// connection must be reestablished explicitly.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried by the caller.
        retryable: bool,
    },

    /// The transport is not connected.
    #[error("not connected to hub")]
    NotConnected,

    /// The hub rejected the request. Local reported state was rolled
    /// back to the pre-call value.
    #[error("rejected by service: {0}")]
    RejectedByService(String),

    /// Malformed response or event.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// No desired-property subscription is active.
    #[error("not subscribed to desired updates")]
    NotSubscribed,

    /// The desired-property stream was closed by unsubscribe or
    /// replacement.
    #[error("subscription closed")]
    SubscriptionClosed,

    /// A receive wait timed out.
    #[error("operation timed out")]
    Timeout,
}

impl TwinError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if the caller may retry the operation.
    pub fn is_retryable(&self) -> bool {
        match self {
            TwinError::Transport { retryable, .. } => *retryable,
            TwinError::Timeout => true,
            _ => false,
        }
    }
}

impl From<ProtocolError> for TwinError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::ReservedPropertyName { name } => TwinError::InvalidPropertyName { name },
            other => TwinError::Protocol(other.to_string()),
        }
    }
}
