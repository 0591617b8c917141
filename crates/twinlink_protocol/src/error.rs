//! Error types for the protocol crate.

use thiserror::Error;

/// Result type for protocol operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Errors that can occur while validating or encoding protocol data.
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// A property name starts with the reserved prefix.
    #[error("reserved property name: {name:?}")]
    ReservedPropertyName {
        /// The offending property name.
        name: String,
    },

    /// A message or document failed to encode or decode.
    #[error("codec error: {0}")]
    Codec(String),

    /// A decoded value did not have the expected structure.
    #[error("invalid structure: {0}")]
    InvalidStructure(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        ProtocolError::Codec(err.to_string())
    }
}
