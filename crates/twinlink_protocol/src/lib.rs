//! # Twinlink Protocol
//!
//! Twin document model, merge-patch semantics and wire messages for twinlink.
//!
//! This crate provides:
//! - `Twin` / `PropertySet` for the synchronized device document
//! - `PropertyPatch` with JSON merge-patch semantics (`null` deletes)
//! - Reserved-prefix property-name validation
//! - Protocol messages (Connect, GetTwin, ReportedPatch, DesiredUpdate)
//! - JSON encoding/decoding
//!
//! This is a pure protocol crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod merge;
mod messages;
mod twin;

pub use error::{ProtocolError, ProtocolResult};
pub use merge::{merge_patch, validate_property_names, PropertyPatch, RESERVED_PREFIX};
pub use messages::{
    ConnectRequest, ConnectResponse, DesiredUpdate, GetTwinRequest, GetTwinResponse,
    ReportedPatchRequest, ReportedPatchResponse, TwinMessage, PROTOCOL_VERSION,
};
pub use twin::{PropertySet, Twin, TwinProperties};
