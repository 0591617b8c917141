//! # Twinlink Client
//!
//! Device-side twin synchronization core.
//!
//! This crate provides:
//! - `TwinTransport` abstraction with MQTT and AMQP framings, each in
//!   TCP and WebSocket flavors
//! - `ReportedPropertyPublisher` for device-to-service merge patches
//! - `DesiredPropertyNotifier` for service-to-device push delivery
//! - `TwinStore` for the last known full twin snapshot
//! - `DeviceSession` composing the above over one connection
//!
//! ## Architecture
//!
//! One logical device session owns its connection exclusively. The
//! publisher and the notifier multiplex over it: reported patches go
//! out as atomic requests, desired patches come back on a push stream
//! with its own delivery thread, so neither path can stall the other.
//!
//! ## Key invariants
//!
//! - The hub is authoritative: versions are adopted from responses,
//!   never invented locally
//! - Property names are validated before anything reaches the wire
//! - A failed reported patch leaves local state as it was before the call
//! - Desired patches are delivered exactly once, in acceptance order,
//!   only while subscribed; subscription is never retroactive
//! - No retry inside the core: callers reconnect and resubscribe
//!   explicitly

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod amqp;
mod config;
mod error;
mod link;
mod mqtt;
mod notifier;
mod reported;
mod session;
mod store;
mod transport;

pub use amqp::AmqpTransport;
pub use config::ClientConfig;
pub use error::{TwinError, TwinResult};
pub use link::{DeviceLink, LoopbackHub, LoopbackLink};
pub use mqtt::MqttTransport;
pub use notifier::{DesiredEvent, DesiredPropertyNotifier, DesiredStream, SubscriptionState};
pub use reported::ReportedPropertyPublisher;
pub use session::{DeviceSession, SessionStats};
pub use store::TwinStore;
pub use transport::{MockTransport, TransportKind, TwinTransport};
