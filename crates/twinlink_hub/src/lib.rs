//! # Twinlink Hub
//!
//! In-process authoritative twin registry for twinlink.
//!
//! This crate provides:
//! - `TwinRegistry`: the authoritative twin document per device
//! - `DesiredFeed`: push distribution of accepted desired-property patches
//! - Request handlers (connect, get-twin, reported-patch)
//! - `TwinHub`: the facade device transports talk to
//!
//! # Architecture
//!
//! The hub owns the source of truth for every twin. Device clients reach
//! it through a transport; the administrative surface (`update_desired`,
//! `update_tags`) models the separate registry credential that service
//! operators use, and drives the same merge path a production hub would.
//!
//! Desired-property changes are fanned out through per-device feeds.
//! Delivery is not retroactive: a device that subscribes after a patch
//! was accepted must fetch the full twin to reconcile.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod config;
mod error;
mod feed;
mod handler;
mod registry;
mod server;

pub use config::HubConfig;
pub use error::{HubError, HubResult};
pub use feed::DesiredFeed;
pub use handler::{HandlerContext, RequestHandler};
pub use registry::TwinRegistry;
pub use server::TwinHub;
