//! AMQP twin transport.
//!
//! Maps twin operations onto sender/receiver link addresses under the
//! device's twin node. Requests carry a `cid` correlation id; desired
//! updates arrive on the device's desired receiver link.

use crate::error::{TwinError, TwinResult};
use crate::link::{self, DeviceLink};
use crate::transport::{TransportKind, TwinTransport};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::thread;
use tracing::warn;
use twinlink_protocol::{
    ConnectRequest, DesiredUpdate, GetTwinRequest, PropertyPatch, ReportedPatchRequest, Twin,
    TwinMessage,
};

/// Twin transport speaking the AMQP link grammar over a [`DeviceLink`].
pub struct AmqpTransport<L: DeviceLink> {
    link: L,
    address: String,
    device_id: String,
    websockets: bool,
    cid: AtomicU64,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<L: DeviceLink> AmqpTransport<L> {
    /// Creates a transport for a plain TCP connection.
    pub fn new(address: impl Into<String>, device_id: impl Into<String>, link: L) -> Self {
        Self {
            link,
            address: address.into(),
            device_id: device_id.into(),
            websockets: false,
            cid: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            last_error: RwLock::new(None),
        }
    }

    /// Creates a transport for a connection tunneled through a WebSocket.
    pub fn over_websockets(
        address: impl Into<String>,
        device_id: impl Into<String>,
        link: L,
    ) -> Self {
        Self {
            websockets: true,
            ..Self::new(address, device_id, link)
        }
    }

    /// Hub address this transport targets.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Most recent link error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn link_address(&self, suffix: &str) -> String {
        let cid = self.cid.fetch_add(1, Ordering::Relaxed) + 1;
        format!("/devices/{}/twin{suffix}?cid={cid}", self.device_id)
    }

    fn exchange(&self, suffix: &str, message: &TwinMessage) -> TwinResult<TwinMessage> {
        let body = message
            .encode()
            .map_err(|e| TwinError::Protocol(e.to_string()))?;
        let path = self.link_address(suffix);
        match self.link.request(&path, body) {
            Ok(bytes) => link::decode_message(&bytes),
            Err(message) => {
                *self.last_error.write() = Some(message.clone());
                self.connected.store(false, Ordering::Release);
                Err(TwinError::transport_retryable(message))
            }
        }
    }
}

impl<L: DeviceLink> TwinTransport for AmqpTransport<L> {
    fn connect(&self, request: &ConnectRequest) -> TwinResult<()> {
        let message = TwinMessage::ConnectRequest(request.clone());
        let response = self.exchange("", &message)?;
        link::expect_connect(response)?;
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    fn fetch_twin(&self, device_id: &str) -> TwinResult<Twin> {
        let message = TwinMessage::GetTwinRequest(GetTwinRequest {
            device_id: device_id.to_owned(),
        });
        let response = self.exchange("/get", &message)?;
        link::expect_twin(response)
    }

    fn send_reported(&self, device_id: &str, patch: &PropertyPatch) -> TwinResult<u64> {
        let message = TwinMessage::ReportedPatchRequest(ReportedPatchRequest {
            device_id: device_id.to_owned(),
            patch: patch.clone(),
        });
        let response = self.exchange("/reported", &message)?;
        link::expect_patch_version(response)
    }

    fn open_desired_stream(&self, device_id: &str) -> TwinResult<Receiver<DesiredUpdate>> {
        let path = format!("/devices/{device_id}/twin/desired");
        let raw = self
            .link
            .open_events(&path)
            .map_err(TwinError::transport_retryable)?;
        let (tx, rx) = mpsc::channel();
        thread::spawn(move || {
            for bytes in raw {
                match DesiredUpdate::decode(&bytes) {
                    Ok(update) => {
                        if tx.send(update).is_err() {
                            break;
                        }
                    }
                    Err(e) => warn!("dropping undecodable desired update: {e}"),
                }
            }
        });
        Ok(rx)
    }

    fn close_desired_stream(&self) -> TwinResult<()> {
        self.link.close_events();
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        if self.websockets {
            TransportKind::AmqpWebSocket
        } else {
            TransportKind::Amqp
        }
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire) && self.link.is_healthy()
    }

    fn close(&self) -> TwinResult<()> {
        self.link.close_events();
        self.connected.store(false, Ordering::Release);
        Ok(())
    }
}
