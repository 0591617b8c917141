//! MQTT twin transport.
//!
//! Maps twin operations onto the hub's MQTT topic grammar. Requests go
//! to operation topics annotated with a `$rid` correlation id; desired
//! updates arrive on the desired-PATCH topic filter.

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

const TOPIC_CONNECT: &str = "$iothub/twin/CONNECT";
const TOPIC_GET: &str = "$iothub/twin/GET";
const TOPIC_REPORTED: &str = "$iothub/twin/PATCH/properties/reported";
const TOPIC_DESIRED_FILTER: &str = "$iothub/twin/PATCH/properties/desired/#";

/// Twin transport speaking the MQTT topic grammar over a [`DeviceLink`].
pub struct MqttTransport<L: DeviceLink> {
    link: L,
    address: String,
    websockets: bool,
    rid: AtomicU64,
    connected: AtomicBool,
    last_error: RwLock<Option<String>>,
}

impl<L: DeviceLink> MqttTransport<L> {
    /// Creates a transport for a plain TCP broker session.
    pub fn new(address: impl Into<String>, link: L) -> Self {
        Self {
            link,
            address: address.into(),
            websockets: false,
            rid: AtomicU64::new(0),
            connected: AtomicBool::new(false),
            last_error: RwLock::new(None),
        }
    }

    /// Creates a transport for a session tunneled through a WebSocket.
    pub fn over_websockets(address: impl Into<String>, link: L) -> Self {
        Self {
            websockets: true,
            ..Self::new(address, link)
        }
    }

    /// Broker address this transport targets.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Most recent link error, if any.
    pub fn last_error(&self) -> Option<String> {
        self.last_error.read().clone()
    }

    fn request_topic(&self, topic: &str) -> String {
        let rid = self.rid.fetch_add(1, Ordering::Relaxed) + 1;
        format!("{topic}/?$rid={rid}")
    }

    fn exchange(&self, topic: &str, message: &TwinMessage) -> TwinResult<TwinMessage> {
        let body = message
            .encode()
            .map_err(|e| TwinError::Protocol(e.to_string()))?;
        let path = self.request_topic(topic);
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

impl<L: DeviceLink> TwinTransport for MqttTransport<L> {
    fn connect(&self, request: &ConnectRequest) -> TwinResult<()> {
        let message = TwinMessage::ConnectRequest(request.clone());
        let response = self.exchange(TOPIC_CONNECT, &message)?;
        link::expect_connect(response)?;
        self.connected.store(true, Ordering::Release);
        Ok(())
    }

    fn fetch_twin(&self, device_id: &str) -> TwinResult<Twin> {
        let message = TwinMessage::GetTwinRequest(GetTwinRequest {
            device_id: device_id.to_owned(),
        });
        let response = self.exchange(TOPIC_GET, &message)?;
        link::expect_twin(response)
    }

    fn send_reported(&self, device_id: &str, patch: &PropertyPatch) -> TwinResult<u64> {
        let message = TwinMessage::ReportedPatchRequest(ReportedPatchRequest {
            device_id: device_id.to_owned(),
            patch: patch.clone(),
        });
        let response = self.exchange(TOPIC_REPORTED, &message)?;
        link::expect_patch_version(response)
    }

    fn open_desired_stream(&self, _device_id: &str) -> TwinResult<Receiver<DesiredUpdate>> {
        let raw = self
            .link
            .open_events(TOPIC_DESIRED_FILTER)
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
            TransportKind::MqttWebSocket
        } else {
            TransportKind::Mqtt
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
