//! Transport abstraction for twin operations.

use crate::error::{TwinError, TwinResult};
use std::sync::mpsc::Receiver;
use twinlink_protocol::{ConnectRequest, DesiredUpdate, PropertyPatch, Twin};

/// A twin transport handles communication with the hub for one device
/// connection.
///
/// This trait abstracts the wire layer, allowing different framings
/// (MQTT topics, AMQP links, mock for testing). Push-capable variants
/// deliver unsolicited desired-property updates through
/// [`TwinTransport::open_desired_stream`]; all variants support
/// on-demand full-twin fetch and reported-patch submission.
///
/// Connection failure surfaces as `TwinError::Transport` and flips the
/// transport to disconnected; the transport never resubscribes on its
/// own.
pub trait TwinTransport: Send + Sync {
    /// Establishes the device session with the hub.
    fn connect(&self, request: &ConnectRequest) -> TwinResult<()>;

    /// Fetches the full twin for a device.
    fn fetch_twin(&self, device_id: &str) -> TwinResult<Twin>;

    /// Submits a reported-property merge patch as one atomic request.
    ///
    /// Returns the authoritative reported version after the merge.
    fn send_reported(&self, device_id: &str, patch: &PropertyPatch) -> TwinResult<u64>;

    /// Opens the push stream of desired-property updates.
    ///
    /// Updates arrive in hub acceptance order, starting with the first
    /// update accepted after the stream opened.
    fn open_desired_stream(&self, device_id: &str) -> TwinResult<Receiver<DesiredUpdate>>;

    /// Closes the push stream of desired-property updates.
    fn close_desired_stream(&self) -> TwinResult<()>;

    /// Returns the transport variant.
    fn kind(&self) -> TransportKind;

    /// Checks if the transport is connected.
    fn is_connected(&self) -> bool;

    /// Closes the transport connection.
    fn close(&self) -> TwinResult<()>;
}

/// The supported transport variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportKind {
    /// MQTT over TCP.
    Mqtt,
    /// MQTT over WebSocket.
    MqttWebSocket,
    /// AMQP over TCP.
    Amqp,
    /// AMQP over WebSocket.
    AmqpWebSocket,
}

impl TransportKind {
    /// Returns true if the variant tunnels over WebSockets.
    pub fn over_websockets(&self) -> bool {
        matches!(self, TransportKind::MqttWebSocket | TransportKind::AmqpWebSocket)
    }

    /// All supported variants.
    pub fn all() -> [TransportKind; 4] {
        [
            TransportKind::Mqtt,
            TransportKind::MqttWebSocket,
            TransportKind::Amqp,
            TransportKind::AmqpWebSocket,
        ]
    }
}

impl TwinTransport for Box<dyn TwinTransport> {
    fn connect(&self, request: &ConnectRequest) -> TwinResult<()> {
        (**self).connect(request)
    }

    fn fetch_twin(&self, device_id: &str) -> TwinResult<Twin> {
        (**self).fetch_twin(device_id)
    }

    fn send_reported(&self, device_id: &str, patch: &PropertyPatch) -> TwinResult<u64> {
        (**self).send_reported(device_id, patch)
    }

    fn open_desired_stream(&self, device_id: &str) -> TwinResult<Receiver<DesiredUpdate>> {
        (**self).open_desired_stream(device_id)
    }

    fn close_desired_stream(&self) -> TwinResult<()> {
        (**self).close_desired_stream()
    }

    fn kind(&self) -> TransportKind {
        (**self).kind()
    }

    fn is_connected(&self) -> bool {
        (**self).is_connected()
    }

    fn close(&self) -> TwinResult<()> {
        (**self).close()
    }
}

/// A mock transport for testing.
pub struct MockTransport {
    connected: std::sync::atomic::AtomicBool,
    twin_response: std::sync::Mutex<Option<Twin>>,
    patch_response: std::sync::Mutex<Option<Result<u64, String>>>,
    sent_patches: std::sync::Mutex<Vec<PropertyPatch>>,
    desired_tx: std::sync::Mutex<Option<std::sync::mpsc::Sender<DesiredUpdate>>>,
}

impl MockTransport {
    /// Creates a new mock transport in the connected state.
    pub fn new() -> Self {
        Self {
            connected: std::sync::atomic::AtomicBool::new(true),
            twin_response: std::sync::Mutex::new(None),
            patch_response: std::sync::Mutex::new(None),
            sent_patches: std::sync::Mutex::new(Vec::new()),
            desired_tx: std::sync::Mutex::new(None),
        }
    }

    /// Sets the twin returned by `fetch_twin`.
    pub fn set_twin(&self, twin: Twin) {
        *self.twin_response.lock().unwrap() = Some(twin);
    }

    /// Sets the version returned by `send_reported`.
    pub fn set_patch_version(&self, version: u64) {
        *self.patch_response.lock().unwrap() = Some(Ok(version));
    }

    /// Makes `send_reported` fail as rejected by the service.
    pub fn set_patch_rejection(&self, reason: impl Into<String>) {
        *self.patch_response.lock().unwrap() = Some(Err(reason.into()));
    }

    /// Sets the connected state.
    pub fn set_connected(&self, connected: bool) {
        self.connected
            .store(connected, std::sync::atomic::Ordering::SeqCst);
    }

    /// Returns the patches submitted through `send_reported`.
    pub fn sent_patches(&self) -> Vec<PropertyPatch> {
        self.sent_patches.lock().unwrap().clone()
    }

    /// Pushes a desired update into the open stream.
    ///
    /// Returns false if no stream is open or the receiver is gone.
    pub fn push_desired(&self, update: DesiredUpdate) -> bool {
        match self.desired_tx.lock().unwrap().as_ref() {
            Some(tx) => tx.send(update).is_ok(),
            None => false,
        }
    }

    /// Returns true if a desired stream is currently open.
    pub fn desired_stream_open(&self) -> bool {
        self.desired_tx.lock().unwrap().is_some()
    }

    fn check_connected(&self) -> TwinResult<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(TwinError::NotConnected)
        }
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl TwinTransport for MockTransport {
    fn connect(&self, _request: &ConnectRequest) -> TwinResult<()> {
        self.check_connected()
    }

    fn fetch_twin(&self, _device_id: &str) -> TwinResult<Twin> {
        self.check_connected()?;
        self.twin_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TwinError::Protocol("no mock twin response set".into()))
    }

    fn send_reported(&self, _device_id: &str, patch: &PropertyPatch) -> TwinResult<u64> {
        self.check_connected()?;
        let response = self
            .patch_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| TwinError::Protocol("no mock patch response set".into()))?;
        match response {
            Ok(version) => {
                self.sent_patches.lock().unwrap().push(patch.clone());
                Ok(version)
            }
            Err(reason) => Err(TwinError::RejectedByService(reason)),
        }
    }

    fn open_desired_stream(&self, _device_id: &str) -> TwinResult<Receiver<DesiredUpdate>> {
        self.check_connected()?;
        let (tx, rx) = std::sync::mpsc::channel();
        *self.desired_tx.lock().unwrap() = Some(tx);
        Ok(rx)
    }

    fn close_desired_stream(&self) -> TwinResult<()> {
        self.desired_tx.lock().unwrap().take();
        Ok(())
    }

    fn kind(&self) -> TransportKind {
        TransportKind::Mqtt
    }

    fn is_connected(&self) -> bool {
        self.connected.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn close(&self) -> TwinResult<()> {
        self.connected
            .store(false, std::sync::atomic::Ordering::SeqCst);
        self.desired_tx.lock().unwrap().take();
        Ok(())
    }
}
