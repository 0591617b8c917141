//! The hub facade.

use crate::config::HubConfig;
use crate::error::HubResult;
use crate::handler::{HandlerContext, RequestHandler};
use crate::registry::TwinRegistry;
use std::sync::mpsc::Receiver;
use std::sync::Arc;
use twinlink_protocol::{
    ConnectRequest, ConnectResponse, DesiredUpdate, GetTwinRequest, GetTwinResponse,
    PropertyPatch, ReportedPatchRequest, ReportedPatchResponse, Twin, TwinMessage,
};

/// The twin hub.
///
/// Plays the cloud service role: it owns the authoritative twin per
/// device, answers device requests (connect, fetch, reported patch) and
/// exposes the administrative writer surface used to change desired
/// properties and tags.
///
/// # Example
///
/// ```
/// use twinlink_hub::{HubConfig, TwinHub};
/// use twinlink_protocol::ConnectRequest;
///
/// let hub = TwinHub::new(HubConfig::default());
/// let response = hub.handle_connect(ConnectRequest::new("dev-1")).unwrap();
/// assert!(response.success);
/// ```
pub struct TwinHub {
    handler: RequestHandler,
    context: Arc<HandlerContext>,
}

impl TwinHub {
    /// Creates a new hub.
    pub fn new(config: HubConfig) -> Self {
        let registry = Arc::new(TwinRegistry::new());
        Self::with_registry(config, registry)
    }

    /// Creates a hub around an existing registry.
    pub fn with_registry(config: HubConfig, registry: Arc<TwinRegistry>) -> Self {
        let context = Arc::new(HandlerContext::new(config, registry));
        let handler = RequestHandler::new(Arc::clone(&context));
        Self { handler, context }
    }

    /// Handles a connect request.
    pub fn handle_connect(&self, request: ConnectRequest) -> HubResult<ConnectResponse> {
        self.handler.handle_connect(request)
    }

    /// Handles a full-twin fetch.
    pub fn handle_get_twin(&self, request: GetTwinRequest) -> HubResult<GetTwinResponse> {
        self.handler.handle_get_twin(request)
    }

    /// Handles a reported-property patch.
    pub fn handle_reported_patch(
        &self,
        request: ReportedPatchRequest,
    ) -> HubResult<ReportedPatchResponse> {
        self.handler.handle_reported_patch(request)
    }

    /// Handles a protocol message, dispatching to the matching handler.
    pub fn handle_message(&self, message: TwinMessage) -> Result<TwinMessage, String> {
        match message {
            TwinMessage::ConnectRequest(req) => self
                .handle_connect(req)
                .map(TwinMessage::ConnectResponse)
                .map_err(|e| e.to_string()),
            TwinMessage::GetTwinRequest(req) => self
                .handle_get_twin(req)
                .map(TwinMessage::GetTwinResponse)
                .map_err(|e| e.to_string()),
            TwinMessage::ReportedPatchRequest(req) => self
                .handle_reported_patch(req)
                .map(TwinMessage::ReportedPatchResponse)
                .map_err(|e| e.to_string()),
            _ => Err("unexpected message type".into()),
        }
    }

    /// Handles an encoded request envelope and returns the encoded
    /// response. This is the entry point byte-oriented links use.
    pub fn handle_envelope(&self, body: &[u8]) -> Result<Vec<u8>, String> {
        let message = TwinMessage::decode(body).map_err(|e| e.to_string())?;
        let response = self.handle_message(message)?;
        response.encode().map_err(|e| e.to_string())
    }

    /// Merges a desired-property patch (administrative writer).
    pub fn update_desired(&self, device_id: &str, patch: &PropertyPatch) -> HubResult<u64> {
        self.context.registry.update_desired(device_id, patch)
    }

    /// Merges a tags patch (administrative writer).
    pub fn update_tags(&self, device_id: &str, patch: &PropertyPatch) -> HubResult<()> {
        self.context.registry.update_tags(device_id, patch)
    }

    /// Reads a device twin directly (administrative reader).
    pub fn twin(&self, device_id: &str) -> Option<Twin> {
        self.context.registry.twin(device_id)
    }

    /// Subscribes to a device's desired-property updates.
    pub fn subscribe_desired(&self, device_id: &str) -> HubResult<Receiver<DesiredUpdate>> {
        self.context.registry.subscribe_desired(device_id)
    }

    /// Returns the shared registry.
    pub fn registry(&self) -> Arc<TwinRegistry> {
        Arc::clone(&self.context.registry)
    }

    /// Returns the number of registered devices.
    pub fn device_count(&self) -> usize {
        self.context.registry.device_count()
    }
}
