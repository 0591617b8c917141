//! Request handlers for the device-facing endpoints.

use crate::config::HubConfig;
use crate::error::{HubError, HubResult};
use crate::registry::TwinRegistry;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};
use twinlink_protocol::{
    ConnectRequest, ConnectResponse, GetTwinRequest, GetTwinResponse, ReportedPatchRequest,
    ReportedPatchResponse,
};
use uuid::Uuid;

/// Context shared by all request handlers.
pub struct HandlerContext {
    /// Hub configuration.
    pub config: HubConfig,
    /// Twin registry (shared with the administrative surface).
    pub registry: Arc<TwinRegistry>,
    /// Device sessions (device_id -> session info).
    sessions: RwLock<HashMap<String, DeviceSession>>,
}

/// Information about a connected device.
#[derive(Debug, Clone)]
struct DeviceSession {
    session_id: Uuid,
}

impl HandlerContext {
    /// Creates a new handler context.
    pub fn new(config: HubConfig, registry: Arc<TwinRegistry>) -> Self {
        Self {
            config,
            registry,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Registers a device session, replacing any previous one.
    fn register_session(&self, device_id: &str) -> Uuid {
        let session = DeviceSession {
            session_id: Uuid::new_v4(),
        };
        let session_id = session.session_id;
        self.sessions.write().insert(device_id.to_string(), session);
        session_id
    }

    /// Returns the session id for a connected device.
    pub fn session_id(&self, device_id: &str) -> Option<Uuid> {
        self.sessions.read().get(device_id).map(|s| s.session_id)
    }

    /// Returns the number of connected sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().len()
    }
}

/// Handler for device requests.
pub struct RequestHandler {
    context: Arc<HandlerContext>,
}

impl RequestHandler {
    /// Creates a new request handler.
    pub fn new(context: Arc<HandlerContext>) -> Self {
        Self { context }
    }

    /// Handles a connect request.
    ///
    /// Registers the device (idempotent) and opens a session. A version
    /// mismatch is reported in the response, not as a handler error.
    pub fn handle_connect(&self, request: ConnectRequest) -> HubResult<ConnectResponse> {
        if request.protocol_version != self.context.config.protocol_version {
            warn!(
                device_id = %request.device_id,
                version = request.protocol_version,
                "rejecting connect: unsupported protocol version"
            );
            return Ok(ConnectResponse::error(format!(
                "unsupported protocol version: {}",
                request.protocol_version
            )));
        }

        self.context.registry.register(&request.device_id);
        let session_id = self.context.register_session(&request.device_id);
        debug!(device_id = %request.device_id, %session_id, "device connected");
        Ok(ConnectResponse::success(session_id))
    }

    /// Handles a full-twin fetch.
    pub fn handle_get_twin(&self, request: GetTwinRequest) -> HubResult<GetTwinResponse> {
        match self.context.registry.twin(&request.device_id) {
            Some(twin) => Ok(GetTwinResponse::success(twin)),
            None => Ok(GetTwinResponse::error(format!(
                "unknown device: {}",
                request.device_id
            ))),
        }
    }

    /// Handles a reported-property patch.
    ///
    /// Enforces the configured size and depth limits, then delegates to
    /// the registry. Validation failures come back as unsuccessful
    /// responses so the transport can surface them to the caller.
    pub fn handle_reported_patch(
        &self,
        request: ReportedPatchRequest,
    ) -> HubResult<ReportedPatchResponse> {
        let encoded_len = serde_json::to_vec(&request.patch)
            .map_err(|e| HubError::Internal(e.to_string()))?
            .len();
        if encoded_len > self.context.config.max_patch_bytes {
            return Ok(ReportedPatchResponse::error(format!(
                "patch too large: {} > {} bytes",
                encoded_len, self.context.config.max_patch_bytes
            )));
        }
        if request.patch.depth() > self.context.config.max_patch_depth {
            return Ok(ReportedPatchResponse::error(format!(
                "patch too deep: {} > {}",
                request.patch.depth(),
                self.context.config.max_patch_depth
            )));
        }

        match self
            .context
            .registry
            .apply_reported(&request.device_id, &request.patch)
        {
            Ok(version) => Ok(ReportedPatchResponse::success(version)),
            Err(e) if e.is_client_error() => Ok(ReportedPatchResponse::error(e.to_string())),
            Err(e) => Err(e),
        }
    }
}
